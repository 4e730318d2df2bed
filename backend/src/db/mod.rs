//! Station data storage.
//!
//! Storage goes through the Repository pattern so backends can be swapped
//! without touching services or handlers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API, evaluation jobs)          │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - Feed refresh and wholesale table replacement         │
//! │  - Series extraction from stored history                │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/) - DataStore            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────────┐
//!     │  LocalRepository   (in-memory)   │
//!     │  SnapshotRepository (JSON files) │
//!     └──────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bikeshare::config::AppConfig;
//! use bikeshare::db::{services, RepositoryFactory};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let repo = RepositoryFactory::from_app_config(&config).await?;
//!     let stations = services::list_stations(repo.as_ref()).await?;
//!     Ok(())
//! }
//! ```
//!
//! The repository is created once at startup and passed around as
//! `Arc<dyn DataStore>`; there is no process-wide instance.

#[cfg(not(feature = "local-repo"))]
compile_error!("Enable at least one repository backend feature.");

pub mod checksum;
pub mod factory;
pub mod repositories;
pub mod repository;
pub mod services;

#[cfg(test)]
#[path = "services_tests.rs"]
mod services_tests;

// ==================== Service Layer ====================

pub use services::{
    get_station, health_check, import_observations, import_trips, list_stations,
    refresh_stations, search_stations, station_series, station_table_info, RefreshSummary,
};

// ==================== Repository Pattern Exports ====================

pub use checksum::{calculate_checksum, station_table_checksum};
pub use factory::{RepositoryFactory, RepositoryType};
pub use repositories::{LocalRepository, SnapshotRepository, SnapshotStats};
pub use repository::{
    DataStore, ErrorContext, HistoryRepository, RepositoryError, RepositoryResult,
    StationRepository, TripRepository,
};
