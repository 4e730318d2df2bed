//! Repository traits for the station data store.
//!
//! Storage backends implement three narrow traits, one per kind of data:
//!
//! - [`StationRepository`]: the unified station table, replaced wholesale on refresh
//! - [`TripRepository`]: historical trip events
//! - [`HistoryRepository`]: historical station status observations
//!
//! [`DataStore`] bundles them and is what services and the HTTP layer hold
//! (as `Arc<dyn DataStore>`).
//!
//! # Thread Safety
//! Implementations must be `Send + Sync` to work with async Rust and allow
//! sharing across threads.

pub mod error;
pub mod history;
pub mod station;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use history::{HistoryRepository, TripRepository};
pub use station::StationRepository;

/// Everything the services need from a storage backend.
pub trait DataStore: StationRepository + TripRepository + HistoryRepository {}

impl<T> DataStore for T where T: StationRepository + TripRepository + HistoryRepository {}
