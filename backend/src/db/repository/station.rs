//! Station table repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{StationId, StationRecord, StationTable, StationTableInfo};

/// Repository trait for the unified station table.
///
/// The table is never patched: a refresh hands a complete new table to
/// [`replace_station_table`](StationRepository::replace_station_table) and
/// readers observe either the old table or the new one.
#[async_trait]
pub trait StationRepository: Send + Sync {
    /// Check if the store is usable.
    ///
    /// # Returns
    /// - `Ok(true)` if healthy
    /// - `Ok(false)` if unhealthy but no error occurred
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Swap in a freshly normalized station table.
    ///
    /// # Returns
    /// * `Ok(StationTableInfo)` - Count, refresh time and checksum of the stored table
    async fn replace_station_table(&self, table: StationTable)
        -> RepositoryResult<StationTableInfo>;

    /// The current table. Empty if no refresh has happened yet.
    async fn station_table(&self) -> RepositoryResult<StationTable>;

    /// Metadata of the current table, `None` before the first refresh.
    async fn station_table_info(&self) -> RepositoryResult<Option<StationTableInfo>>;

    /// Look up one station.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the station is not in the current table
    async fn get_station(&self, station_id: StationId) -> RepositoryResult<StationRecord>;

    /// Case-insensitive name search.
    async fn search_stations(&self, query: &str) -> RepositoryResult<Vec<StationRecord>>;
}
