//! Repository traits for historical trips and status observations.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{StationId, StatusObservation, TripEvent};

/// Historical trip events. Trips are immutable once stored.
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Append trips.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of trips stored
    async fn store_trips(&self, trips: Vec<TripEvent>) -> RepositoryResult<usize>;

    /// Trips that start or end at `station_id`.
    async fn trips_for_station(&self, station_id: StationId) -> RepositoryResult<Vec<TripEvent>>;

    async fn trip_count(&self) -> RepositoryResult<usize>;
}

/// Historical dock-state observations.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append observations.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of observations stored
    async fn store_observations(
        &self,
        observations: Vec<StatusObservation>,
    ) -> RepositoryResult<usize>;

    /// Observations for one station, ordered by time.
    async fn observations_for_station(
        &self,
        station_id: StationId,
    ) -> RepositoryResult<Vec<StatusObservation>>;
}
