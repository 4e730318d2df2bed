//! In-memory local repository implementation.
//!
//! Holds the station table, trips and observations in memory. Used directly
//! for tests and development, and as the backing store of the snapshot
//! repository.

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::checksum::station_table_checksum;
use crate::db::repository::*;
use crate::models::{
    StationId, StationRecord, StationTable, StationTableInfo, StatusObservation, TripEvent,
};

/// In-memory local repository.
///
/// # Example
/// ```
/// use bikeshare::db::repositories::LocalRepository;
/// use bikeshare::db::repository::StationRepository;
///
/// # tokio_test_block_on(async {
/// let repo = LocalRepository::new();
/// let table = repo.station_table().await.unwrap();
/// assert!(table.is_empty());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    table: Arc<StationTable>,
    table_info: Option<StationTableInfo>,
    trips: Vec<TripEvent>,
    observations: HashMap<StationId, Vec<StatusObservation>>,
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            table: Arc::new(StationTable::empty()),
            table_info: None,
            trips: Vec::new(),
            observations: HashMap::new(),
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    pub fn station_count(&self) -> usize {
        self.data.read().table.len()
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Local store is not healthy"));
        }
        Ok(())
    }

    fn current_table(&self) -> Arc<StationTable> {
        Arc::clone(&self.data.read().table)
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StationRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn replace_station_table(
        &self,
        table: StationTable,
    ) -> RepositoryResult<StationTableInfo> {
        self.check_health()?;

        let info = StationTableInfo {
            station_count: table.len(),
            refreshed_at: table.refreshed_at,
            checksum: station_table_checksum(&table)
                .map_err(|e| e.with_operation("replace_station_table"))?,
        };

        let mut data = self.data.write();
        data.table = Arc::new(table);
        data.table_info = Some(info.clone());
        debug!(
            "Replaced station table: {} stations, checksum {}",
            info.station_count, info.checksum
        );
        Ok(info)
    }

    async fn station_table(&self) -> RepositoryResult<StationTable> {
        self.check_health()?;
        Ok(self.current_table().as_ref().clone())
    }

    async fn station_table_info(&self) -> RepositoryResult<Option<StationTableInfo>> {
        self.check_health()?;
        Ok(self.data.read().table_info.clone())
    }

    async fn get_station(&self, station_id: StationId) -> RepositoryResult<StationRecord> {
        self.check_health()?;
        self.current_table()
            .get(station_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Station {} not found", station_id),
                    ErrorContext::new("get_station")
                        .with_entity("station")
                        .with_entity_id(station_id),
                )
            })
    }

    async fn search_stations(&self, query: &str) -> RepositoryResult<Vec<StationRecord>> {
        self.check_health()?;
        Ok(self
            .current_table()
            .search_by_name(query)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TripRepository for LocalRepository {
    async fn store_trips(&self, trips: Vec<TripEvent>) -> RepositoryResult<usize> {
        self.check_health()?;
        let count = trips.len();
        self.data.write().trips.extend(trips);
        Ok(count)
    }

    async fn trips_for_station(&self, station_id: StationId) -> RepositoryResult<Vec<TripEvent>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .trips
            .iter()
            .filter(|t| t.start_station_id == station_id || t.end_station_id == station_id)
            .cloned()
            .collect())
    }

    async fn trip_count(&self) -> RepositoryResult<usize> {
        self.check_health()?;
        Ok(self.data.read().trips.len())
    }
}

#[async_trait]
impl HistoryRepository for LocalRepository {
    async fn store_observations(
        &self,
        observations: Vec<StatusObservation>,
    ) -> RepositoryResult<usize> {
        self.check_health()?;
        let count = observations.len();
        let mut data = self.data.write();
        for obs in observations {
            data.observations.entry(obs.station_id).or_default().push(obs);
        }
        for list in data.observations.values_mut() {
            list.sort_by_key(|o| o.observed_at);
        }
        Ok(count)
    }

    async fn observations_for_station(
        &self,
        station_id: StationId,
    ) -> RepositoryResult<Vec<StatusObservation>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .observations
            .get(&station_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StationStatus;
    use chrono::{NaiveDate, NaiveDateTime, Utc};

    fn station(id: i64, name: &str) -> StationRecord {
        StationRecord {
            station_id: StationId(id),
            station_name: name.to_string(),
            short_name: None,
            lat: 40.7,
            lon: -74.0,
            capacity: 30,
            region_id: None,
            region_name: None,
            rental_methods: vec![],
            has_kiosk: None,
            station_type: None,
            legacy_id: None,
            num_bikes_available: 10,
            num_docks_available: 20,
            num_bikes_disabled: 0,
            num_docks_disabled: 0,
            status: StationStatus::Active,
            is_renting: None,
            is_returning: None,
            last_reported: None,
            bike_angels_action: None,
            bike_angels_score: None,
            bike_angels_digits: None,
        }
    }

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 7, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = LocalRepository::new();
        assert!(repo.health_check().await.unwrap());

        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        assert!(repo.station_table().await.is_err());
    }

    #[tokio::test]
    async fn test_replace_table_wholesale() {
        let repo = LocalRepository::new();
        assert!(repo.station_table_info().await.unwrap().is_none());

        repo.replace_station_table(StationTable::new(
            vec![station(1, "a"), station(2, "b")],
            Utc::now(),
        ))
        .await
        .unwrap();
        let info = repo
            .replace_station_table(StationTable::new(vec![station(3, "c")], Utc::now()))
            .await
            .unwrap();

        assert_eq!(info.station_count, 1);
        assert_eq!(repo.station_count(), 1);
        assert!(repo.get_station(StationId(1)).await.is_err());
        assert_eq!(repo.station_table_info().await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn test_not_found_error() {
        let repo = LocalRepository::new();
        let result = repo.get_station(StationId(999)).await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_search_stations() {
        let repo = LocalRepository::new();
        repo.replace_station_table(StationTable::new(
            vec![station(1, "Pier 40 - Hudson River Park"), station(2, "E 17 St")],
            Utc::now(),
        ))
        .await
        .unwrap();
        let hits = repo.search_stations("pier").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].station_id, StationId(1));
    }

    #[tokio::test]
    async fn test_trips_for_station_matches_either_end() {
        let repo = LocalRepository::new();
        let trip = |s: i64, e: i64| TripEvent {
            start_station_id: StationId(s),
            end_station_id: StationId(e),
            start_time: at(8),
            stop_time: at(9),
            trip_duration: 3600.0,
        };
        repo.store_trips(vec![trip(1, 2), trip(2, 3), trip(3, 4)])
            .await
            .unwrap();
        assert_eq!(repo.trip_count().await.unwrap(), 3);
        assert_eq!(repo.trips_for_station(StationId(2)).await.unwrap().len(), 2);
        assert_eq!(repo.trips_for_station(StationId(9)).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_observations_sorted_by_time() {
        let repo = LocalRepository::new();
        let obs = |h: u32| StatusObservation {
            station_id: StationId(5),
            observed_at: at(h),
            available_bikes: h as i64,
            available_docks: 0,
            total_docks: 20,
        };
        repo.store_observations(vec![obs(10), obs(8), obs(9)])
            .await
            .unwrap();
        let stored = repo.observations_for_station(StationId(5)).await.unwrap();
        let hours: Vec<i64> = stored.iter().map(|o| o.available_bikes).collect();
        assert_eq!(hours, vec![8, 9, 10]);
    }

    #[tokio::test]
    async fn test_clear_keeps_health_flag() {
        let repo = LocalRepository::new();
        repo.replace_station_table(StationTable::new(vec![station(1, "a")], Utc::now()))
            .await
            .unwrap();
        repo.clear();
        assert_eq!(repo.station_count(), 0);
        assert!(repo.health_check().await.unwrap());
    }
}
