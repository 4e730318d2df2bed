//! Snapshot-backed repository.
//!
//! Loads persisted artifacts wholesale from a directory at start-up and
//! serves them from memory:
//!
//! ```text
//! <dir>/stations.json   StationTable (JSON)
//! <dir>/trips.jsonl     one TripEvent per line
//! <dir>/history.jsonl   one StatusObservation per line
//! ```
//!
//! Missing files load as empty data. A malformed file fails the whole load;
//! there are no partial reads. With `persist_refresh` enabled, every
//! replaced station table is written back to `stations.json`.

use async_trait::async_trait;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use super::local::LocalRepository;
use crate::db::repository::*;
use crate::models::{
    StationId, StationRecord, StationTable, StationTableInfo, StatusObservation, TripEvent,
};

pub const STATIONS_FILE: &str = "stations.json";
pub const TRIPS_FILE: &str = "trips.jsonl";
pub const HISTORY_FILE: &str = "history.jsonl";

/// Repository over a snapshot directory.
#[derive(Clone)]
pub struct SnapshotRepository {
    dir: PathBuf,
    persist_refresh: bool,
    inner: LocalRepository,
}

/// Counts of what a snapshot load brought in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub stations: usize,
    pub trips: usize,
    pub observations: usize,
}

impl SnapshotRepository {
    /// Load every artifact under `dir`.
    pub async fn open<P: AsRef<Path>>(dir: P, persist_refresh: bool) -> RepositoryResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(RepositoryError::configuration(format!(
                "Snapshot directory {} does not exist",
                dir.display()
            )));
        }

        let load_dir = dir.clone();
        let (table, trips, observations) = tokio::task::spawn_blocking(move || {
            let table = read_station_table(&load_dir.join(STATIONS_FILE))?;
            let trips: Vec<TripEvent> = read_json_lines(&load_dir.join(TRIPS_FILE))?;
            let observations: Vec<StatusObservation> =
                read_json_lines(&load_dir.join(HISTORY_FILE))?;
            Ok::<_, RepositoryError>((table, trips, observations))
        })
        .await
        .map_err(|e| RepositoryError::internal(format!("Snapshot load task failed: {}", e)))??;

        let inner = LocalRepository::new();
        let stats = SnapshotStats {
            stations: table.as_ref().map(StationTable::len).unwrap_or(0),
            trips: trips.len(),
            observations: observations.len(),
        };
        if let Some(table) = table {
            inner.replace_station_table(table).await?;
        }
        inner.store_trips(trips).await?;
        inner.store_observations(observations).await?;

        info!(
            "Loaded snapshot {}: {} stations, {} trips, {} observations",
            dir.display(),
            stats.stations,
            stats.trips,
            stats.observations
        );

        Ok(Self {
            dir,
            persist_refresh,
            inner,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the current station table to `stations.json`.
    pub async fn save_station_table(&self) -> RepositoryResult<()> {
        let table = self.inner.station_table().await?;
        write_station_table(&self.dir.join(STATIONS_FILE), &table).await
    }
}

fn read_station_table(path: &Path) -> RepositoryResult<Option<StationTable>> {
    if !path.exists() {
        warn!("No {} in snapshot, starting with an empty table", path.display());
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let table: StationTable = serde_json::from_str(&content).map_err(|e| {
        RepositoryError::validation_with_context(
            e.to_string(),
            ErrorContext::new("load_snapshot").with_details(path.display().to_string()),
        )
    })?;
    // Re-sort through the constructor in case the file was edited by hand.
    let refreshed_at = table.refreshed_at;
    Ok(Some(StationTable::new(table.into_stations(), refreshed_at)))
}

/// Read a JSON Lines file. Blank lines are skipped; any malformed line fails the read.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> RepositoryResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                RepositoryError::validation_with_context(
                    e.to_string(),
                    ErrorContext::new("load_snapshot")
                        .with_details(format!("{}:{}", path.display(), idx + 1)),
                )
            })
        })
        .collect()
}

async fn write_station_table(path: &Path, table: &StationTable) -> RepositoryResult<()> {
    let json = serde_json::to_string_pretty(table)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[async_trait]
impl StationRepository for SnapshotRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.dir.is_dir() && self.inner.health_check().await?)
    }

    async fn replace_station_table(
        &self,
        table: StationTable,
    ) -> RepositoryResult<StationTableInfo> {
        let info = self.inner.replace_station_table(table).await?;
        if self.persist_refresh {
            self.save_station_table()
                .await
                .map_err(|e| e.with_operation("persist_station_table"))?;
        }
        Ok(info)
    }

    async fn station_table(&self) -> RepositoryResult<StationTable> {
        self.inner.station_table().await
    }

    async fn station_table_info(&self) -> RepositoryResult<Option<StationTableInfo>> {
        self.inner.station_table_info().await
    }

    async fn get_station(&self, station_id: StationId) -> RepositoryResult<StationRecord> {
        self.inner.get_station(station_id).await
    }

    async fn search_stations(&self, query: &str) -> RepositoryResult<Vec<StationRecord>> {
        self.inner.search_stations(query).await
    }
}

#[async_trait]
impl TripRepository for SnapshotRepository {
    async fn store_trips(&self, trips: Vec<TripEvent>) -> RepositoryResult<usize> {
        self.inner.store_trips(trips).await
    }

    async fn trips_for_station(&self, station_id: StationId) -> RepositoryResult<Vec<TripEvent>> {
        self.inner.trips_for_station(station_id).await
    }

    async fn trip_count(&self) -> RepositoryResult<usize> {
        self.inner.trip_count().await
    }
}

#[async_trait]
impl HistoryRepository for SnapshotRepository {
    async fn store_observations(
        &self,
        observations: Vec<StatusObservation>,
    ) -> RepositoryResult<usize> {
        self.inner.store_observations(observations).await
    }

    async fn observations_for_station(
        &self,
        station_id: StationId,
    ) -> RepositoryResult<Vec<StatusObservation>> {
        self.inner.observations_for_station(station_id).await
    }
}
