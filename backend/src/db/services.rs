//! Service layer over the data store.
//!
//! Application code (HTTP handlers, the evaluation processor, the server
//! binary) goes through these functions rather than calling repository
//! traits directly. They work with any [`DataStore`].

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use super::repository::{
    DataStore, HistoryRepository, RepositoryError, RepositoryResult, StationRepository,
    TripRepository,
};
use crate::feed::FeedSource;
use crate::models::{
    Granularity, SeriesMetric, StationId, StationRecord, StationTableInfo, StationTimeSeries,
    StatusObservation, TimeRange, TripEvent,
};
use crate::services::error::AnalyticsResult;
use crate::services::extractor;
use crate::services::normalizer::{normalize_documents, ExcludedStation};

/// Outcome of [`refresh_stations`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub info: StationTableInfo,
    pub excluded: Vec<ExcludedStation>,
}

/// Check that the store is reachable.
pub async fn health_check(repo: &dyn DataStore) -> RepositoryResult<bool> {
    repo.health_check().await
}

/// Fetch the live feed, normalize it and replace the station table wholesale.
///
/// On a fetch error the current table is left untouched.
pub async fn refresh_stations(
    repo: &dyn DataStore,
    source: &dyn FeedSource,
) -> AnalyticsResult<RefreshSummary> {
    let documents = source
        .fetch()
        .await
        .map_err(|e| e.with_operation("refresh_stations"))?;
    let normalized = normalize_documents(&documents, Utc::now());
    let info = repo.replace_station_table(normalized.table).await?;
    info!(
        "Station table refreshed: {} stations, checksum {}",
        info.station_count, info.checksum
    );
    Ok(RefreshSummary {
        info,
        excluded: normalized.excluded,
    })
}

/// All stations, sorted by id.
pub async fn list_stations(repo: &dyn DataStore) -> RepositoryResult<Vec<StationRecord>> {
    Ok(repo.station_table().await?.into_stations())
}

pub async fn station_table_info(
    repo: &dyn DataStore,
) -> RepositoryResult<Option<StationTableInfo>> {
    repo.station_table_info().await
}

pub async fn get_station(
    repo: &dyn DataStore,
    station_id: StationId,
) -> RepositoryResult<StationRecord> {
    repo.get_station(station_id).await
}

pub async fn search_stations(
    repo: &dyn DataStore,
    query: &str,
) -> RepositoryResult<Vec<StationRecord>> {
    repo.search_stations(query).await
}

/// Append historical trips.
pub async fn import_trips(repo: &dyn DataStore, trips: Vec<TripEvent>) -> RepositoryResult<usize> {
    repo.store_trips(trips).await
}

/// Append historical status observations.
pub async fn import_observations(
    repo: &dyn DataStore,
    observations: Vec<StatusObservation>,
) -> RepositoryResult<usize> {
    repo.store_observations(observations).await
}

/// Build one station series from stored history.
///
/// Trip-based metrics read trips; occupancy metrics read status
/// observations. A station with no history yields an empty series.
pub async fn station_series(
    repo: &dyn DataStore,
    station_id: StationId,
    metric: SeriesMetric,
    granularity: Granularity,
    range: Option<TimeRange>,
) -> AnalyticsResult<StationTimeSeries> {
    let (trips, observations) = if metric.is_trip_based() {
        (repo.trips_for_station(station_id).await?, Vec::new())
    } else {
        (Vec::new(), repo.observations_for_station(station_id).await?)
    };

    tokio::task::spawn_blocking(move || {
        extractor::extract(
            metric,
            &trips,
            &observations,
            station_id,
            granularity,
            range.as_ref(),
        )
    })
    .await
    .map_err(|e| RepositoryError::internal(format!("series extraction task failed: {}", e)))?
}
