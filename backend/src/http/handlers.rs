//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer for business logic.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

use super::dto::{
    AnalysisQuery, EvaluationAccepted, HealthResponse, JobStatusResponse, NearestQuery,
    SearchQuery, StationListResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::repository::StationRepository;
use crate::db::services::{self as db_services, RefreshSummary};
use crate::models::{SeriesMetric, StationId, StationRecord, StationTimeSeries};
use crate::services::decomposition::{self, Decomposition};
use crate::services::evaluation_processor::{self, EvaluationRequest, EVALUATION_JOB};
use crate::services::station_lookup::{self, NearbyStation, StationProfile};
use crate::services::stationarity::{self, RollingStats, StationarityCheck};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

const DEFAULT_NEAREST_LIMIT: usize = 5;

/// Run CPU-bound analysis off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> crate::services::error::AnalyticsResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
        .map_err(AppError::from)
}

async fn load_series(
    state: &AppState,
    station_id: i64,
    metric: SeriesMetric,
    query: &AnalysisQuery,
) -> Result<StationTimeSeries, AppError> {
    let granularity = query
        .granularity
        .unwrap_or(state.config.analysis.granularity);
    let series = db_services::station_series(
        state.repository.as_ref(),
        StationId(station_id),
        metric,
        granularity,
        query.range()?,
    )
    .await?;
    Ok(series)
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the store is reachable.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Stations
// =============================================================================

/// GET /v1/stations
pub async fn list_stations(State(state): State<AppState>) -> HandlerResult<StationListResponse> {
    let stations = db_services::list_stations(state.repository.as_ref()).await?;
    let info = db_services::station_table_info(state.repository.as_ref()).await?;
    let total = stations.len();

    Ok(Json(StationListResponse {
        stations,
        total,
        info,
    }))
}

/// GET /v1/stations/search?q=
///
/// Case-insensitive substring search over station names.
pub async fn search_stations(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> HandlerResult<Vec<StationRecord>> {
    let stations = db_services::search_stations(state.repository.as_ref(), &query.q).await?;
    Ok(Json(stations))
}

/// GET /v1/stations/nearest?lat=&lon=&limit=
pub async fn nearest_stations(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> HandlerResult<Vec<NearbyStation>> {
    let table = state.repository.station_table().await?;
    let limit = query.limit.unwrap_or(DEFAULT_NEAREST_LIMIT);
    let nearby = station_lookup::nearest_stations(&table, query.lat, query.lon, limit)?;
    Ok(Json(nearby))
}

/// GET /v1/stations/{station_id}
pub async fn get_station(
    State(state): State<AppState>,
    Path(station_id): Path<i64>,
) -> HandlerResult<StationRecord> {
    let station = db_services::get_station(state.repository.as_ref(), StationId(station_id)).await?;
    Ok(Json(station))
}

/// GET /v1/stations/{station_id}/profile
///
/// Station record plus trip and observation counts.
pub async fn get_station_profile(
    State(state): State<AppState>,
    Path(station_id): Path<i64>,
) -> HandlerResult<StationProfile> {
    let profile =
        station_lookup::station_profile(state.repository.as_ref(), StationId(station_id)).await?;
    Ok(Json(profile))
}

/// POST /v1/stations/refresh
///
/// Fetch the live feed and replace the station table. A failed fetch leaves
/// the current table in place and answers 502.
pub async fn refresh_stations(State(state): State<AppState>) -> HandlerResult<RefreshSummary> {
    let summary =
        db_services::refresh_stations(state.repository.as_ref(), state.feed_source.as_ref())
            .await?;
    if !summary.excluded.is_empty() {
        tracing::info!(
            "Refresh excluded {} stations",
            summary.excluded.len()
        );
    }
    Ok(Json(summary))
}

// =============================================================================
// Series and Analysis
// =============================================================================

/// GET /v1/stations/{station_id}/series/{metric}
pub async fn get_series(
    State(state): State<AppState>,
    Path((station_id, metric)): Path<(i64, SeriesMetric)>,
    Query(query): Query<AnalysisQuery>,
) -> HandlerResult<StationTimeSeries> {
    Ok(Json(load_series(&state, station_id, metric, &query).await?))
}

/// GET /v1/stations/{station_id}/series/{metric}/rolling
pub async fn get_rolling_stats(
    State(state): State<AppState>,
    Path((station_id, metric)): Path<(i64, SeriesMetric)>,
    Query(query): Query<AnalysisQuery>,
) -> HandlerResult<RollingStats> {
    let series = load_series(&state, station_id, metric, &query).await?;
    let window = query
        .window
        .unwrap_or(state.config.analysis.rolling_window);
    let stats = blocking(move || stationarity::rolling_stats(&series, window)).await?;
    Ok(Json(stats))
}

/// GET /v1/stations/{station_id}/series/{metric}/stationarity
///
/// Rolling statistics and the augmented Dickey-Fuller test.
pub async fn get_stationarity(
    State(state): State<AppState>,
    Path((station_id, metric)): Path<(i64, SeriesMetric)>,
    Query(query): Query<AnalysisQuery>,
) -> HandlerResult<StationarityCheck> {
    let series = load_series(&state, station_id, metric, &query).await?;
    let window = query
        .window
        .unwrap_or(state.config.analysis.rolling_window);
    let check = blocking(move || stationarity::check_stationarity(&series, window)).await?;
    Ok(Json(check))
}

/// GET /v1/stations/{station_id}/series/{metric}/decomposition
pub async fn get_decomposition(
    State(state): State<AppState>,
    Path((station_id, metric)): Path<(i64, SeriesMetric)>,
    Query(query): Query<AnalysisQuery>,
) -> HandlerResult<Decomposition> {
    let series = load_series(&state, station_id, metric, &query).await?;
    let period = query.period;
    let result = blocking(move || match period {
        Some(period) => decomposition::decompose_with_period(&series, period),
        None => decomposition::decompose(&series),
    })
    .await?;
    Ok(Json(result))
}

// =============================================================================
// Evaluation Jobs
// =============================================================================

/// POST /v1/evaluations
///
/// Validate the request and start a background evaluation. Returns a job ID
/// for tracking progress.
pub async fn create_evaluation(
    State(state): State<AppState>,
    Json(request): Json<EvaluationRequest>,
) -> Result<(StatusCode, Json<EvaluationAccepted>), AppError> {
    let plan = request.plan(&state.config.forecast)?;

    let job_id = state.job_tracker.create_job(EVALUATION_JOB);
    let response_job_id = job_id.clone();

    let tracker = state.job_tracker.clone();
    let repo = state.repository.clone();
    tokio::spawn(async move {
        let _ = evaluation_processor::run_evaluation(job_id, tracker, repo, plan).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(EvaluationAccepted {
            job_id: response_job_id.clone(),
            message: format!(
                "Evaluation started. Track progress at /v1/jobs/{}/logs",
                response_job_id
            ),
        }),
    ))
}

/// GET /v1/jobs/{job_id}
///
/// Get the current status and logs of a background job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<JobStatusResponse> {
    let job = state
        .job_tracker
        .get_job(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        kind: job.kind,
        status: job.status,
        logs: job.logs,
        result: job.result,
    }))
}

/// GET /v1/jobs/{job_id}/logs
///
/// Stream job logs via Server-Sent Events (SSE).
pub async fn stream_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if state.job_tracker.get_job(&job_id).is_none() {
        return Err(AppError::NotFound(format!("Job {} not found", job_id)));
    }

    let tracker = state.job_tracker.clone();
    let stream = async_stream::stream! {
        let mut cursor = 0;
        loop {
            let (logs, status) = tracker.logs_since(&job_id, cursor);
            cursor += logs.len();
            for log in &logs {
                let event_data = serde_json::to_string(log).unwrap_or_default();
                yield Ok(Event::default().data(event_data));
            }

            match status {
                Some(status) if status.is_finished() => {
                    let result = tracker.get_job(&job_id).and_then(|job| job.result);
                    let final_event = serde_json::json!({
                        "status": status,
                        "result": result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(serde_json::to_string(&final_event).unwrap_or_default()));
                    break;
                }
                Some(_) => {}
                None => break,
            }

            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod handlers_tests;
