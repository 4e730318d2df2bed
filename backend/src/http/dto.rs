//! Data Transfer Objects for the HTTP API.
//!
//! Domain types already derive Serialize/Deserialize and are returned as-is;
//! this module holds the request queries and the response envelopes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Granularity, StationRecord, StationTableInfo, TimeRange};
use crate::services::error::AnalyticsResult;
use crate::services::job_tracker::{JobStatus, LogEntry};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Data store status
    pub database: String,
}

/// Station list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationListResponse {
    pub stations: Vec<StationRecord>,
    pub total: usize,
    /// Checksum and refresh time of the table, absent before the first refresh
    pub info: Option<StationTableInfo>,
}

/// Query parameters for station search.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Query parameters for the nearest-stations lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestQuery {
    pub lat: f64,
    pub lon: f64,
    /// Number of stations to return (default: 5)
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query parameters shared by the series and analysis endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisQuery {
    /// Bucket width such as `1h` or `1d` (default: configured granularity)
    #[serde(default)]
    pub granularity: Option<Granularity>,
    /// Inclusive start of the window
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    /// Inclusive end of the window
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    /// Rolling window length in buckets (default: configured window)
    #[serde(default)]
    pub window: Option<usize>,
    /// Seasonal period in buckets (default: derived from the granularity)
    #[serde(default)]
    pub period: Option<usize>,
}

impl AnalysisQuery {
    /// The requested time window; open ends extend to the series bounds.
    pub fn range(&self) -> AnalyticsResult<Option<TimeRange>> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (start, end) => TimeRange::new(
                start.unwrap_or(NaiveDateTime::MIN),
                end.unwrap_or(NaiveDateTime::MAX),
            )
            .map(Some),
        }
    }
}

/// Response for an accepted evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationAccepted {
    /// Job ID for tracking progress
    pub job_id: String,
    /// Message about the operation
    pub message: String,
}

/// Job status response for background evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub kind: String,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    /// Result if completed
    pub result: Option<serde_json::Value>,
}
