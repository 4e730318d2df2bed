//! Public API surface.
//!
//! Re-exports the types that cross the HTTP boundary so API consumers
//! depend on one module. All of them derive Serialize/Deserialize.

pub use crate::db::services::RefreshSummary;
pub use crate::models::{
    BikeAngelsAction, EvaluationResult, EvaluationSummary, ForecastConfig, ForecastConfigParams,
    Granularity, SeriesMetric, SeriesPoint, StationId, StationRecord, StationStatus,
    StationTableInfo, StationTimeSeries, StatusObservation, TimeRange, TripEvent,
    WALK_FORWARD_PROTOCOL,
};
pub use crate::services::decomposition::Decomposition;
pub use crate::services::evaluation_processor::EvaluationRequest;
pub use crate::services::forecast::{EvaluationReport, ModelKind};
pub use crate::services::job_tracker::{Job, JobStatus, LogEntry, LogLevel};
pub use crate::services::normalizer::{ExcludedStation, ExclusionReason, FeedKind};
pub use crate::services::station_lookup::{NearbyStation, StationProfile};
pub use crate::services::stationarity::{RollingStats, StationarityCheck, StationarityReport};
