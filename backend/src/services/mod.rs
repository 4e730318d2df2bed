//! Analytics services.
//!
//! Everything here is synchronous and CPU-bound except the evaluation
//! processor and the station profile, which read from a [`DataStore`] and
//! hand heavy work to `spawn_blocking`.
//!
//! [`DataStore`]: crate::db::repository::DataStore

pub mod decomposition;
pub mod error;
pub mod evaluation_processor;
pub mod extractor;
pub mod forecast;
pub mod job_tracker;
pub mod normalizer;
pub mod station_lookup;
pub mod stationarity;

pub use decomposition::{additive_decompose, decompose, decompose_with_period, Decomposition};
pub use error::{AnalyticsError, AnalyticsResult};
pub use evaluation_processor::{run_evaluation, EvaluationPlan, EvaluationRequest};
pub use extractor::extract;
pub use forecast::{
    evaluate, repeat_evaluate, repeat_evaluate_parallel, series_to_supervised, summarize,
    walk_forward, ConvNetFactory, ConvNetForecaster, EvaluationReport, Forecaster,
    ForecasterFactory, ModelKind, PersistenceForecaster,
};
pub use job_tracker::{Job, JobStatus, JobTracker, LogEntry, LogLevel};
pub use normalizer::{normalize, normalize_documents, ExcludedStation, NormalizedStations};
pub use station_lookup::{nearest_stations, station_profile, NearbyStation, StationProfile};
pub use stationarity::{
    adf_test, check_stationarity, rolling_stats, stationarity_test, RollingStats,
    StationarityCheck, StationarityReport,
};
