//! Application state for the HTTP server.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::repository::DataStore;
use crate::feed::FeedSource;
use crate::services::job_tracker::JobTracker;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for station data and history
    pub repository: Arc<dyn DataStore>,
    /// Background evaluation jobs
    pub job_tracker: JobTracker,
    /// Where station refreshes fetch the live feed from
    pub feed_source: Arc<dyn FeedSource>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn DataStore>,
        feed_source: Arc<dyn FeedSource>,
        config: AppConfig,
    ) -> Self {
        Self {
            repository,
            job_tracker: JobTracker::with_retention(config.forecast.retain_finished_jobs),
            feed_source,
            config: Arc::new(config),
        }
    }
}
