//! Application configuration file support.
//!
//! Settings are read from a TOML file (`bikeshare.toml`) and can be
//! overridden from the environment. Every section and field has a default,
//! so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::db::factory::RepositoryType;
use crate::db::repository::RepositoryError;
use crate::models::{ForecastConfig, ForecastConfigParams, Granularity};
use crate::services::error::AnalyticsResult;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub repository: RepositorySettings,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub forecast: ForecastSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Repository type settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(rename = "type", default = "default_repo_type")]
    pub repo_type: String,
}

fn default_repo_type() -> String {
    "local".to_string()
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            repo_type: default_repo_type(),
        }
    }
}

/// Persisted artifact location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSettings {
    /// Directory holding `stations.json`, `trips.jsonl` and `history.jsonl`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Write the station table back after every refresh.
    #[serde(default)]
    pub persist_refresh: bool,
}

/// Live feed endpoints and fetch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_bike_angels_url")]
    pub bike_angels_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_discovery_url() -> String {
    "https://gbfs.citibikenyc.com/gbfs/gbfs.json".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_bike_angels_url() -> String {
    "https://layer.bicyclesharing.net/map/v1/nyc/stations".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            discovery_url: default_discovery_url(),
            language: default_language(),
            bike_angels_url: default_bike_angels_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Defaults for series extraction and stationarity checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
}

fn default_rolling_window() -> usize {
    6
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            rolling_window: default_rolling_window(),
        }
    }
}

/// Defaults for forecast evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSettings {
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    /// Run repeats on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
    /// Base seed; run `i` uses `seed + i`. Unset means entropy-seeded runs.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub model: ForecastConfigParams,
    /// Finished evaluation jobs kept for status queries; older ones are evicted.
    #[serde(default = "default_retain_finished_jobs")]
    pub retain_finished_jobs: usize,
}

fn default_repeats() -> usize {
    30
}

fn default_retain_finished_jobs() -> usize {
    100
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            repeats: default_repeats(),
            parallel: false,
            seed: None,
            model: ForecastConfigParams::default(),
            retain_finished_jobs: default_retain_finished_jobs(),
        }
    }
}

impl ForecastSettings {
    pub fn model_config(&self) -> AnalyticsResult<ForecastConfig> {
        ForecastConfig::try_from(self.model)
    }
}

/// HTTP bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit_mb() -> usize {
    16
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RepositoryError::configuration(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RepositoryError> {
        toml::from_str(content).map_err(|e| {
            RepositoryError::configuration(format!("Failed to parse config file: {}", e))
        })
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `bikeshare.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self, RepositoryError> {
        let search_paths = [
            PathBuf::from("bikeshare.toml"),
            PathBuf::from("backend/bikeshare.toml"),
            PathBuf::from("../bikeshare.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(RepositoryError::configuration(
            "No bikeshare.toml found in standard locations",
        ))
    }

    /// Default-location file if present, built-in defaults otherwise, then
    /// environment overrides on top.
    pub fn load() -> Result<Self, RepositoryError> {
        let config = match Self::from_default_location() {
            Ok(config) => config,
            Err(RepositoryError::ConfigurationError { message, .. })
                if message.starts_with("No bikeshare.toml") =>
            {
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.with_env_overrides()
    }

    /// Apply `HOST`, `PORT`, `REPOSITORY_TYPE`, `SNAPSHOT_DIR` and `FEED_DISCOVERY_URL`.
    pub fn with_env_overrides(mut self) -> Result<Self, RepositoryError> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port.parse().map_err(|_| {
                RepositoryError::configuration(format!("PORT is not a valid port: {}", port))
            })?;
        }
        if let Ok(repo_type) = std::env::var("REPOSITORY_TYPE") {
            self.repository.repo_type = repo_type;
        }
        if let Ok(dir) = std::env::var("SNAPSHOT_DIR") {
            self.snapshot.dir = Some(PathBuf::from(dir));
        }
        if let Ok(url) = std::env::var("FEED_DISCOVERY_URL") {
            self.feed.discovery_url = url;
        }
        Ok(self)
    }

    /// Get the repository type from configuration.
    pub fn repository_type(&self) -> Result<RepositoryType, String> {
        RepositoryType::from_str(&self.repository.repo_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.repository_type().unwrap(), RepositoryType::Local);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.analysis.rolling_window, 6);
        assert_eq!(config.forecast.repeats, 30);
        assert_eq!(config.feed.max_retries, 1);
        assert!(config.snapshot.dir.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[repository]
type = "snapshot"

[snapshot]
dir = "data/2019-07"
persist_refresh = true

[feed]
language = "fr"
timeout_secs = 3

[analysis]
granularity = "15min"
rolling_window = 12

[forecast]
repeats = 5
parallel = true
seed = 42

[forecast.model]
sequence_length = 2
step_length = 3
kernel_size = 2

[server]
port = 9000
"#;

        let config = AppConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.repository_type().unwrap(), RepositoryType::Snapshot);
        assert_eq!(config.snapshot.dir, Some(PathBuf::from("data/2019-07")));
        assert!(config.snapshot.persist_refresh);
        assert_eq!(config.feed.language, "fr");
        assert_eq!(config.feed.timeout_secs, 3);
        assert_eq!(config.analysis.granularity.seconds(), 900);
        assert_eq!(config.forecast.seed, Some(42));
        let model = config.forecast.model_config().unwrap();
        assert_eq!(model.input_width(), 6);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_granularity_rejected() {
        let result = AppConfig::from_toml_str("[analysis]\ngranularity = \"often\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_model_surfaces_on_use() {
        let config =
            AppConfig::from_toml_str("[forecast.model]\nstep_length = 1\nkernel_size = 2\n")
                .unwrap();
        assert!(config.forecast.model_config().is_err());
    }
}
