//! Repository factory for dependency injection.
//!
//! Creates the configured [`DataStore`] once at start-up; the instance is then
//! passed explicitly to services and the HTTP state.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::repositories::{LocalRepository, SnapshotRepository};
use super::repository::{DataStore, RepositoryError, RepositoryResult};
use crate::config::AppConfig;

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Empty in-memory store
    Local,
    /// In-memory store loaded from a snapshot directory
    Snapshot,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Parse repository type from string ("local", "memory", "snapshot", "files").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "memory" => Ok(Self::Local),
            "snapshot" | "files" => Ok(Self::Snapshot),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl RepositoryType {
    /// Get repository type from environment variable.
    ///
    /// Reads `REPOSITORY_TYPE`. Defaults to Snapshot when `SNAPSHOT_DIR` is
    /// set, otherwise Local.
    pub fn from_env() -> Self {
        if let Ok(val) = std::env::var("REPOSITORY_TYPE") {
            return val.parse().unwrap_or(Self::Local);
        }

        if std::env::var("SNAPSHOT_DIR").is_ok() {
            Self::Snapshot
        } else {
            Self::Local
        }
    }
}

/// Repository factory for creating repository instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a repository instance based on type.
    ///
    /// # Arguments
    /// * `repo_type` - Type of repository to create
    /// * `snapshot_dir` - Snapshot directory (required for Snapshot)
    /// * `persist_refresh` - Write refreshed station tables back to the snapshot
    pub async fn create(
        repo_type: RepositoryType,
        snapshot_dir: Option<&Path>,
        persist_refresh: bool,
    ) -> RepositoryResult<Arc<dyn DataStore>> {
        match repo_type {
            RepositoryType::Local => Ok(Self::create_local()),
            RepositoryType::Snapshot => {
                let dir = snapshot_dir.ok_or_else(|| {
                    RepositoryError::configuration(
                        "Snapshot repository requires 'snapshot.dir' (or SNAPSHOT_DIR)",
                    )
                })?;
                let repo = SnapshotRepository::open(dir, persist_refresh).await?;
                Ok(Arc::new(repo) as Arc<dyn DataStore>)
            }
        }
    }

    /// Create an in-memory local repository.
    pub fn create_local() -> Arc<dyn DataStore> {
        Arc::new(LocalRepository::new())
    }

    /// Create repository from environment configuration
    /// (`REPOSITORY_TYPE`, `SNAPSHOT_DIR`).
    pub async fn from_env() -> RepositoryResult<Arc<dyn DataStore>> {
        let dir = std::env::var("SNAPSHOT_DIR").ok();
        Self::create(
            RepositoryType::from_env(),
            dir.as_deref().map(Path::new),
            false,
        )
        .await
    }

    /// Create repository from a TOML configuration file.
    pub async fn from_config_file<P: AsRef<Path>>(
        config_path: P,
    ) -> RepositoryResult<Arc<dyn DataStore>> {
        let config = AppConfig::from_file(config_path)?;
        Self::from_app_config(&config).await
    }

    /// Create repository from a loaded [`AppConfig`].
    pub async fn from_app_config(config: &AppConfig) -> RepositoryResult<Arc<dyn DataStore>> {
        let repo_type = config.repository_type().map_err(|e| {
            RepositoryError::configuration(format!("Invalid repository type: {}", e))
        })?;
        Self::create(
            repo_type,
            config.snapshot.dir.as_deref(),
            config.snapshot.persist_refresh,
        )
        .await
    }
}
