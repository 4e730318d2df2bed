//! Environment handling for configuration and repository selection.

mod support;

use std::str::FromStr;

use bikeshare::config::AppConfig;
use bikeshare::db::{RepositoryFactory, RepositoryType, StationRepository};

#[test]
fn test_repository_type_from_str() {
    assert_eq!(RepositoryType::from_str("LOCAL").unwrap(), RepositoryType::Local);
    assert_eq!(RepositoryType::from_str("memory").unwrap(), RepositoryType::Local);
    assert_eq!(RepositoryType::from_str("snapshot").unwrap(), RepositoryType::Snapshot);
    assert!(RepositoryType::from_str("postgres")
        .unwrap_err()
        .contains("Unknown repository type"));
}

#[test]
fn test_repository_type_from_env_default() {
    support::with_config_env(&[], || {
        assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
    });
}

#[test]
fn test_snapshot_dir_selects_snapshot() {
    support::with_config_env(&[("SNAPSHOT_DIR", "/tmp/bikeshare")], || {
        assert_eq!(RepositoryType::from_env(), RepositoryType::Snapshot);
    });
}

#[test]
fn test_explicit_type_wins_over_snapshot_dir() {
    support::with_config_env(
        &[("REPOSITORY_TYPE", "local"), ("SNAPSHOT_DIR", "/tmp/bikeshare")],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
        },
    );
}

#[test]
fn test_env_overrides_config() {
    support::with_config_env(
        &[
            ("HOST", "127.0.0.1"),
            ("PORT", "9090"),
            ("FEED_DISCOVERY_URL", "http://localhost/gbfs.json"),
        ],
        || {
            let config = AppConfig::default().with_env_overrides().unwrap();
            assert_eq!(config.server.host, "127.0.0.1");
            assert_eq!(config.server.port, 9090);
            assert_eq!(config.feed.discovery_url, "http://localhost/gbfs.json");
        },
    );
}

#[test]
fn test_invalid_port_is_configuration_error() {
    support::with_config_env(&[("PORT", "not-a-port")], || {
        let err = AppConfig::default().with_env_overrides().unwrap_err();
        assert!(err.to_string().contains("PORT"));
    });
}

#[test]
fn test_defaults_when_environment_is_clean() {
    support::with_config_env(&[], || {
        let config = AppConfig::default().with_env_overrides().unwrap();
        assert_eq!(config.server.port, AppConfig::default().server.port);
        assert_eq!(config.repository_type().unwrap(), RepositoryType::Local);
    });
}

#[tokio::test]
async fn test_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bikeshare.toml");
    std::fs::write(
        &path,
        format!(
            "[repository]\ntype = \"snapshot\"\n\n[snapshot]\ndir = \"{}\"\n",
            dir.path().display()
        ),
    )
    .unwrap();

    let repo = RepositoryFactory::from_config_file(&path).await.unwrap();
    assert!(repo.health_check().await.unwrap());
}
