//! Shared helpers for the integration tests.

use std::sync::Mutex;

/// Every variable `AppConfig` and `RepositoryType::from_env` read.
pub const CONFIG_ENV_VARS: &[&str] = &[
    "HOST",
    "PORT",
    "REPOSITORY_TYPE",
    "SNAPSHOT_DIR",
    "FEED_DISCOVERY_URL",
];

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with every config variable unset except `vars`.
///
/// Holds a process-wide lock so parallel tests never observe each other's
/// environment, and restores the previous values on drop (including unwind).
pub fn with_config_env<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _restore = EnvRestore::capture(vars);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    f()
}

struct EnvRestore(Vec<(String, Option<String>)>);

impl EnvRestore {
    fn capture(vars: &[(&str, &str)]) -> Self {
        let mut keys: Vec<&str> = CONFIG_ENV_VARS.to_vec();
        keys.extend(vars.iter().map(|(k, _)| *k));
        keys.sort_unstable();
        keys.dedup();
        Self(
            keys.into_iter()
                .map(|k| (k.to_string(), std::env::var(k).ok()))
                .collect(),
        )
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.0.drain(..) {
            match value {
                Some(v) => std::env::set_var(&key, v),
                None => std::env::remove_var(&key),
            }
        }
    }
}
