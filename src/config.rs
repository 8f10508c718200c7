//! Configuration loading from file, environment, and CLI arguments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{DeployOptions, FailurePolicy};
use crate::types::{SyncError, SyncResult, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "SEARCH_DEPLOY_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "search-deploy.toml";

/// Deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Worker pool size.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Records per source page.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause after each accepted bulk write, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// "best-effort" or "fail-fast".
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// JSON dataset standing in for the relational store.
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    /// Persisted local engine state.
    #[serde(default = "default_engine_path")]
    pub engine_path: PathBuf,
    /// Persisted live fingerprints.
    #[serde(default = "default_fingerprints_path")]
    pub fingerprints_path: PathBuf,
    /// How long a deploy waits for another run's lock, in milliseconds.
    #[serde(default)]
    pub lock_timeout_ms: u64,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("dataset.json")
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("engine.json")
}

fn default_fingerprints_path() -> PathBuf {
    PathBuf::from("fingerprints.json")
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            backoff_ms: default_backoff_ms(),
            failure_policy: FailurePolicy::default(),
            dataset_path: default_dataset_path(),
            engine_path: default_engine_path(),
            fingerprints_path: default_fingerprints_path(),
            lock_timeout_ms: 0,
        }
    }
}

impl DeployConfig {
    /// Options for the deploy coordinator.
    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            concurrency: self.concurrency,
            batch_size: self.batch_size,
            backoff: Duration::from_millis(self.backoff_ms),
            failure_policy: self.failure_policy,
        }
    }

    /// Lock file guarding the engine state, next to it.
    pub fn lock_path(&self) -> PathBuf {
        self.engine_path.with_extension("lock")
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> SyncResult<DeployConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    Ok(toml::from_str(&content)?)
}

/// Resolve the config using priority order:
/// 1. Explicit path (CLI arg)
/// 2. SEARCH_DEPLOY_CONFIG environment variable
/// 3. search-deploy.toml in the current directory
/// 4. Built-in defaults
pub fn resolve_config(explicit: Option<&Path>) -> SyncResult<DeployConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return load_config(Path::new(&env_path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return load_config(&local);
    }
    Ok(DeployConfig::default())
}
