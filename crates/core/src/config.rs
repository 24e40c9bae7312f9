//! Runtime settings, read from `CUESYNC_*` environment variables.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout applied to every network call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Remote editor API. When unset, saves go to the local store.
    pub api_url: Option<String>,
    pub data_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub request_timeout: Duration,
    pub platform: String,
    pub lang: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            data_dir: PathBuf::from("subtitle"),
            ledger_path: PathBuf::from("ledger.sqlite3"),
            request_timeout: DEFAULT_TIMEOUT,
            platform: "youtube".to_string(),
            lang: "ko".to_string(),
        }
    }
}

impl Config {
    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable lookup; unset names keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        if let Some(url) = lookup("CUESYNC_API_URL").filter(|v| !v.is_empty()) {
            cfg.api_url = Some(url);
        }
        if let Some(dir) = lookup("CUESYNC_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("CUESYNC_LEDGER") {
            cfg.ledger_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("CUESYNC_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("CUESYNC_TIMEOUT_SECS must be whole seconds, got {secs:?}"))?;
            cfg.request_timeout = Duration::from_secs(secs);
        }
        Ok(cfg)
    }
}
