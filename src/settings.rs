use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::batch::{BatchOptions, FailurePolicy, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_WINDOW_SIZE};
use crate::top_pages::{SelectionOptions, DEFAULT_TOP_N};

const ENV_PREFIX: &str = "RANKER";
const DEFAULT_DB_PATH: &str = "data/pages.sqlite";

/// Run settings, read from `RANKER_*` environment variables over built-in defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub window_size: i64,
    pub top_n: i64,
    pub update_attempts: u32,
    pub retry_backoff_ms: u64,
    pub additive_flags: bool,
    pub keep_going: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("window_size", DEFAULT_WINDOW_SIZE)?
            .set_default("top_n", DEFAULT_TOP_N)?
            .set_default("update_attempts", 1i64)?
            .set_default("retry_backoff_ms", DEFAULT_RETRY_BACKOFF_MS as i64)?
            .set_default("additive_flags", false)?
            .set_default("keep_going", false)?
            .add_source(env)
            .build()?
            .try_deserialize()
            .context("invalid RANKER_* configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size < 1 {
            bail!("window_size must be at least 1 (got {})", self.window_size);
        }
        if self.top_n < 1 {
            bail!("top_n must be at least 1 (got {})", self.top_n);
        }
        if self.update_attempts < 1 {
            bail!("update_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            window_size: self.window_size,
            update_attempts: self.update_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            failure_policy: if self.keep_going {
                FailurePolicy::Collect
            } else {
                FailurePolicy::FailFast
            },
        }
    }

    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            top_n: self.top_n,
            additive: self.additive_flags,
        }
    }
}
