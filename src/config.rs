//! Configuration loading. Values come from built-in defaults, then `config.toml` in the application
//! directory (or an explicitly given file), then `SITETIME_*` environment variables.

use std::{path::Path, time::Duration};

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::daemon::scheduler::SchedulerConfig;

pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "SITETIME_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tick_interval_ms: u64,
    pub day_check_interval_secs: u64,
    pub midnight_offset_ms: u64,
    pub event_channel_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,
}

/// Remote aggregation server. Sync is off unless this section is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub endpoint: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_debounce_ms() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            day_check_interval_secs: 5 * 60,
            midnight_offset_ms: 1000,
            event_channel_capacity: 64,
            sync: None,
        }
    }
}

impl Config {
    pub fn load(app_dir: &Path, config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(app_dir.join(CONFIG_FILE)));

        if let Some(path) = config_path {
            if !path.exists() {
                bail!("Config file {path:?} doesn't exist");
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms has to be positive");
        }
        if self.day_check_interval_secs == 0 {
            bail!("day_check_interval_secs has to be positive");
        }
        if self.event_channel_capacity == 0 {
            bail!("event_channel_capacity has to be positive");
        }
        if let Some(sync) = &self.sync {
            if sync.queue_capacity == 0 {
                bail!("sync.queue_capacity has to be positive");
            }
        }
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            day_check_interval: Duration::from_secs(self.day_check_interval_secs),
            midnight_offset: Duration::from_millis(self.midnight_offset_ms),
        }
    }
}
