//! # Marionette Config
//!
//! Single-file configuration for Marionette. A `marionette.yaml` can
//! configure the scheduler (backlog bound, overflow policy, tick
//! granularity, idle fallback) and the preset catalog for composite
//! actions. Preset catalogs can also be loaded standalone.

mod loader;

pub use loader::{load_config, load_presets, parse_config, parse_presets, ConfigError};

use serde::Deserialize;

use marionette_core::normalizer::normalize;
use marionette_core::presets::PresetConfig;
use marionette_core::types::{ActionMessage, OverflowPolicy, RawActionMessage};

fn default_version() -> u32 {
    1
}

/// Top-level configuration schema for Marionette.
#[derive(Debug, Clone, Deserialize)]
pub struct MarionetteConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub presets: PresetConfig,
}

impl Default for MarionetteConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            scheduler: SchedulerSettings::default(),
            presets: PresetConfig::default(),
        }
    }
}

/// Scheduler section of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Raw wire form of the idle fallback action, normalized on demand.
    #[serde(default)]
    pub idle_action: Option<RawActionMessage>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            overflow: OverflowPolicy::default(),
            tick_ms: default_tick_ms(),
            idle_action: None,
        }
    }
}

fn default_max_queue_size() -> usize {
    8
}

fn default_tick_ms() -> u64 {
    50
}

impl SchedulerSettings {
    /// Normalize the configured idle action, if any.
    pub fn idle_action_message(&self) -> Result<Option<ActionMessage>, ConfigError> {
        match &self.idle_action {
            None => Ok(None),
            Some(raw) => normalize(raw.clone())
                .map(Some)
                .map_err(|e| ConfigError::Invalid(format!("scheduler.idle_action: {e}"))),
        }
    }
}
