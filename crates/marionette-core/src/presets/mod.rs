//! Preset catalog
//!
//! Presets map composite actions (emote/gesture/react) to concrete
//! primitive step templates. The catalog is read-only: it is loaded once
//! and shared behind an Arc for the lifetime of the scheduler.
//!
//! React entries are an internally-tagged enum, so an unknown entry type
//! is rejected when the catalog is deserialized and a partial plan can
//! never be produced.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{MotionRef, ParamUpdate};

/// Intensity bucket used when the requested one is not defined.
pub const FALLBACK_INTENSITY: &str = "medium";

fn default_version() -> u32 {
    1
}

/// Read-only mapping from composite action names to step templates.
#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    /// Catalog schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// `emote[name][intensity]` -> expression/params template
    #[serde(default)]
    pub emote: HashMap<String, HashMap<String, EmotePreset>>,
    /// `gesture[name]` -> expression/motion template
    #[serde(default)]
    pub gesture: HashMap<String, GesturePreset>,
    /// `react[name]` -> ordered step sequence
    #[serde(default)]
    pub react: HashMap<String, Vec<ReactStep>>,
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            emote: HashMap::new(),
            gesture: HashMap::new(),
            react: HashMap::new(),
        }
    }
}

impl PresetConfig {
    /// Empty catalog; expression/motion passthrough still works without one.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up an emote template, falling back to the "medium" intensity
    /// bucket when the requested one is not defined.
    pub fn emote(&self, name: &str, intensity: &str) -> Option<&EmotePreset> {
        let buckets = self.emote.get(name)?;
        buckets
            .get(intensity)
            .or_else(|| buckets.get(FALLBACK_INTENSITY))
    }

    /// Look up a gesture template.
    pub fn gesture(&self, name: &str) -> Option<&GesturePreset> {
        self.gesture.get(name)
    }

    /// Look up a reaction sequence. Empty sequences count as absent.
    pub fn react(&self, name: &str) -> Option<&[ReactStep]> {
        self.react
            .get(name)
            .map(Vec::as_slice)
            .filter(|steps| !steps.is_empty())
    }
}

/// Emote template: optional expression plus parameter updates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmotePreset {
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamUpdate>,
}

/// Gesture template: optional expression plus optional motion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GesturePreset {
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub motion: Option<MotionRef>,
}

/// One entry of a reaction sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactStep {
    Wait { ms: u64 },
    Expression { name: String },
    Motion {
        group: String,
        #[serde(default)]
        index: Option<u32>,
    },
    ParamBatch { updates: Vec<ParamUpdate> },
}
