//! Step type definitions
//!
//! Step is one atomic primitive call in the resolved execution plan of
//! an action. Plans are ordered; the executor runs them sequentially.

use serde::{Deserialize, Serialize};

/// One runtime parameter update applied through the param-batch primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamUpdate {
    /// Model parameter name, e.g. "ParamMouthForm"
    pub name: String,
    /// Target value
    pub value: f64,
}

impl ParamUpdate {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Reference to a motion group entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionRef {
    pub group: String,
    #[serde(default)]
    pub index: Option<u32>,
}

/// A resolved primitive step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Apply a named expression
    Expression { name: String },
    /// Play a motion
    Motion { group: String, index: Option<u32> },
    /// Apply a batch of parameter updates
    ParamBatch { updates: Vec<ParamUpdate> },
    /// Sleep for a fixed interval between steps
    Wait { ms: u64 },
}

impl Step {
    pub fn expression(name: impl Into<String>) -> Self {
        Self::Expression { name: name.into() }
    }

    pub fn motion(group: impl Into<String>, index: Option<u32>) -> Self {
        Self::Motion {
            group: group.into(),
            index,
        }
    }

    pub fn param_batch(updates: Vec<ParamUpdate>) -> Self {
        Self::ParamBatch { updates }
    }

    pub fn wait(ms: u64) -> Self {
        Self::Wait { ms }
    }
}
