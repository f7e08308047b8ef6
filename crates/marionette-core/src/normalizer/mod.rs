//! Message Normalizer module
//!
//! The normalizer is the validation boundary of Marionette: every raw
//! wire command passes through it before the scheduler sees it.
//!
//! Responsibilities:
//! - Validate duration, queue policy, and action shape
//! - Resolve semantic names from fallback args fields
//! - Produce a canonical, immutable ActionMessage
//!
//! Normalization is pure: no side effects, no state.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::types::{
    Action, ActionId, ActionMessage, QueuePolicy, RawAction, RawActionMessage, MAX_DURATION_SECS,
};

/// Args fields consulted, in order, when an action carries no `name`.
const NAME_FALLBACK_FIELDS: &[&str] = &["type", "intent", "emotion", "name"];

/// Intensity used when an emote message does not specify one.
pub const DEFAULT_INTENSITY: &str = "medium";

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("duration_sec must be a finite number in (0, {MAX_DURATION_SECS}], got {0:?}")]
    InvalidDuration(Option<f64>),

    #[error("queue_policy must be one of append/replace/interrupt, got '{0}'")]
    InvalidQueuePolicy(String),

    #[error("action.type must be one of expression/motion/emote/gesture/react, got '{0}'")]
    UnknownActionType(String),

    #[error("{kind} action requires a non-empty {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("motion index must be a non-negative integer, got {0}")]
    InvalidMotionIndex(Value),
}

/// Normalize a raw wire command into a canonical action message.
pub fn normalize(raw: RawActionMessage) -> Result<ActionMessage, ValidationError> {
    let duration = normalize_duration(raw.duration_sec)?;
    let queue_policy = normalize_policy(raw.queue_policy.as_deref())?;
    let action = normalize_action(&raw.action)?;

    Ok(ActionMessage {
        action_id: ActionId::new(raw.action_id.unwrap_or_default()),
        action,
        duration,
        queue_policy,
        args: raw.action.args,
    })
}

fn normalize_duration(duration_sec: Option<f64>) -> Result<Duration, ValidationError> {
    match duration_sec {
        Some(secs) if secs.is_finite() && secs > 0.0 && secs <= MAX_DURATION_SECS => {
            Ok(Duration::from_secs_f64(secs))
        }
        other => Err(ValidationError::InvalidDuration(other)),
    }
}

fn normalize_policy(raw: Option<&str>) -> Result<QueuePolicy, ValidationError> {
    match raw {
        None => Ok(QueuePolicy::Append),
        Some(value) => QueuePolicy::parse(value)
            .ok_or_else(|| ValidationError::InvalidQueuePolicy(value.to_string())),
    }
}

fn normalize_action(raw: &RawAction) -> Result<Action, ValidationError> {
    match raw.kind.as_str() {
        "expression" => Ok(Action::Expression {
            name: require_name(raw, "expression")?,
        }),
        "motion" => normalize_motion(raw),
        "emote" => Ok(Action::Emote {
            name: semantic_name(raw, "emote")?,
            intensity: intensity(raw),
        }),
        "gesture" => Ok(Action::Gesture {
            name: semantic_name(raw, "gesture")?,
        }),
        "react" => Ok(Action::React {
            name: semantic_name(raw, "react")?,
        }),
        other => Err(ValidationError::UnknownActionType(other.to_string())),
    }
}

fn normalize_motion(raw: &RawAction) -> Result<Action, ValidationError> {
    // Group comes from args.group, falling back to the action name.
    let group = arg_str(raw, "group")
        .or_else(|| non_empty(raw.name.as_deref()))
        .ok_or(ValidationError::MissingField {
            kind: "motion",
            field: "group",
        })?;

    let index = match raw.args.get("index") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let parsed = value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| ValidationError::InvalidMotionIndex(value.clone()))?;
            Some(parsed)
        }
    };

    Ok(Action::Motion { group, index })
}

fn require_name(raw: &RawAction, kind: &'static str) -> Result<String, ValidationError> {
    non_empty(raw.name.as_deref()).ok_or(ValidationError::MissingField { kind, field: "name" })
}

/// Semantic name for composite actions: `name`, then args fallbacks.
fn semantic_name(raw: &RawAction, kind: &'static str) -> Result<String, ValidationError> {
    if let Some(name) = non_empty(raw.name.as_deref()) {
        return Ok(name);
    }
    for &field in NAME_FALLBACK_FIELDS {
        if let Some(name) = arg_str(raw, field) {
            return Ok(name);
        }
    }
    Err(ValidationError::MissingField { kind, field: "name" })
}

fn intensity(raw: &RawAction) -> String {
    arg_str(raw, "intensity").unwrap_or_else(|| DEFAULT_INTENSITY.to_string())
}

fn arg_str(raw: &RawAction, key: &str) -> Option<String> {
    raw.args
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| non_empty(Some(s)))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
