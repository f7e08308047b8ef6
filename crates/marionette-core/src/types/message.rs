//! Action message definitions
//!
//! An ActionMessage is one expressive command issued to the character.
//! Messages are treated as immutable once enqueued.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Upper bound for `duration_sec` on the wire.
pub const MAX_DURATION_SECS: f64 = 120.0;

/// Strongly-typed action ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty IDs are valid on the wire; the scheduler assigns one at enqueue.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ActionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ActionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Per-message rule altering backlog contents at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Append to the backlog tail
    #[default]
    Append,
    /// Clear the backlog, then append (active step untouched)
    Replace,
    /// Clear the backlog, cancel the active step's wait, then append
    Interrupt,
}

impl QueuePolicy {
    /// Parse a wire value. Matching is case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "append" => Some(Self::Append),
            "replace" => Some(Self::Replace),
            "interrupt" => Some(Self::Interrupt),
            _ => None,
        }
    }
}

/// Rule applied when the backlog is full at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail the enqueue; the message is discarded
    Reject,
    /// Drop the incoming message; backlog unchanged
    DropNewest,
    /// Evict the minimum oldest entries needed to fit the incoming message
    #[default]
    DropOldest,
}

/// One expressive command - explicit sum type, one resolver per variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Apply a named facial expression
    Expression { name: String },
    /// Play a motion from a group, optionally at a fixed index
    Motion { group: String, index: Option<u32> },
    /// Composite emote resolved through the preset catalog
    Emote { name: String, intensity: String },
    /// Composite gesture resolved through the preset catalog
    Gesture { name: String },
    /// Composite reaction sequence resolved through the preset catalog
    React { name: String },
}

impl Action {
    /// Wire tag for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expression { .. } => "expression",
            Self::Motion { .. } => "motion",
            Self::Emote { .. } => "emote",
            Self::Gesture { .. } => "gesture",
            Self::React { .. } => "react",
        }
    }
}

/// A validated, canonical action message.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMessage {
    /// Caller-supplied ID; may be empty until the scheduler assigns one
    pub action_id: ActionId,
    /// The command to execute
    pub action: Action,
    /// Post-execution settle wait, in (0, 120] seconds on the wire
    pub duration: Duration,
    /// Enqueue-time backlog rule
    pub queue_policy: QueuePolicy,
    /// Opaque args carried through from the wire form
    pub args: Map<String, Value>,
}

impl ActionMessage {
    /// Build a message with defaults (append policy, no args).
    pub fn new(action: Action, duration: Duration) -> Self {
        Self {
            action_id: ActionId::default(),
            action,
            duration,
            queue_policy: QueuePolicy::Append,
            args: Map::new(),
        }
    }

    /// Set the action ID.
    pub fn with_id(mut self, id: impl Into<ActionId>) -> Self {
        self.action_id = id.into();
        self
    }

    /// Set the queue policy.
    pub fn with_policy(mut self, policy: QueuePolicy) -> Self {
        self.queue_policy = policy;
        self
    }
}

/// Raw wire form of an action message, before normalization.
///
/// `{action_id?, action: {type, name?, args?}, duration_sec, queue_policy?}`
#[derive(Debug, Clone, Deserialize)]
pub struct RawActionMessage {
    #[serde(default)]
    pub action_id: Option<String>,
    pub action: RawAction,
    #[serde(default)]
    pub duration_sec: Option<f64>,
    #[serde(default)]
    pub queue_policy: Option<String>,
}

/// Raw wire form of the action payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_policy_parse_is_case_insensitive() {
        assert_eq!(QueuePolicy::parse("Interrupt"), Some(QueuePolicy::Interrupt));
        assert_eq!(QueuePolicy::parse("APPEND"), Some(QueuePolicy::Append));
        assert_eq!(QueuePolicy::parse("later"), None);
    }

    #[test]
    fn test_raw_message_deserializes_wire_shape() {
        let raw: RawActionMessage = serde_json::from_value(json!({
            "action": {"type": "emote", "name": "happy", "args": {"intensity": "low"}},
            "duration_sec": 1.5,
            "queue_policy": "replace"
        }))
        .unwrap();

        assert_eq!(raw.action.kind, "emote");
        assert_eq!(raw.action.args["intensity"], "low");
        assert_eq!(raw.duration_sec, Some(1.5));
        assert!(raw.action_id.is_none());
    }
}
