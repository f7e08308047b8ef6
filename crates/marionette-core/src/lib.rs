//! # Marionette Core
//!
//! Core abstractions and deterministic logic for the Marionette action
//! scheduler.
//!
//! This crate contains:
//! - ActionMessage / Action / Step definitions
//! - Message normalizer (wire validation boundary)
//! - Preset catalog for composite actions
//! - Action executor and the avatar-bridge abstraction
//!
//! This crate does NOT care about:
//! - Queueing, preemption, or backpressure (see marionette-runtime)
//! - Where preset files live on disk (see marionette-config)
//! - How the character is actually rendered

pub mod executor;
pub mod normalizer;
pub mod presets;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::executor::{
        ActionExecutor, AvatarBridge, Clock, ExecError, PrimitiveError, TokioClock,
    };
    pub use crate::normalizer::{normalize, ValidationError, DEFAULT_INTENSITY};
    pub use crate::presets::{
        EmotePreset, GesturePreset, PresetConfig, ReactStep, FALLBACK_INTENSITY,
    };
    pub use crate::types::{
        Action, ActionId, ActionMessage, MotionRef, OverflowPolicy, ParamUpdate, QueuePolicy,
        RawAction, RawActionMessage, Step,
    };
}

// Re-export key types at crate root
pub use executor::{ActionExecutor, AvatarBridge, Clock, ExecError, PrimitiveError, TokioClock};
pub use normalizer::{normalize, ValidationError};
pub use presets::PresetConfig;
pub use types::{
    Action, ActionId, ActionMessage, OverflowPolicy, ParamUpdate, QueuePolicy, RawActionMessage,
    Step,
};
