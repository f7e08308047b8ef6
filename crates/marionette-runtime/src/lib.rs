//! # Marionette Runtime
//!
//! Scheduling layer for Marionette.
//!
//! This crate provides:
//! - ActionQueuePlayer: bounded backlog, enqueue policies, run loop,
//!   duration pacing, idle fallback
//! - ActionMutex: FIFO execution lock with failure isolation
//! - Telemetry events and sinks
//! - Idle-cycle hooks

pub mod hooks;
pub mod mutex;
pub mod player;
pub mod telemetry;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hooks::{IdleHook, IdleOutcome};
    pub use crate::mutex::{ActionMutex, MutexError, MutexSnapshot};
    pub use crate::player::{
        ActionQueuePlayer, EnqueueError, EnqueueOutcome, PlayerConfig, PlayerSnapshot,
        WaitForIdleError,
    };
    pub use crate::telemetry::{BroadcastTelemetry, TelemetryEvent, TelemetrySink};
}

// Re-export key types at crate root
pub use hooks::{IdleHook, IdleOutcome};
pub use mutex::{ActionMutex, MutexError, MutexSnapshot};
pub use player::{
    ActionQueuePlayer, EnqueueError, EnqueueOutcome, PlayerConfig, PlayerSnapshot,
    WaitForIdleError, REASON_DROP_NEWEST, REASON_DROP_OLDEST, REASON_REJECT,
};
pub use telemetry::{BroadcastTelemetry, TelemetryEvent, TelemetrySink};
