//! Core type definitions
//!
//! Message types describe what a caller asked for; step types describe
//! the resolved plan the executor actually runs.

mod message;
mod step;

pub use message::{
    Action, ActionId, ActionMessage, OverflowPolicy, QueuePolicy, RawAction, RawActionMessage,
    MAX_DURATION_SECS,
};
pub use step::{MotionRef, ParamUpdate, Step};
