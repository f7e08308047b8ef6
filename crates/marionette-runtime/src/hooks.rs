//! Idle-cycle hook extension point.

use async_trait::async_trait;

use marionette_core::types::ActionMessage;

/// What the idle fallback did, handed to post-idle hooks.
#[derive(Debug, Clone)]
pub struct IdleOutcome {
    /// The idle action that was executed.
    pub idle_action: ActionMessage,
    /// Error string when the idle execution failed.
    pub idle_error: Option<String>,
}

/// Post-idle extension point. Hook failures are logged, never thrown.
#[async_trait]
pub trait IdleHook: Send + Sync {
    async fn on_idle_applied(&self, _outcome: &IdleOutcome) -> Result<(), String> {
        Ok(())
    }
}
