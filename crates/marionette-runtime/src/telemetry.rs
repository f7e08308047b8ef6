//! Telemetry events and sinks
//!
//! The player reports scheduling facts (enqueue/start/done/fail/drop)
//! to registered sinks. Sink failures are logged and swallowed; a bad
//! observer never affects scheduling.

use serde::Serialize;
use tokio::sync::broadcast;

use marionette_core::types::ActionId;

/// One scheduling fact, carrying the backlog size at emission time.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Enqueue {
        action_id: ActionId,
        queue_size: usize,
    },
    Start {
        action_id: ActionId,
        queue_size: usize,
    },
    Done {
        action_id: ActionId,
        queue_size: usize,
    },
    Fail {
        action_id: ActionId,
        error: String,
        queue_size: usize,
    },
    Drop {
        reason: String,
        dropped: usize,
        queue_size: usize,
    },
}

impl TelemetryEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enqueue { .. } => "enqueue",
            Self::Start { .. } => "start",
            Self::Done { .. } => "done",
            Self::Fail { .. } => "fail",
            Self::Drop { .. } => "drop",
        }
    }
}

/// Telemetry observer.
///
/// `report` is called synchronously from the scheduling path, including
/// from inside `enqueue`. Sinks must be fast and must not call back into
/// the player.
pub trait TelemetrySink: Send + Sync {
    fn report(&self, event: &TelemetryEvent) -> Result<(), String>;
}

/// In-process telemetry fan-out based on tokio broadcast channels.
pub struct BroadcastTelemetry {
    tx: broadcast::Sender<TelemetryEvent>,
    capacity: usize,
}

impl BroadcastTelemetry {
    /// Create a new broadcast sink with channel capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Return the configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribe to the live event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastTelemetry {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl TelemetrySink for BroadcastTelemetry {
    fn report(&self, event: &TelemetryEvent) -> Result<(), String> {
        // "No receiver" is not an error; events are fire-and-forget.
        match self.tx.send(event.clone()) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_telemetry_delivers_events() {
        tokio_test::block_on(async {
            let bus = BroadcastTelemetry::new(16);
            let mut rx = bus.subscribe();

            bus.report(&TelemetryEvent::Enqueue {
                action_id: ActionId::new("a-1"),
                queue_size: 1,
            })
            .unwrap();

            let event = rx.recv().await.expect("delivered event");
            assert_eq!(event.name(), "enqueue");
        });
    }

    #[test]
    fn test_report_without_subscribers_is_not_an_error() {
        let bus = BroadcastTelemetry::new(4);
        bus.report(&TelemetryEvent::Drop {
            reason: "queue_overflow_drop_oldest".to_string(),
            dropped: 2,
            queue_size: 4,
        })
        .unwrap();
    }
}
