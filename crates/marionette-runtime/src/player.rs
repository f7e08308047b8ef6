//! Action Queue Player - the top-level scheduler
//!
//! The player owns the bounded backlog, the enqueue policy pipeline, the
//! run loop, duration pacing, the idle fallback, and telemetry. Actions
//! execute one at a time through the action mutex; a failing action is
//! logged and reported but never stops the loop.
//!
//! `enqueue` is synchronous and never blocks: it applies the queue and
//! overflow policies under a lock and returns an acceptance or a drop
//! result immediately.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use marionette_core::executor::{ActionExecutor, Clock, TokioClock};
use marionette_core::types::{Action, ActionId, ActionMessage, OverflowPolicy, QueuePolicy};

use crate::hooks::{IdleHook, IdleOutcome};
use crate::mutex::ActionMutex;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Drop reason reported when the incoming message is discarded.
pub const REASON_DROP_NEWEST: &str = "queue_overflow_drop_newest";
/// Drop reason reported when oldest entries are evicted.
pub const REASON_DROP_OLDEST: &str = "queue_overflow_drop_oldest";
/// Drop reason reported when the enqueue is rejected outright.
pub const REASON_REJECT: &str = "queue_overflow_reject";

/// Configuration for the queue player.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Backlog capacity; the bound holds immediately after every enqueue.
    pub max_queue_size: usize,
    /// Rule applied when the backlog is full at enqueue time.
    pub overflow: OverflowPolicy,
    /// Granularity of the post-execution settle wait. An interrupt takes
    /// effect within one tick rather than the full duration.
    pub tick: Duration,
    /// Action executed once per drain cycle when the backlog empties.
    pub idle_action: Option<ActionMessage>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 8,
            overflow: OverflowPolicy::default(),
            tick: Duration::from_millis(50),
            idle_action: None,
        }
    }
}

/// Result of an accepted or softly-dropped enqueue.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// The message was appended to the backlog.
    Accepted {
        action_id: ActionId,
        queue_size: usize,
    },
    /// The incoming message was dropped; the backlog is unchanged.
    Dropped { reason: String },
}

/// Enqueue-time failures
#[derive(Debug, Error, PartialEq)]
pub enum EnqueueError {
    #[error("queue overflow: backlog is at capacity ({capacity})")]
    Overflow { capacity: usize },
}

/// `wait_for_idle` failures
#[derive(Debug, Error, PartialEq)]
pub enum WaitForIdleError {
    #[error("timed out after {0:?} waiting for idle")]
    Timeout(Duration),

    #[error("player was dropped while waiting for idle")]
    Closed,
}

/// Point-in-time scheduler state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub queue_size: usize,
    pub loop_running: bool,
    pub active_action_id: Option<ActionId>,
    pub dropped_count: u64,
    pub idle_action_applied: bool,
}

/// The currently executing message plus its cancellation token.
struct ActiveStep {
    action_id: ActionId,
    cancel: CancellationToken,
}

/// Mutable queue state, owned solely by the player.
struct QueueState {
    backlog: VecDeque<ActionMessage>,
    active: Option<ActiveStep>,
    loop_running: bool,
    stop_requested: bool,
    dropped_count: u64,
    idle_applied: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        !self.loop_running && self.backlog.is_empty() && self.active.is_none()
    }
}

struct PlayerShared {
    config: PlayerConfig,
    executor: Arc<ActionExecutor>,
    mutex: ActionMutex,
    clock: Arc<dyn Clock>,
    sinks: RwLock<Vec<Arc<dyn TelemetrySink>>>,
    idle_hooks: RwLock<Vec<Arc<dyn IdleHook>>>,
    queue: Mutex<QueueState>,
    idle_tx: watch::Sender<bool>,
}

impl PlayerShared {
    /// Report to every sink; sink failures are logged and swallowed.
    fn emit(&self, event: &TelemetryEvent) {
        let sinks = self.sinks.read().unwrap_or_else(|e| e.into_inner()).clone();
        for sink in sinks {
            if let Err(err) = sink.report(event) {
                tracing::warn!(error = %err, event = event.name(), "telemetry sink failed");
            }
        }
    }

    fn publish_idle(&self, queue: &QueueState) {
        self.idle_tx.send_replace(queue.is_idle());
    }

    fn queue_size(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .backlog
            .len()
    }
}

/// What the run loop decided to do next, picked under the queue lock.
enum Next {
    Run {
        message: ActionMessage,
        cancel: CancellationToken,
        queue_size: usize,
    },
    IdleFallback(ActionMessage),
    Exit,
}

/// The top-level scheduler. Cheap to clone handles are not provided; the
/// player itself is `Send + Sync` and is normally shared behind an Arc.
pub struct ActionQueuePlayer {
    shared: Arc<PlayerShared>,
}

impl ActionQueuePlayer {
    /// Create a player with the production clock.
    ///
    /// Must be called from within a tokio runtime; the mutex worker is
    /// spawned here.
    pub fn new(executor: Arc<ActionExecutor>, config: PlayerConfig) -> Self {
        Self::with_clock(executor, config, Arc::new(TokioClock))
    }

    /// Create a player with a custom clock.
    pub fn with_clock(
        executor: Arc<ActionExecutor>,
        config: PlayerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (idle_tx, _) = watch::channel(true);
        Self {
            shared: Arc::new(PlayerShared {
                config,
                executor,
                mutex: ActionMutex::new(),
                clock,
                sinks: RwLock::new(Vec::new()),
                idle_hooks: RwLock::new(Vec::new()),
                queue: Mutex::new(QueueState {
                    backlog: VecDeque::new(),
                    active: None,
                    loop_running: false,
                    stop_requested: false,
                    dropped_count: 0,
                    idle_applied: false,
                }),
                idle_tx,
            }),
        }
    }

    /// Register a telemetry observer.
    pub fn register_telemetry(&self, sink: Arc<dyn TelemetrySink>) {
        self.shared
            .sinks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(sink);
    }

    /// Register a post-idle hook.
    pub fn register_idle_hook(&self, hook: Arc<dyn IdleHook>) {
        self.shared
            .idle_hooks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(hook);
    }

    /// Apply the queue/overflow policy pipeline and append the message.
    ///
    /// Returns synchronously: acceptance, a drop result, or an overflow
    /// error. Starts the run loop when the player is idle.
    pub fn enqueue(&self, message: ActionMessage) -> Result<EnqueueOutcome, EnqueueError> {
        let shared = &self.shared;
        let mut queue = shared.queue.lock().unwrap_or_else(|e| e.into_inner());

        // 1/2. Queue policy, before the new message is pushed.
        match message.queue_policy {
            QueuePolicy::Append => {}
            QueuePolicy::Replace => {
                queue.backlog.clear();
            }
            QueuePolicy::Interrupt => {
                queue.backlog.clear();
                if let Some(active) = &queue.active {
                    active.cancel.cancel();
                }
            }
        }

        // 3. Overflow check.
        if queue.backlog.len() >= shared.config.max_queue_size {
            match shared.config.overflow {
                OverflowPolicy::Reject => {
                    shared.emit(&TelemetryEvent::Drop {
                        reason: REASON_REJECT.to_string(),
                        dropped: 1,
                        queue_size: queue.backlog.len(),
                    });
                    return Err(EnqueueError::Overflow {
                        capacity: shared.config.max_queue_size,
                    });
                }
                OverflowPolicy::DropNewest => {
                    shared.emit(&TelemetryEvent::Drop {
                        reason: REASON_DROP_NEWEST.to_string(),
                        dropped: 1,
                        queue_size: queue.backlog.len(),
                    });
                    return Ok(EnqueueOutcome::Dropped {
                        reason: REASON_DROP_NEWEST.to_string(),
                    });
                }
                OverflowPolicy::DropOldest => {
                    let evict = queue.backlog.len() - shared.config.max_queue_size + 1;
                    for _ in 0..evict {
                        queue.backlog.pop_front();
                    }
                    queue.dropped_count += evict as u64;
                    shared.emit(&TelemetryEvent::Drop {
                        reason: REASON_DROP_OLDEST.to_string(),
                        dropped: evict,
                        queue_size: queue.backlog.len(),
                    });
                }
            }
        }

        // 4/5. Assign an ID if absent, push, reset the idle memo.
        let mut message = message;
        if message.action_id.is_empty() {
            message.action_id = ActionId::new(uuid::Uuid::new_v4().to_string());
        }
        let action_id = message.action_id.clone();
        queue.backlog.push_back(message);
        queue.idle_applied = false;
        let queue_size = queue.backlog.len();

        shared.emit(&TelemetryEvent::Enqueue {
            action_id: action_id.clone(),
            queue_size,
        });

        if !queue.loop_running {
            queue.loop_running = true;
            // A stop issued while idle must not kill the fresh loop.
            queue.stop_requested = false;
            tokio::spawn(run_loop(shared.clone()));
        }
        shared.publish_idle(&queue);

        Ok(EnqueueOutcome::Accepted {
            action_id,
            queue_size,
        })
    }

    /// Signal the loop to exit after the current action. The active
    /// step's remaining wait is abandoned at the next tick; the backlog
    /// is left intact.
    pub fn stop(&self) {
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.stop_requested = true;
        if let Some(active) = &queue.active {
            active.cancel.cancel();
        }
    }

    /// Empty the backlog. The active step is untouched. When the loop is
    /// already stopped this can make the player idle, so waiters are
    /// notified.
    pub fn clear(&self) {
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.backlog.clear();
        self.shared.publish_idle(&queue);
    }

    /// Resolve once the loop is stopped, the backlog is empty, and no
    /// step is active. Multiple concurrent waiters all resolve together.
    pub async fn wait_for_idle(&self, timeout: Duration) -> Result<(), WaitForIdleError> {
        let mut rx = self.shared.idle_tx.subscribe();
        // The Ok value holds a watch Ref borrowing rx; keep it in a
        // local that drops before rx does.
        let result = tokio::time::timeout(timeout, rx.wait_for(|idle| *idle)).await;
        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(WaitForIdleError::Closed),
            Err(_) => Err(WaitForIdleError::Timeout(timeout)),
        }
    }

    /// Point-in-time scheduler state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        let queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        PlayerSnapshot {
            queue_size: queue.backlog.len(),
            loop_running: queue.loop_running,
            active_action_id: queue.active.as_ref().map(|a| a.action_id.clone()),
            dropped_count: queue.dropped_count,
            idle_action_applied: queue.idle_applied,
        }
    }
}

async fn run_loop(shared: Arc<PlayerShared>) {
    loop {
        let next = pick_next(&shared);
        match next {
            Next::Exit => return,
            Next::Run {
                message,
                cancel,
                queue_size,
            } => {
                run_one(&shared, &message, queue_size).await;
                settle_wait(&shared, message.duration, &cancel).await;

                let mut queue = shared.queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.active = None;
                shared.publish_idle(&queue);
            }
            Next::IdleFallback(idle_action) => {
                run_idle(&shared, idle_action).await;
            }
        }
    }
}

/// Decide the loop's next move under the queue lock.
fn pick_next(shared: &Arc<PlayerShared>) -> Next {
    let mut queue = shared.queue.lock().unwrap_or_else(|e| e.into_inner());

    if queue.stop_requested {
        queue.stop_requested = false;
        queue.loop_running = false;
        shared.publish_idle(&queue);
        return Next::Exit;
    }

    match queue.backlog.pop_front() {
        Some(message) => {
            let cancel = CancellationToken::new();
            queue.active = Some(ActiveStep {
                action_id: message.action_id.clone(),
                cancel: cancel.clone(),
            });
            let queue_size = queue.backlog.len();
            Next::Run {
                message,
                cancel,
                queue_size,
            }
        }
        None => {
            if !queue.idle_applied {
                if let Some(idle_action) = shared.config.idle_action.clone() {
                    queue.idle_applied = true;
                    return Next::IdleFallback(idle_action);
                }
            }
            queue.loop_running = false;
            shared.publish_idle(&queue);
            Next::Exit
        }
    }
}

/// Execute one message through the mutex. Failures are logged and
/// reported, never propagated: the loop always advances.
async fn run_one(shared: &Arc<PlayerShared>, message: &ActionMessage, queue_size: usize) {
    let action_id = message.action_id.clone();
    shared.emit(&TelemetryEvent::Start {
        action_id: action_id.clone(),
        queue_size,
    });

    let result = execute_via_mutex(shared, message.action.clone()).await;
    let queue_size = shared.queue_size();
    match result {
        Ok(()) => {
            shared.emit(&TelemetryEvent::Done {
                action_id,
                queue_size,
            });
        }
        Err(error) => {
            tracing::warn!(action_id = %action_id, error = %error, "action execution failed");
            shared.emit(&TelemetryEvent::Fail {
                action_id,
                error,
                queue_size,
            });
        }
    }
}

async fn execute_via_mutex(shared: &Arc<PlayerShared>, action: Action) -> Result<(), String> {
    let executor = shared.executor.clone();
    match shared
        .mutex
        .run_exclusive(move || async move { executor.execute(&action).await })
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(exec_err)) => Err(exec_err.to_string()),
        Err(mutex_err) => Err(mutex_err.to_string()),
    }
}

/// Post-execution settle wait, chunked into ticks so a cancellation is
/// observed within one tick rather than the full duration.
async fn settle_wait(shared: &Arc<PlayerShared>, duration: Duration, cancel: &CancellationToken) {
    let tick = shared.config.tick.max(Duration::from_millis(1));
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            tracing::debug!("settle wait abandoned by interrupt");
            return;
        }
        let chunk = remaining.min(tick);
        shared.clock.sleep(chunk).await;
        remaining = remaining.saturating_sub(chunk);
    }
}

/// Run the configured idle action once. Idle and hook errors are logged,
/// never thrown.
async fn run_idle(shared: &Arc<PlayerShared>, idle_action: ActionMessage) {
    let result = execute_via_mutex(shared, idle_action.action.clone()).await;
    if let Err(error) = &result {
        tracing::warn!(error = %error, "idle fallback failed");
    }

    let outcome = IdleOutcome {
        idle_action,
        idle_error: result.err(),
    };
    let hooks = shared
        .idle_hooks
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    for hook in hooks {
        if let Err(err) = hook.on_idle_applied(&outcome).await {
            tracing::warn!(error = %err, "idle hook failed");
        }
    }
}
