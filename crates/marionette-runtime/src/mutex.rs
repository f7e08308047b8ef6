//! Action Mutex
//!
//! A FIFO execution lock: submitted tasks run strictly in submission
//! order, never concurrently, and a task starts only after the previous
//! one has settled. A failing task's error is visible only to its own
//! caller and never poisons the chain.
//!
//! Implemented as a bounded single-worker task channel: one consumer
//! task drains a queue of pending closures; each closure resolves its
//! caller's oneshot with the task output.
//!
//! Not reentrant: acquiring the mutex from inside a running task
//! deadlocks. This is a usage constraint, not runtime-guarded.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

const DEFAULT_CAPACITY: usize = 64;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Mutex errors
#[derive(Debug, Error)]
pub enum MutexError {
    /// The worker task is gone; only happens when the owning runtime
    /// shut down underneath the mutex.
    #[error("action mutex worker is gone")]
    WorkerGone,
}

/// Point-in-time mutex state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexSnapshot {
    /// 0 when no task is running, 1 while one is.
    pub active: usize,
}

/// FIFO execution lock with failure isolation between tasks.
pub struct ActionMutex {
    tx: mpsc::Sender<Job>,
    active: Arc<AtomicUsize>,
}

impl ActionMutex {
    /// Create a mutex with the default pending-task capacity.
    ///
    /// Must be called from within a tokio runtime; the worker task is
    /// spawned here.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a mutex with a custom pending-task capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let active = Arc::new(AtomicUsize::new(0));
        let worker_active = active.clone();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                worker_active.store(1, Ordering::SeqCst);
                job().await;
                worker_active.store(0, Ordering::SeqCst);
            }
        });

        Self { tx, active }
    }

    /// Run a task exclusively, after every previously submitted task has
    /// settled. The task's own output (including its error) is returned
    /// to this caller only.
    pub async fn run_exclusive<F, Fut, T>(&self, task: F) -> Result<T, MutexError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let output = task().await;
                // Caller may have given up waiting; the task still ran.
                let _ = done_tx.send(output);
            })
        });

        self.tx.send(job).await.map_err(|_| MutexError::WorkerGone)?;
        done_rx.await.map_err(|_| MutexError::WorkerGone)
    }

    /// Expose whether a task is currently running.
    pub fn snapshot(&self) -> MutexSnapshot {
        MutexSnapshot {
            active: self.active.load(Ordering::SeqCst),
        }
    }
}

impl Default for ActionMutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    #[test]
    fn test_tasks_run_in_submission_order_without_overlap() {
        tokio_test::block_on(async {
            let mutex = ActionMutex::new();
            let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
            let running = Arc::new(AtomicBool::new(false));

            let mut waiters = Vec::new();
            for i in 0..3 {
                let log = log.clone();
                let running = running.clone();
                waiters.push(mutex.run_exclusive(move || async move {
                    assert!(!running.swap(true, Ordering::SeqCst), "tasks overlapped");
                    log.lock().unwrap().push(format!("start-{i}"));
                    sleep(Duration::from_millis(10)).await;
                    log.lock().unwrap().push(format!("end-{i}"));
                    running.store(false, Ordering::SeqCst);
                }));
            }
            // join_all polls the waiters in order, so all three submit
            // before the first one completes.
            for result in futures_util::future::join_all(waiters).await {
                result.unwrap();
            }

            assert_eq!(
                log.lock().unwrap().clone(),
                vec!["start-0", "end-0", "start-1", "end-1", "start-2", "end-2"]
            );
        });
    }

    #[test]
    fn test_failing_task_does_not_poison_the_chain() {
        tokio_test::block_on(async {
            let mutex = ActionMutex::new();

            let first: Result<Result<(), String>, MutexError> = mutex
                .run_exclusive(|| async { Err("first task failed".to_string()) })
                .await;
            assert_eq!(first.unwrap(), Err("first task failed".to_string()));

            let second = mutex.run_exclusive(|| async { Ok::<_, String>(42) }).await;
            assert_eq!(second.unwrap(), Ok(42));
        });
    }

    #[test]
    fn test_snapshot_reflects_active_task() {
        tokio_test::block_on(async {
            let mutex = Arc::new(ActionMutex::new());
            assert_eq!(mutex.snapshot().active, 0);

            let (release_tx, release_rx) = oneshot::channel::<()>();
            let mutex_clone = mutex.clone();
            let handle = tokio::spawn(async move {
                mutex_clone
                    .run_exclusive(move || async move {
                        let _ = release_rx.await;
                    })
                    .await
                    .unwrap();
            });

            // Wait for the worker to pick the task up.
            let mut active = 0;
            for _ in 0..100 {
                active = mutex.snapshot().active;
                if active == 1 {
                    break;
                }
                sleep(Duration::from_millis(5)).await;
            }
            assert_eq!(active, 1);

            release_tx.send(()).unwrap();
            handle.await.unwrap();
            assert_eq!(mutex.snapshot().active, 0);
        });
    }
}
