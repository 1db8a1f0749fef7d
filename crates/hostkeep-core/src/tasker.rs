//! Single-worker task queue
//!
//! Tasks are handed to one lazily started worker through a synchronous
//! handoff: `enqueue` returns once the worker has taken the task, so a busy
//! worker throttles producers. Tasks run one at a time in submission order.
//!
//! `enqueue` and `close` serialize on one async mutex that owns the queue
//! state, so a task can never be sent after the queue has been closed.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::error::QueueError;
use crate::state::QueueState;

/// Callback run by the worker after every task
///
/// Stands in for a memory-reclamation hint; it must not block for long.
pub type AfterTaskHook = Arc<dyn Fn() + Send + Sync>;

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Task {
    name: String,
    run: TaskFuture,
}

/// A task plus the channel the worker uses to confirm it took the task
struct Handoff {
    task: Task,
    accepted: oneshot::Sender<()>,
}

enum Inner {
    Created,
    Running {
        tx: mpsc::Sender<Handoff>,
        worker: JoinHandle<()>,
    },
    Closed,
}

impl Inner {
    fn state(&self) -> QueueState {
        match self {
            Inner::Created => QueueState::Created,
            Inner::Running { .. } => QueueState::Running,
            Inner::Closed => QueueState::Closed,
        }
    }
}

/// FIFO queue drained by exactly one worker
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct TaskQueue {
    inner: Mutex<Inner>,
    after_task: Option<AfterTaskHook>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.try_lock().map(|inner| inner.state()).ok();
        f.debug_struct("TaskQueue")
            .field("state", &state)
            .field("after_task", &self.after_task.is_some())
            .finish()
    }
}

impl TaskQueue {
    /// Create a queue; the worker starts on the first enqueue
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::Created),
            after_task: None,
        }
    }

    /// Run `hook` on the worker after each task
    #[must_use]
    pub fn with_after_task(mut self, hook: AfterTaskHook) -> Self {
        self.after_task = Some(hook);
        self
    }

    /// Current lifecycle state
    pub async fn state(&self) -> QueueState {
        self.inner.lock().await.state()
    }

    /// Whether `close` has been called
    pub async fn is_closed(&self) -> bool {
        self.state().await == QueueState::Closed
    }

    /// Hand a task to the worker
    ///
    /// Waits until the worker is free to accept the task, not until the task
    /// has finished.
    ///
    /// # Errors
    /// Returns `QueueError::Closed` after `close`, and
    /// `QueueError::WorkerStopped` if the worker died. The task is dropped
    /// without running in both cases.
    pub async fn enqueue<F>(&self, name: impl Into<String>, task: F) -> Result<(), QueueError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let mut inner = self.inner.lock().await;

        if matches!(*inner, Inner::Created) {
            *inner = self.start_worker();
        }

        let Inner::Running { tx, .. } = &*inner else {
            warn!(task = %name, "enqueue on closed task queue");
            return Err(QueueError::Closed { task: name });
        };

        let (accepted, confirmation) = oneshot::channel();
        let handoff = Handoff {
            task: Task {
                name: name.clone(),
                run: Box::pin(task),
            },
            accepted,
        };

        if tx.send(handoff).await.is_err() {
            error!(task = %name, "task queue worker is gone");
            return Err(QueueError::WorkerStopped { task: name });
        }

        // The lock stays held until the worker takes the task, which keeps the
        // channel buffer empty between handoffs.
        confirmation
            .await
            .map_err(|_| QueueError::WorkerStopped { task: name })
    }

    /// Stop accepting tasks and wait for the worker to finish
    ///
    /// A task that is running or being handed off completes first. Calling
    /// `close` again returns immediately.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;

        match std::mem::replace(&mut *inner, Inner::Closed) {
            Inner::Running { tx, worker } => {
                drop(tx);
                debug!("waiting for task queue worker to drain");
                if let Err(e) = worker.await {
                    error!(error = %e, "task queue worker did not exit cleanly");
                }
            }
            Inner::Created => debug!("closing task queue that never started"),
            Inner::Closed => debug!("task queue already closed"),
        }
    }

    fn start_worker(&self) -> Inner {
        let (tx, rx) = mpsc::channel(1);
        let worker = tokio::spawn(run_worker(rx, self.after_task.clone()));
        debug!("started task queue worker");
        Inner::Running { tx, worker }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(mut rx: mpsc::Receiver<Handoff>, after_task: Option<AfterTaskHook>) {
    while let Some(Handoff { task, accepted }) = rx.recv().await {
        // The producer may have stopped waiting; the task still runs.
        let _ = accepted.send(());

        debug!(task = %task.name, "tasker running task");
        task.run.await;
        debug!(task = %task.name, "finished task");

        if let Some(hook) = &after_task {
            hook();
        }
        debug!("waiting for tasks to run");
    }
    debug!("task queue worker exiting");
}
