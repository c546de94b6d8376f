//! Transition queue
//!
//! Serializes transition execution: strict FIFO, at most one animated
//! transition at a time no matter how many navigations fire concurrently.
//! Each enqueued context gets its own completion handle.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::TransitionError;

use super::context::TransitionContext;
use super::executor::TransitionExecutor;

/// Resolves with one specific transition's outcome
#[derive(Debug)]
pub struct TransitionHandle {
    rx: oneshot::Receiver<Result<(), TransitionError>>,
}

impl TransitionHandle {
    /// Wait for the transition to settle. A handle whose queue entry was
    /// dropped (destroyed runtime) resolves as `Cancelled` rather than
    /// pending forever.
    pub async fn wait(self) -> Result<(), TransitionError> {
        self.rx.await.unwrap_or(Err(TransitionError::Cancelled))
    }
}

/// One deferred transition
struct QueueEntry {
    ctx: TransitionContext,
    done: oneshot::Sender<Result<(), TransitionError>>,
}

struct QueueState {
    pending: VecDeque<QueueEntry>,
    running: bool,
}

/// FIFO queue draining through a single executor
pub struct TransitionQueue {
    state: Arc<Mutex<QueueState>>,
    executor: Arc<TransitionExecutor>,
}

impl TransitionQueue {
    /// Create a queue over an executor
    pub fn new(executor: Arc<TransitionExecutor>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: VecDeque::new(),
                running: false,
            })),
            executor,
        }
    }

    /// Append a transition and return its completion handle. Never blocks
    /// beyond returning the handle; the drain task executes entries in
    /// submission order.
    pub fn enqueue(&self, ctx: TransitionContext) -> TransitionHandle {
        let (done, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            state.pending.push_back(QueueEntry { ctx, done });
            debug!("Transition enqueued ({} pending)", state.pending.len());
        }
        self.kick();
        TransitionHandle { rx }
    }

    /// Number of entries waiting to execute
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether a transition is executing right now
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Reject every pending entry with `Cancelled` and cancel the
    /// currently-playing animation. The interrupted transition resolves as a
    /// non-error completion; the drain task keeps advancing.
    pub fn cancel_all(&self) {
        let drained: Vec<QueueEntry> = {
            let mut state = self.state.lock();
            state.pending.drain(..).collect()
        };
        if !drained.is_empty() {
            debug!("Cancelled {} pending transition(s)", drained.len());
        }
        for entry in drained {
            let _ = entry.done.send(Err(TransitionError::Cancelled));
        }
        self.executor.cancel_current();
    }

    /// Start the drain task unless one is already running
    fn kick(&self) {
        {
            let mut state = self.state.lock();
            if state.running || state.pending.is_empty() {
                return;
            }
            state.running = true;
        }
        let state = self.state.clone();
        let executor = self.executor.clone();
        tokio::spawn(drain(state, executor));
    }
}

/// Pop and execute head entries until the queue empties
async fn drain(state: Arc<Mutex<QueueState>>, executor: Arc<TransitionExecutor>) {
    loop {
        let entry = {
            let mut state = state.lock();
            match state.pending.pop_front() {
                Some(entry) => entry,
                None => {
                    state.running = false;
                    return;
                }
            }
        };

        let result = executor.execute(entry.ctx).await;
        if let Err(error) = &result {
            warn!("Transition failed: {}", error);
        }
        let _ = entry.done.send(result);

        // give interleaved work a chance between drains
        tokio::task::yield_now().await;
    }
}
