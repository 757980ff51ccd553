//! The supervision unit shared by every stage of a topology.
//!
//! A [`Supervisor`] tracks the workers attached to it, keeps the first error
//! any of them returns and broadcasts a cooperative "dying" signal. Once every
//! attached worker has returned it becomes dead.
//!
//! ```text
//! attach ──► active += 1 ──► worker ──► active -= 1
//!                               │             │
//!                             Err(e)      active == 0
//!                               ▼             ▼
//!                     error slot (first)   dying ──► dead
//!                           dying
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::core::error::{Error, Result};

struct Inner {
    /// Fires once, never resets.
    dying: CancellationToken,
    /// Closed when `active` reaches zero; `wait()` is the dead signal.
    workers: TaskTracker,
    active: Mutex<usize>,
    error: OnceLock<Error>,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, usize> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared cancellation and error root for a topology.
///
/// Cloning is cheap; every clone refers to the same unit.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// Create a new, alive supervisor with no workers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                dying: CancellationToken::new(),
                workers: TaskTracker::new(),
                active: Mutex::new(0),
                error: OnceLock::new(),
            }),
        }
    }

    /// Create a supervisor that is killed with [`Error::Cancelled`] when
    /// `parent` is cancelled.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_parent(parent: CancellationToken) -> Self {
        let supervisor = Self::new();
        supervisor.watch(async move {
            parent.cancelled().await;
            Error::Cancelled
        });
        supervisor
    }

    /// Create a supervisor that is killed with [`Error::Timeout`] once
    /// `duration` has elapsed.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_timeout(duration: Duration) -> Self {
        let supervisor = Self::new();
        supervisor.watch(async move {
            tokio::time::sleep(duration).await;
            Error::timeout(duration)
        });
        supervisor
    }

    /// Kill the supervisor with whatever `trigger` resolves to, unless it
    /// starts dying first. The watcher is not a tracked worker.
    fn watch<F>(&self, trigger: F)
    where
        F: Future<Output = Error> + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = this.inner.dying.cancelled() => {}
                reason = trigger => this.kill(reason),
            }
        });
    }

    /// Spawn `worker` as a tracked worker of this supervisor.
    ///
    /// Returns `false` without spawning when the supervisor is already dying.
    /// If the worker returns an error it becomes the terminal error, unless one
    /// was recorded before, and the supervisor starts dying.
    pub fn attach<F>(&self, worker: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        {
            let mut active = self.inner.active();
            if self.inner.dying.is_cancelled() {
                debug!("supervisor is dying, worker not attached");
                return false;
            }
            *active += 1;
        }

        let this = self.clone();
        self.inner.workers.spawn(async move {
            let outcome = AssertUnwindSafe(worker)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::custom("worker panicked")));
            this.release(outcome);
        });
        true
    }

    fn release(&self, outcome: Result<()>) {
        let failed = match outcome {
            Ok(()) => false,
            Err(err) => {
                self.record(err);
                true
            }
        };

        let mut active = self.inner.active();
        *active -= 1;
        if failed || *active == 0 {
            self.inner.dying.cancel();
        }
        if *active == 0 {
            self.inner.workers.close();
            debug!(error = ?self.inner.error.get(), "all workers returned, supervisor is dead");
        }
    }

    fn record(&self, reason: Error) {
        match self.inner.error.set(reason) {
            Ok(()) => {
                if let Some(reason) = self.inner.error.get() {
                    warn!(%reason, "supervisor recorded terminal error");
                }
            }
            Err(discarded) => debug!(%discarded, "terminal error already recorded, discarding"),
        }
    }

    /// Kill the supervisor with `reason`.
    ///
    /// Only the first error ever recorded is kept. A supervisor with no
    /// running workers becomes dead right away.
    pub fn kill(&self, reason: Error) {
        self.record(reason);

        let active = self.inner.active();
        self.inner.dying.cancel();
        if *active == 0 {
            self.inner.workers.close();
        }
    }

    /// Kill the supervisor with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.kill(Error::Cancelled);
    }

    /// True until the supervisor starts dying.
    pub fn is_alive(&self) -> bool {
        !self.is_dying()
    }

    /// True once a worker failed, the supervisor was killed, or every worker
    /// returned.
    pub fn is_dying(&self) -> bool {
        self.inner.dying.is_cancelled()
    }

    /// Wait until the supervisor starts dying.
    pub async fn dying(&self) {
        self.inner.dying.cancelled().await;
    }

    /// True once every attached worker has returned and no more can attach.
    pub fn is_dead(&self) -> bool {
        self.inner.workers.is_closed() && self.inner.workers.is_empty()
    }

    /// Wait until the supervisor is dead.
    pub async fn dead(&self) {
        self.inner.workers.wait().await;
    }

    /// The terminal error, if one was recorded.
    pub fn err(&self) -> Option<Error> {
        self.inner.error.get().cloned()
    }

    /// Wait until dead and return the terminal error, if any.
    pub async fn wait(&self) -> Result<()> {
        self.dead().await;
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// A token that is cancelled as soon as the supervisor starts dying.
    ///
    /// Hand this to producers living outside the topology. Cancelling the
    /// returned token does not affect the supervisor.
    pub fn token(&self) -> CancellationToken {
        self.inner.dying.child_token()
    }

    /// Number of attached workers that have not returned yet.
    pub fn active_workers(&self) -> usize {
        *self.inner.active()
    }

    /// True if both handles refer to the same supervisor.
    pub fn same_as(&self, other: &Supervisor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn dying_token(&self) -> &CancellationToken {
        &self.inner.dying
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("active_workers", &self.active_workers())
            .field("dying", &self.is_dying())
            .field("dead", &self.is_dead())
            .field("error", &self.inner.error.get())
            .finish()
    }
}
