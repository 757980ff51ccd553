//! A detached output feed.

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::supervisor::Supervisor;
use crate::core::traits::{Outlet, Source};

/// The output feed of a stage, detached from the stage itself.
///
/// A feed erases the concrete stage type, which is what lets stages of
/// different kinds be merged, and gives direct access to the elements when
/// no sink is wanted.
pub struct Feed<T> {
    supervisor: Supervisor,
    receiver: mpsc::Receiver<T>,
}

impl<T> Feed<T> {
    /// Wrap `receiver` as the output of a stage attached to `supervisor`.
    pub fn new(supervisor: &Supervisor, receiver: mpsc::Receiver<T>) -> Self {
        Self {
            supervisor: supervisor.clone(),
            receiver,
        }
    }

    /// The supervisor the producing stage is attached to.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Take the receiving half of the feed.
    pub fn into_receiver(self) -> mpsc::Receiver<T> {
        self.receiver
    }

    /// Consume the feed as a [`Stream`] that ends when the feed closes.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        ReceiverStream::new(self.receiver)
    }
}

impl<T: Send + 'static> Outlet for Feed<T> {
    type Out = T;

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn into_feed(self) -> Feed<T> {
        self
    }
}

impl<T: Send + 'static> Source for Feed<T> {}

impl<T> std::fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}
