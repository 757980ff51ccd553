//! Producers at the boundary of a topology.
//!
//! Sources turn something outside the topology into an output feed: an
//! external channel, an iterator, or a list of identifiers.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

use crate::core::{Feed, Outlet, Source, Supervisor};
use crate::util::send_or_die;

/// A source whose elements come from an external channel.
///
/// The source spawns nothing; whoever holds the sending half decides when the
/// feed closes.
pub struct ChanSource<T> {
    supervisor: Supervisor,
    receiver: mpsc::Receiver<T>,
}

impl<T> ChanSource<T> {
    /// Bridge `receiver` into a topology supervised by `supervisor`.
    pub fn new(supervisor: &Supervisor, receiver: mpsc::Receiver<T>) -> Self {
        Self {
            supervisor: supervisor.clone(),
            receiver,
        }
    }
}

impl<T: Send + 'static> Outlet for ChanSource<T> {
    type Out = T;

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn into_feed(self) -> Feed<T> {
        Feed::new(&self.supervisor, self.receiver)
    }
}

impl<T: Send + 'static> Source for ChanSource<T> {}

impl<T> std::fmt::Debug for ChanSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChanSource")
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

/// A source that yields the items of an iterator.
///
/// The iterator is drained by a worker attached to the supervisor, so the
/// topology stays alive until every item has been handed downstream or the
/// topology starts dying.
pub struct IterSource<T> {
    supervisor: Supervisor,
    receiver: mpsc::Receiver<T>,
}

impl<T: Send + 'static> IterSource<T> {
    /// Start producing the items of `items`.
    ///
    /// On a supervisor that is already dying the feed starts out closed.
    pub fn new<I>(supervisor: &Supervisor, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(1);
        let dying = supervisor.dying_token().clone();
        let items = items.into_iter();

        let producer = async move {
            let mut produced = 0usize;
            for item in items {
                if !send_or_die(&sender, item, &dying).await {
                    debug!(produced, "producer stopped early");
                    return Ok(());
                }
                produced += 1;
            }
            debug!(produced, "producer exhausted");
            Ok(())
        };
        supervisor.attach(producer.instrument(debug_span!("iter_source")));

        Self {
            supervisor: supervisor.clone(),
            receiver,
        }
    }
}

impl<T: Send + 'static> Outlet for IterSource<T> {
    type Out = T;

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn into_feed(self) -> Feed<T> {
        Feed::new(&self.supervisor, self.receiver)
    }
}

impl<T: Send + 'static> Source for IterSource<T> {}

impl<T> std::fmt::Debug for IterSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterSource")
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

/// Feed `ids` one at a time into the returned receiver.
///
/// The producer runs outside any supervisor and stops as soon as `token` is
/// cancelled or the receiver is dropped. Combine with
/// [`Supervisor::token`] and [`ChanSource`] to stop producing when a topology
/// dies.
///
/// Must be called inside a tokio runtime.
pub fn generate_ids(token: CancellationToken, ids: Vec<String>) -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel(1);
    tokio::spawn(async move {
        for id in ids {
            if !send_or_die(&sender, id, &token).await {
                debug!("id generation cancelled");
                return;
            }
        }
    });
    receiver
}
