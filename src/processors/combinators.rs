//! Topology combinators: one producer to many consumers and back.
//!
//! ```text
//!                ┌─► branch 0 ─┐
//! upstream ──────┼─► branch 1 ─┼──► merged
//!    fan_out     └─► branch N ─┘   merge
//! ```

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::core::{Error, Feed, Inlet, Outlet, Result};
use crate::processors::PassThrough;
use crate::util::{recv_or_die, send_or_die, transmit};

/// Replicate `upstream` into `branches` independent pass-through stages.
///
/// Every element is cloned into each branch. A branch whose consumer has gone
/// away is skipped; a send that loses the race to the dying signal is skipped
/// for that branch. All branch inputs close once `upstream` is exhausted or
/// the topology starts dying.
pub fn fan_out<O>(upstream: O, branches: usize) -> Vec<PassThrough<O::Out>>
where
    O: Outlet,
    O::Out: Clone,
{
    let supervisor = upstream.supervisor().clone();
    let mut outlets: Vec<PassThrough<O::Out>> = (0..branches)
        .map(|branch| PassThrough::named(&supervisor, format!("fan_out[{branch}]")))
        .collect();
    let inlets: Vec<mpsc::Sender<O::Out>> =
        outlets.iter_mut().filter_map(Inlet::take_inlet).collect();

    let source = upstream.into_feed().into_receiver();
    let dying = supervisor.dying_token().clone();
    supervisor.attach(async move {
        broadcast(source, inlets, dying).await;
        Ok(())
    });
    outlets
}

async fn broadcast<T: Clone>(
    mut source: mpsc::Receiver<T>,
    inlets: Vec<mpsc::Sender<T>>,
    dying: CancellationToken,
) {
    while let Some(item) = recv_or_die(&mut source, &dying).await {
        for (branch, inlet) in inlets.iter().enumerate() {
            if !send_or_die(inlet, item.clone(), &dying).await {
                trace!(branch, "branch gone or dying, element skipped");
            }
        }
    }
    debug!(branches = inlets.len(), "fan-out finished, closing branches");
}

/// Combine several feeds into one pass-through stage.
///
/// Each feed gets its own forwarding worker; the merged input closes once all
/// of them have returned. Elements from different feeds interleave in no
/// particular order.
///
/// Fails with [`Error::EmptyMerge`] when `feeds` is empty and with
/// [`Error::ForeignSupervisor`] when the feeds are not all attached to the
/// same supervisor.
pub fn merge<T, I>(feeds: I) -> Result<PassThrough<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Feed<T>>,
{
    let feeds: Vec<Feed<T>> = feeds.into_iter().collect();
    let supervisor = feeds.first().ok_or(Error::EmptyMerge)?.supervisor().clone();
    if feeds.iter().any(|feed| !feed.supervisor().same_as(&supervisor)) {
        return Err(Error::ForeignSupervisor);
    }

    let mut merged = PassThrough::named(&supervisor, "merge");
    let inlet = merged.take_inlet().ok_or(Error::AlreadyConnected)?;
    let dying = supervisor.dying_token().clone();
    let forwarders = TaskTracker::new();

    for feed in feeds {
        let forward = transmit(feed.into_receiver(), inlet.clone(), dying.clone());
        supervisor.attach(forwarders.track_future(async move {
            forward.await;
            Ok(())
        }));
    }
    forwarders.close();

    supervisor.attach(async move {
        forwarders.wait().await;
        debug!("merged inputs exhausted, closing merged input");
        drop(inlet);
        Ok(())
    });
    Ok(merged)
}
