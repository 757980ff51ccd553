//! Two-phase select helpers shared by every stage.
//!
//! Every blocking point in a topology races the channel operation against the
//! supervisor's dying token. The race is biased toward the token so a dying
//! topology never picks up another element once the signal is visible.
//!
//! Feeds are single-slot channels used as rendezvous points: a send only
//! completes once the consumer has taken the element out of the slot, so a
//! producer stays alive for as long as its last element is undelivered.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// An input feed shared by the workers of one stage.
pub(crate) type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Receive the next element, or `None` if the feed is closed or the
/// topology is dying.
pub(crate) async fn recv_or_die<T>(
    receiver: &mut mpsc::Receiver<T>,
    dying: &CancellationToken,
) -> Option<T> {
    tokio::select! {
        biased;
        () = dying.cancelled() => None,
        item = receiver.recv() => item,
    }
}

/// Like [`recv_or_die`], for a feed shared between several workers.
pub(crate) async fn recv_shared_or_die<T>(
    receiver: &SharedReceiver<T>,
    dying: &CancellationToken,
) -> Option<T> {
    tokio::select! {
        biased;
        () = dying.cancelled() => None,
        item = async { receiver.lock().await.recv().await } => item,
    }
}

/// Hand `item` to the consumer and wait until it has been taken. Returns
/// `false` if the topology is dying or the consumer has gone away, in which
/// case the item is dropped.
pub(crate) async fn send_or_die<T>(
    sender: &mpsc::Sender<T>,
    item: T,
    dying: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        () = dying.cancelled() => false,
        handed = hand_off(sender, item) => handed,
    }
}

async fn hand_off<T>(sender: &mpsc::Sender<T>, item: T) -> bool {
    if sender.send(item).await.is_err() {
        return false;
    }
    // A free permit means the slot was emptied by the consumer.
    sender.reserve().await.is_ok()
}

/// Forward every element of `from` into `to` until `from` closes or the
/// topology starts dying. Returning drops `to`.
pub(crate) async fn transmit<T>(
    mut from: mpsc::Receiver<T>,
    to: mpsc::Sender<T>,
    dying: CancellationToken,
) {
    while let Some(item) = recv_or_die(&mut from, &dying).await {
        if !send_or_die(&to, item, &dying).await {
            break;
        }
        trace!("element forwarded");
    }
}
