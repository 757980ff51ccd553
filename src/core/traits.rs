//! Stage capabilities.
//!
//! Every stage is built from three capabilities:
//!
//! - [`Outlet`]: produces elements on an output feed, attached to a [`Supervisor`]
//! - [`Inlet`]: consumes elements from an input feed
//! - [`Flow`]: both, and can be chained to the next consumer
//!
//! A [`Source`] only produces, a [`Sink`] only consumes.
//!
//! ```text
//! source ──via──► flow ──via──► flow ──to──► sink
//! ```

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::core::error::{Error, Result};
use crate::core::feed::Feed;
use crate::core::supervisor::Supervisor;
use crate::util::transmit;

/// A stage that exposes one open output.
pub trait Outlet: Send + Sized {
    /// The type of elements this stage emits
    type Out: Send + 'static;

    /// The supervisor this stage's workers are attached to.
    fn supervisor(&self) -> &Supervisor;

    /// Detach the output feed from the stage.
    fn into_feed(self) -> Feed<Self::Out>;
}

/// A stage that exposes one open input.
pub trait Inlet: Send {
    /// The type of elements this stage accepts
    type In: Send + 'static;

    /// Hand out the sending half of the input feed.
    ///
    /// The sender is handed out at most once; later calls return `None`.
    /// Dropping the returned sender closes the input.
    fn take_inlet(&mut self) -> Option<mpsc::Sender<Self::In>>;
}

/// A set of processing steps with one open output.
pub trait Source: Outlet {
    /// Stream this stage's output through `flow` and return `flow` for
    /// further chaining.
    ///
    /// The forwarding worker is attached to this stage's supervisor and
    /// closes `flow`'s input when this output is exhausted or the topology
    /// starts dying.
    fn via<F>(self, mut flow: F) -> Result<F>
    where
        F: Flow<In = Self::Out>,
    {
        connect(self, &mut flow)?;
        Ok(flow)
    }
}

/// A set of processing steps with one open input and one open output.
#[async_trait]
pub trait Flow: Source + Inlet {
    /// Stream this stage's output into `sink`, returning once the output is
    /// exhausted or the topology starts dying.
    ///
    /// The forwarding worker is attached to the supervisor like the one
    /// started by [`Source::via`]; this call waits for it. Wrap the call in
    /// [`Supervisor::attach`] to run it in the background.
    async fn to<S>(self, mut sink: S) -> Result<()>
    where
        S: Sink<In = Self::Out>,
    {
        let forwarded = connect(self, &mut sink)?;
        // Err only means the forwarder never ran or was torn down.
        let _ = forwarded.await;
        Ok(())
    }
}

/// A set of processing steps with one open input.
pub trait Sink: Inlet {}

/// Start a worker forwarding `upstream`'s output into `downstream`'s input.
///
/// The returned receiver resolves once the forwarder has returned.
pub(crate) fn connect<O, I>(upstream: O, downstream: &mut I) -> Result<oneshot::Receiver<()>>
where
    O: Outlet,
    I: Inlet<In = O::Out> + ?Sized,
{
    let inlet = downstream.take_inlet().ok_or(Error::AlreadyConnected)?;
    let feed = upstream.into_feed();
    let supervisor = feed.supervisor().clone();
    let dying = supervisor.dying_token().clone();
    let outlet = feed.into_receiver();
    let (done, forwarded) = oneshot::channel();

    let attached = supervisor.attach(async move {
        transmit(outlet, inlet, dying).await;
        let _ = done.send(());
        Ok(())
    });
    if !attached {
        debug!("supervisor is dying, stages left unconnected");
    }
    Ok(forwarded)
}
