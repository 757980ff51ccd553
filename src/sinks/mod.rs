//! Consumers at the boundary of a topology.
//!
//! A sink exposes a write-only input. [`ChanSink`] hands the elements to an
//! external consumer; [`StdoutSink`] and [`IgnoreSink`] run one worker of
//! their own that drains the input until it closes or the topology dies.

use std::fmt::Display;

use tokio::sync::mpsc;
use tracing::{debug, debug_span, Instrument};

use crate::core::{Inlet, Sink, Supervisor};
use crate::util::recv_or_die;

/// A sink that forwards elements to an external channel.
pub struct ChanSink<T> {
    inlet: Option<mpsc::Sender<T>>,
}

impl<T> ChanSink<T> {
    /// Deliver elements into `sender`.
    pub fn new(sender: mpsc::Sender<T>) -> Self {
        Self {
            inlet: Some(sender),
        }
    }

    /// Create a sink together with the receiver an external consumer drains.
    pub fn channel() -> (Self, mpsc::Receiver<T>) {
        let (sender, receiver) = mpsc::channel(1);
        (Self::new(sender), receiver)
    }
}

impl<T: Send + 'static> Inlet for ChanSink<T> {
    type In = T;

    fn take_inlet(&mut self) -> Option<mpsc::Sender<T>> {
        self.inlet.take()
    }
}

impl<T: Send + 'static> Sink for ChanSink<T> {}

/// A sink that prints every element to stdout.
pub struct StdoutSink<T> {
    inlet: Option<mpsc::Sender<T>>,
}

impl<T: Display + Send + 'static> StdoutSink<T> {
    /// Create a new stdout sink attached to `supervisor`
    pub fn new(supervisor: &Supervisor) -> Self {
        Self::printing(supervisor, None)
    }

    /// Create a stdout sink that prints `prefix: element`
    pub fn with_prefix<S: Into<String>>(supervisor: &Supervisor, prefix: S) -> Self {
        Self::printing(supervisor, Some(prefix.into()))
    }

    fn printing(supervisor: &Supervisor, prefix: Option<String>) -> Self {
        let inlet = drain(supervisor, "stdout_sink", move |item: T| match &prefix {
            Some(prefix) => println!("{}: {}", prefix, item),
            None => println!("{}", item),
        });
        Self { inlet: Some(inlet) }
    }
}

impl<T: Send + 'static> Inlet for StdoutSink<T> {
    type In = T;

    fn take_inlet(&mut self) -> Option<mpsc::Sender<T>> {
        self.inlet.take()
    }
}

impl<T: Send + 'static> Sink for StdoutSink<T> {}

/// A sink that discards every element.
pub struct IgnoreSink<T> {
    inlet: Option<mpsc::Sender<T>>,
}

impl<T: Send + 'static> IgnoreSink<T> {
    /// Create a new discarding sink attached to `supervisor`
    pub fn new(supervisor: &Supervisor) -> Self {
        let inlet = drain(supervisor, "ignore_sink", drop);
        Self { inlet: Some(inlet) }
    }
}

impl<T: Send + 'static> Inlet for IgnoreSink<T> {
    type In = T;

    fn take_inlet(&mut self) -> Option<mpsc::Sender<T>> {
        self.inlet.take()
    }
}

impl<T: Send + 'static> Sink for IgnoreSink<T> {}

/// Attach one worker that hands every received element to `consume`.
fn drain<T, F>(supervisor: &Supervisor, name: &'static str, mut consume: F) -> mpsc::Sender<T>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let (sender, mut receiver) = mpsc::channel(1);
    let dying = supervisor.dying_token().clone();

    let worker = async move {
        let mut consumed = 0usize;
        while let Some(item) = recv_or_die(&mut receiver, &dying).await {
            consume(item);
            consumed += 1;
        }
        debug!(consumed, "sink drained");
        Ok(())
    };
    supervisor.attach(worker.instrument(debug_span!("sink", sink = name)));
    sender
}

macro_rules! impl_sink_debug {
    ($($sink:ident),*) => {
        $(
            impl<T> std::fmt::Debug for $sink<T> {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.debug_struct(stringify!($sink))
                        .field("connected", &self.inlet.is_none())
                        .finish()
                }
            }
        )*
    };
}

impl_sink_debug!(ChanSink, StdoutSink, IgnoreSink);
