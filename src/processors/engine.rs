//! Execution skeleton shared by every transform stage.
//!
//! A stage owns an input feed, an output feed and a pool of workers:
//!
//! ```text
//!                    ┌── worker 0 ──┐
//! input ──► shared ──┼── worker 1 ──┼──► output
//!                    └── worker P ──┘
//!          coordinator waits for the pool, then drops the last sender
//! ```
//!
//! Each worker loops over receive-or-die, apply, send-or-die. A failing stage
//! function ends its worker with the error, which the supervisor records as
//! the terminal error. Siblings already past their receive may still emit one
//! more element before they observe the dying signal.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, debug_span, warn, Instrument};

use crate::config::StageConfig;
use crate::core::{Feed, Result, Supervisor};
use crate::metrics;
use crate::util::{recv_shared_or_die, send_or_die, SharedReceiver};

/// A stage function lifted to "element in, zero or more elements out".
pub(crate) type ProcessFn<In, Out> =
    Arc<dyn Fn(In) -> BoxFuture<'static, Result<Vec<Out>>> + Send + Sync>;

/// The feeds of a running stage.
pub(crate) struct StageCore<In, Out> {
    supervisor: Supervisor,
    name: Arc<str>,
    inlet: Option<mpsc::Sender<In>>,
    outlet: mpsc::Receiver<Out>,
}

impl<In, Out> StageCore<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Create the stage feeds and attach its coordinator to `supervisor`.
    ///
    /// If the supervisor is already dying nothing is spawned and both feeds
    /// start out closed.
    pub(crate) fn launch(
        supervisor: &Supervisor,
        config: StageConfig,
        process: ProcessFn<In, Out>,
    ) -> Self {
        let (inlet, input) = mpsc::channel(1);
        let (output, outlet) = mpsc::channel(1);
        let workers = config.workers();
        let name: Arc<str> = Arc::from(config.name);

        let span = debug_span!("stage", stage = %name);
        let coordinator = coordinate(
            supervisor.clone(),
            name.clone(),
            workers,
            process,
            input,
            output,
        );
        if !supervisor.attach(coordinator.instrument(span)) {
            debug!(stage = %name, "stage created on a dying supervisor");
        }

        Self {
            supervisor: supervisor.clone(),
            name,
            inlet: Some(inlet),
            outlet,
        }
    }

    pub(crate) fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn take_inlet(&mut self) -> Option<mpsc::Sender<In>> {
        self.inlet.take()
    }

    pub(crate) fn into_feed(self) -> Feed<Out> {
        Feed::new(&self.supervisor, self.outlet)
    }
}

/// Spawn the worker pool and release the output once every worker is gone.
async fn coordinate<In, Out>(
    supervisor: Supervisor,
    stage: Arc<str>,
    workers: usize,
    process: ProcessFn<In, Out>,
    input: mpsc::Receiver<In>,
    output: mpsc::Sender<Out>,
) -> Result<()>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    let input: SharedReceiver<In> = Arc::new(Mutex::new(input));
    let pool = TaskTracker::new();

    for id in 0..workers {
        let worker = run_worker(
            stage.clone(),
            process.clone(),
            input.clone(),
            output.clone(),
            supervisor.dying_token().clone(),
        );
        let span = debug_span!("worker", worker = id);
        if !supervisor.attach(pool.track_future(worker.instrument(span))) {
            break;
        }
    }

    pool.close();
    pool.wait().await;
    debug!("workers exited, closing output");
    drop(output);
    Ok(())
}

async fn run_worker<In, Out>(
    stage: Arc<str>,
    process: ProcessFn<In, Out>,
    input: SharedReceiver<In>,
    output: mpsc::Sender<Out>,
    dying: CancellationToken,
) -> Result<()>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    while let Some(item) = recv_shared_or_die(&input, &dying).await {
        let emitted = match process(item).await {
            Ok(emitted) => emitted,
            Err(err) => {
                warn!(%err, "stage function failed");
                metrics::stage_failed(&stage);
                return Err(err);
            }
        };

        for item in emitted {
            if !send_or_die(&output, item, &dying).await {
                return Ok(());
            }
            metrics::element_emitted(&stage);
        }
    }
    Ok(())
}

impl<In, Out> std::fmt::Debug for StageCore<In, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("connected", &self.inlet.is_none())
            .field("supervisor", &self.supervisor)
            .finish()
    }
}
