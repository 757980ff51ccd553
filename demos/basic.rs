//! A linear topology that fails part way through.
//!
//! A counter feeds a map stage that rejects element 12. The failure kills the
//! supervisor, every stage winds down, and the error comes back from `wait`.
//!
//! Run with `RUST_LOG=stagewire=debug cargo run --example basic` to watch the
//! shutdown.

use std::time::Duration;

use stagewire::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Basic Topology Example ===");

    let supervisor = Supervisor::with_timeout(Duration::from_secs(5));

    let flow = IterSource::new(&supervisor, 0..100u64)
        .via(Map::new(
            &supervisor,
            |n: u64| async move {
                if n == 12 {
                    return Err(Error::custom(format!("cannot handle {n}")));
                }
                Ok(n * 2)
            },
            4,
        ))?
        .via(Filter::new(&supervisor, |n: &u64| Ok(n % 3 == 0), 1))?;

    flow.to(StdoutSink::with_prefix(&supervisor, "Processed"))
        .await?;

    match supervisor.wait().await {
        Ok(()) => println!("Topology completed"),
        Err(err) => println!("Topology stopped: {err}"),
    }
    Ok(())
}
