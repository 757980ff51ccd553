//! # Supervised concurrent stream processing for Rust
//!
//! This crate assembles stages into a streaming topology that runs on tokio
//! tasks and shuts down as a unit.
//!
//! ## Core Concepts
//!
//! - **Supervisor**: tracks every worker of a topology, keeps the first error
//!   and broadcasts the dying signal
//! - **Source**: a stage with one open output
//! - **Flow**: a stage with one open input and one open output
//! - **Sink**: a stage with one open input
//! - **Combinators**: [`fan_out`](processors::fan_out) and
//!   [`merge`](processors::merge) for branching topologies
//!
//! Stages hand elements over at rendezvous points: a send completes only once
//! the next stage has taken the element, so a slow consumer backs up the whole
//! topology and a producer stays alive until its last element is delivered.
//! The first failing stage kills the supervisor; every other stage notices and
//! stops.
//!
//! ## Example
//!
//! ```rust
//! use stagewire::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let supervisor = Supervisor::new();
//!     let (sink, mut results) = ChanSink::channel();
//!
//!     let flow = IterSource::new(&supervisor, 1..=10)
//!         .via(Map::new(&supervisor, |x: i64| async move { Ok(x * 2) }, 1))?
//!         .via(Filter::new(&supervisor, |x: &i64| Ok(x % 3 == 0), 1))?;
//!     supervisor.attach(flow.to(sink));
//!
//!     while let Some(x) = results.recv().await {
//!         println!("{x}");
//!     }
//!     supervisor.wait().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod processors;
pub mod sinks;
pub mod sources;

mod metrics;
pub(crate) mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::config::StageConfig;
    pub use crate::core::{Error, Feed, Flow, Inlet, Outlet, Result, Sink, Source, Supervisor};
    pub use crate::processors::{fan_out, merge, Filter, FlatMap, Map, PassThrough};
    pub use crate::sinks::{ChanSink, IgnoreSink, StdoutSink};
    pub use crate::sources::{generate_ids, ChanSource, IterSource};
}

// Re-export main error type
pub use crate::core::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
