//! Core traits and types for the stagewire library.
//!
//! This module contains the supervision unit, the stage capabilities and the
//! error type that every stage shares.

pub mod error;
pub mod feed;
pub mod supervisor;
pub mod traits;

// Re-export core items
pub use error::{Error, Result};
pub use feed::Feed;
pub use supervisor::Supervisor;
pub use traits::{Flow, Inlet, Outlet, Sink, Source};
