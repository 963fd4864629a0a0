//! Log subscriber setup for the daemon.
//!
//! Console output comes in pretty, compact or JSON form and can be mirrored
//! to a file.

mod tracing_init;

pub use tracing_init::*;
