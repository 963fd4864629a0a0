//! Retention enforcement.
//!
//! A background worker periodically picks the channels whose next check has
//! passed, deletes their expired messages and reschedules or evicts them.
//! The pure parts (id codec, eligibility filter, settlement) live in their
//! own modules so they can be tested without a platform or a store.

pub mod clock;
pub mod codec;
pub mod filter;
pub mod settle;
mod worker;

pub use worker::{PassReport, RetentionScheduler, start_retention_worker};
