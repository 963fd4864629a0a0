//! Hourglass: per-channel message retention for Discord.
//!
//! Channels are tracked with a timeout in hours. A background worker wakes
//! each channel when its next message is due to expire, deletes what has
//! aged out and works out when to look again.

pub mod config;
pub mod db;
pub mod models;
#[cfg(feature = "server")]
pub mod observability;
pub mod platform;
pub mod retention;
