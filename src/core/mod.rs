//! Shared wiring for the CLI and the status API.
//!
//! [`StackdeckCore`] owns the database, the event log store and every
//! subsystem built on top of it, configured from [`Config`](crate::config::Config).

mod stackdeck_core;

pub use stackdeck_core::{BackgroundServices, StackdeckCore};
