//! HTTP handlers for the status API.

pub mod connectivity;
pub mod queue;
pub mod sessions;
