//! Local HTTP status API.
//!
//! Exposes the queue, connectivity and recorded session logs to the console
//! frontend. Mutations go through the same [`ActionQueue`](crate::queue::ActionQueue)
//! the rest of the process uses.

mod error;
mod handlers;
mod routes;
mod server;
mod state;

pub use error::WebError;
pub use server::{build_router, run_server, ServerConfig};
pub use state::WebAppState;
