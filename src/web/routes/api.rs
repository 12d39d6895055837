//! REST API route definitions.

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::web::handlers::{connectivity, queue, sessions};
use crate::web::state::WebAppState;

/// Build the API router with all REST endpoints.
pub fn api_routes() -> Router<WebAppState> {
    Router::new()
        // Queue routes
        .route("/queue", get(queue::get_queue))
        .route("/queue/drain", post(queue::drain_queue))
        .route("/queue/{id}", delete(queue::remove_action))
        // Connectivity
        .route("/connectivity", get(connectivity::get_connectivity))
        // Session logs
        .route("/sessions/{id}/events", get(sessions::list_session_events))
}
