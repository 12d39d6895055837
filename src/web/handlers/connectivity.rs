//! Connectivity handler.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::web::state::WebAppState;

#[derive(Debug, Serialize)]
pub struct ConnectivityResponse {
    pub online: bool,
}

/// Current reachability as seen by the monitor.
pub async fn get_connectivity(State(state): State<WebAppState>) -> Json<ConnectivityResponse> {
    Json(ConnectivityResponse {
        online: state.connectivity().is_online(),
    })
}
