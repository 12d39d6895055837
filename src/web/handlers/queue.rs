//! Offline action queue handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::queue::{DrainReport, QueuedAction};
use crate::web::error::WebError;
use crate::web::state::WebAppState;

/// Response for the queue overview.
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub size: usize,
    pub draining: bool,
    pub actions: Vec<QueuedAction>,
}

/// List queued actions awaiting delivery.
pub async fn get_queue(State(state): State<WebAppState>) -> Json<QueueResponse> {
    let queue = state.queue();
    Json(QueueResponse {
        size: queue.size(),
        draining: queue.is_draining(),
        actions: queue.pending(),
    })
}

/// Attempt delivery of everything in the queue ("sync now").
pub async fn drain_queue(
    State(state): State<WebAppState>,
) -> Result<Json<DrainReport>, WebError> {
    let report = state.queue().drain().await;
    if report.skipped {
        return Err(WebError::Conflict("A drain is already in progress".to_string()));
    }
    Ok(Json(report))
}

/// Drop a queued action without delivering it.
pub async fn remove_action(
    State(state): State<WebAppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, WebError> {
    if state.queue().remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::NotFound(format!("Action {} not found", id)))
    }
}
