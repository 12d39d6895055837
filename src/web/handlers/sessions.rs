//! Recorded session handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::eventlog::session_log_key;
use crate::session::HistoryEntry;
use crate::web::error::WebError;
use crate::web::state::WebAppState;

/// Response for a session's recorded history.
#[derive(Debug, Serialize)]
pub struct SessionEventsResponse {
    pub session_id: String,
    pub events: Vec<HistoryEntry>,
}

/// Recorded command/output history of one session, oldest first.
///
/// Serves the same shape the replayer consumes, so the frontend can pass it
/// straight back as provided history.
pub async fn list_session_events(
    State(state): State<WebAppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionEventsResponse>, WebError> {
    if id.trim().is_empty() {
        return Err(WebError::BadRequest("Session id must not be empty".to_string()));
    }
    let events = state.store().read(&session_log_key(&id));
    if events.is_empty() {
        return Err(WebError::NotFound(format!("Session {} has no recorded events", id)));
    }

    Ok(Json(SessionEventsResponse {
        session_id: id,
        events: events.iter().filter_map(HistoryEntry::from_log_event).collect(),
    }))
}
