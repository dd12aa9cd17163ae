//! Sync control endpoints.

use axum::extract::State;
use axum::Json;

use shipsync_types::models::{SyncStatus, TriggerRequest, TriggerResponse};

use crate::state::AppState;

/// `POST /api/sync/trigger`
///
/// Body is optional; an empty trigger is a fire-and-forget quick run.
/// `started: false` in the response means a run was already in flight.
pub async fn trigger(
    State(state): State<AppState>,
    body: Option<Json<TriggerRequest>>,
) -> Json<TriggerResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    Json(state.engine.clone().trigger(req).await)
}

/// `GET /api/sync/status`
pub async fn status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.engine.status().await)
}
