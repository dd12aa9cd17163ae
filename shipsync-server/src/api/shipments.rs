//! Read access to the mirrored shipments.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use shipsync_core::identifier;
use shipsync_types::models::ShipmentRecord;
use shipsync_types::SyncError;

use crate::state::AppState;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

fn store_error(err: SyncError) -> Response {
    tracing::error!("[Api] store read failed: {err}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "store read failed")
}

/// `GET /api/shipments/{awb}`
///
/// The path segment is canonicalized first, so scanned forms with dashes
/// or a parcel suffix hit the same record.
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(awb): Path<String>,
) -> Response {
    let Some(key) = identifier::storage_key(&awb) else {
        return error_response(StatusCode::BAD_REQUEST, "identifier is blank");
    };
    match state.engine.store().get(&key).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "shipment not found"),
        Err(err) => store_error(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatedQuery {
    /// RFC3339 cutoff; defaults to the last 24 hours.
    pub updated_after: Option<DateTime<Utc>>,
}

/// `GET /api/shipments?updated_after=2025-06-01T00:00:00Z`
pub async fn list_updated(
    State(state): State<AppState>,
    Query(query): Query<UpdatedQuery>,
) -> Result<Json<Vec<ShipmentRecord>>, Response> {
    let since = query.updated_after.unwrap_or_else(|| Utc::now() - Duration::hours(24));
    state.engine.store().updated_since(since).await.map(Json).map_err(store_error)
}
