//! REST API surface: sync control and shipment reads under `/api`.

pub mod shipments;
pub mod sync;

#[cfg(test)]
mod api_tests;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/trigger", post(sync::trigger))
        .route("/sync/status", get(sync::status))
        .route("/shipments", get(shipments::list_updated))
        .route("/shipments/:awb", get(shipments::get_shipment))
}
