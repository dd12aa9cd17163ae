use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use shipsync_core::gateway::ShipmentGateway;
use shipsync_core::store::{MemoryStore, ShipmentStore};
use shipsync_core::SyncEngine;
use shipsync_types::models::{ShipmentRecord, SyncConfig};
use shipsync_types::GatewayError;

use crate::router::build_router;
use crate::state::AppState;

/// Gateway that reports an empty remote list.
struct EmptyGateway;

#[async_trait]
impl ShipmentGateway for EmptyGateway {
    fn begin_run(&self) {}

    async fn list_page(&self, _page: u32, _size: u32) -> Result<Vec<Value>, GatewayError> {
        Ok(Vec::new())
    }

    async fn resolve_and_fetch(
        &self,
        _raw: &str,
        _good_enough: i32,
    ) -> Result<Option<Value>, GatewayError> {
        Ok(None)
    }
}

fn app() -> (axum::Router, Arc<dyn ShipmentStore>) {
    let store: Arc<dyn ShipmentStore> = Arc::new(MemoryStore::new());
    let engine = Arc::new(SyncEngine::new(
        Arc::new(EmptyGateway),
        store.clone(),
        SyncConfig::default(),
        true,
    ));
    (build_router(AppState { engine }), store)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let response =
        app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_trigger_and_status() {
    let (app, _) = app();

    let request = Request::post("/api/sync/trigger")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"wait": true}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["started"], true);
    assert_eq!(body["status"]["last_stats"]["list_items"], 0);

    let response = app
        .oneshot(Request::get("/api/sync/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["running"], false);
    assert_eq!(body["last_trigger"], "manual");
}

#[tokio::test]
async fn test_trigger_accepts_empty_body() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::post("/api/sync/trigger").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["started"], true);
}

#[tokio::test]
async fn test_get_shipment_canonicalizes_path() {
    let (app, store) = app();
    let mut record = ShipmentRecord::new("AWB1234567890");
    record.status = "Delivered".to_string();
    store.upsert(&record).await.unwrap();

    // Suffixed scan form resolves to the same stored record.
    let response = app
        .clone()
        .oneshot(Request::get("/api/shipments/awb-1234567890-001").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "Delivered");

    let response = app
        .clone()
        .oneshot(Request::get("/api/shipments/UNKNOWN999").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(Request::get("/api/shipments/---").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_updated_filters_by_cutoff() {
    let (app, store) = app();
    let mut old = ShipmentRecord::new("OLD0001");
    old.last_updated = Some(Utc::now() - chrono::Duration::days(7));
    store.upsert(&old).await.unwrap();
    let mut fresh = ShipmentRecord::new("FRESH01");
    fresh.last_updated = Some(Utc::now());
    store.upsert(&fresh).await.unwrap();

    let response = app
        .clone()
        .oneshot(Request::get("/api/shipments").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["awb"], "FRESH01");

    let cutoff = (Utc::now() - chrono::Duration::days(30)).to_rfc3339();
    let uri = format!("/api/shipments?updated_after={}", urlencode(&cutoff));
    let response = app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

fn urlencode(value: &str) -> String {
    value.replace('+', "%2B").replace(':', "%3A")
}
