use std::sync::Arc;

use shipsync_core::SyncEngine;

/// Shared application state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}
