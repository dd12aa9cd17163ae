//! shipsync-core — the external shipment synchronization engine.
//!
//! Keeps a local shipment mirror eventually consistent with an unreliable,
//! rate-limited, loosely-schematized carrier gateway:
//!
//! - [`identifier`] — canonical AWB normalization and lookup candidates
//! - [`gateway`] — authenticated HTTP client with retry/backoff/fallback
//! - [`score`] — completeness scoring and blank-safe payload merging
//! - [`detect`] — list-vs-store change detection
//! - [`upsert`] — blank-safe idempotent record writer
//! - [`sync`] — single-flight orchestrator and scheduled loop
//!
//! Everything else in the product (routing, auth, UI, allocation) is a thin
//! consumer reading from the [`store`] or poking the [`sync`] entrypoints.

pub mod config;
pub mod coordinator;
pub mod detect;
pub mod extract;
pub mod fields;
pub mod gateway;
pub mod identifier;
pub mod score;
pub mod store;
pub mod sync;
pub mod upsert;

pub use coordinator::SyncCoordinator;
pub use gateway::{HttpGateway, ShipmentGateway};
pub use store::{MemoryStore, ShipmentStore, SqliteStore};
pub use sync::SyncEngine;
