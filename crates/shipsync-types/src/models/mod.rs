//! Data model for the shipment mirror.

mod config;
mod shipment;
mod sync;

pub use config::{GatewayConfig, RetryConfig, SyncConfig};
pub use shipment::{ShipmentEvent, ShipmentRecord};
pub use sync::{SyncMode, SyncStats, SyncStatus, TriggerKind, TriggerRequest, TriggerResponse};
