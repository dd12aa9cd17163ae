use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tracking event from the carrier's trace history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipmentEvent {
    pub description: String,
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locality: String,
}

/// The durable shipment entity, keyed by canonical AWB.
///
/// Created on first successful upsert, mutated on every sync that resolves
/// to it, never deleted by the sync core. Assignment fields (`driver_id`)
/// are owned by downstream allocation workflows and left untouched here.
///
/// Scalar fields are `Option` so the blank-safe upsert can distinguish
/// "remote payload did not carry this" from a real value. Nested gateway
/// objects stay as JSON maps — the carrier's shapes vary per endpoint and
/// account, and the merge rules operate on them key-by-key.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShipmentRecord {
    /// Canonical identifier (uppercase alphanumeric, parcel suffix stripped).
    pub awb: String,
    pub status: String,

    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    /// Digits-only companion of `recipient_phone` for lookups.
    pub recipient_phone_norm: Option<String>,
    pub recipient_email: Option<String>,
    pub delivery_address: Option<String>,
    pub locality: Option<String>,
    pub county: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub weight: Option<f64>,
    pub volumetric_weight: Option<f64>,
    pub dimensions: Option<String>,
    pub content_description: Option<String>,
    pub number_of_parcels: Option<i64>,

    pub cod_amount: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub estimated_shipping_cost: Option<f64>,
    pub currency: Option<String>,
    pub declared_value: Option<f64>,

    pub delivery_instructions: Option<String>,
    pub shipment_reference: Option<String>,
    pub client_order_id: Option<String>,
    pub gateway_order_id: Option<String>,

    /// Nested gateway objects, merged key-by-key on update.
    pub courier_data: Option<Value>,
    pub sender_location: Option<Value>,
    pub recipient_location: Option<Value>,
    pub client_shipment_status: Option<Value>,
    pub additional_services: Option<Value>,

    pub created_date: Option<DateTime<Utc>>,
    /// Last-event timestamp reported by the gateway; the change detector's
    /// freshness signal.
    pub awb_status_date: Option<DateTime<Utc>>,
    pub processing_status: Option<String>,
    pub source_channel: Option<String>,
    pub send_type: Option<String>,
    pub sender_shop_name: Option<String>,

    #[serde(default)]
    pub events: Vec<ShipmentEvent>,
    /// Full raw payload from the richest detail fetch so far. List-level
    /// writes never set this, so its absence marks a record still waiting
    /// for a detail payload.
    pub raw_data: Option<Value>,

    /// Set by allocation workflows, never by the sync core.
    pub driver_id: Option<String>,

    pub last_updated: Option<DateTime<Utc>>,
}

impl ShipmentRecord {
    pub fn new(awb: impl Into<String>) -> Self {
        Self { awb: awb.into(), status: "pending".to_string(), ..Default::default() }
    }

    /// Whether a full detail payload has ever been stored for this record.
    pub fn has_detail(&self) -> bool {
        self.raw_data.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_unassigned() {
        let rec = ShipmentRecord::new("AWB123");
        assert_eq!(rec.awb, "AWB123");
        assert_eq!(rec.status, "pending");
        assert!(rec.driver_id.is_none());
        assert!(!rec.has_detail());
    }

    #[test]
    fn test_record_roundtrip() {
        let mut rec = ShipmentRecord::new("SAMEDAY1234567");
        rec.shipping_cost = Some(24.5);
        rec.recipient_location = Some(serde_json::json!({"locality": "Cluj"}));

        let json = serde_json::to_string(&rec).unwrap();
        let back: ShipmentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }
}
