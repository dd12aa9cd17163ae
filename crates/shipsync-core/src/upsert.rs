//! Blank-safe, idempotent shipment writer.
//!
//! Both the cheap list payloads and the rich detail payloads funnel through
//! [`apply_payload`]. A list row must never erase detail data it does not
//! carry, so updates overwrite a stored field only when the incoming record
//! actually has a value for it, and nested gateway objects are merged
//! key-by-key with the same rule. Assignment fields stay untouched.
//!
//! Only detail-level writes populate `raw_data`. A record whose detail
//! fetch failed or was capped stays detail-less, which keeps it eligible
//! for the change detector's missing-detail widening on later runs.

use serde_json::Value;
use std::sync::Arc;

use shipsync_types::models::ShipmentRecord;
use shipsync_types::SyncError;

use crate::extract;
use crate::score;
use crate::store::ShipmentStore;

/// What a single write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Where a payload came from. List rows are sparse and must never count
/// as a stored detail payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    List,
    Detail,
}

/// Normalize `payload`, merge it into whatever the store already holds for
/// the same canonical identifier, and write the result back.
///
/// Fails only on a payload without a resolvable identifier or on a store
/// error; everything else degrades to keeping the stored value.
pub async fn apply_payload(
    store: &Arc<dyn ShipmentStore>,
    payload: &Value,
    kind: PayloadKind,
) -> Result<UpsertOutcome, SyncError> {
    let mut incoming = extract::build_record(payload)?;
    if kind == PayloadKind::List {
        incoming.raw_data = None;
    }
    match store.get(&incoming.awb).await? {
        None => {
            store.upsert(&incoming).await?;
            Ok(UpsertOutcome::Created)
        },
        Some(existing) => {
            let merged = merge_records(existing, incoming);
            store.upsert(&merged).await?;
            Ok(UpsertOutcome::Updated)
        },
    }
}

fn keep<T>(current: Option<T>, incoming: Option<T>) -> Option<T> {
    incoming.or(current)
}

fn keep_value(current: Option<Value>, incoming: Option<Value>) -> Option<Value> {
    match (current, incoming) {
        (Some(cur), Some(inc)) => Some(score::merge_fill_blanks(&inc, &cur)),
        (cur, inc) => inc.or(cur),
    }
}

/// Merge an incoming normalized record over the stored one. Incoming
/// non-blank values win; stored values survive incoming blanks; raw payloads
/// are merged toward whichever combination scores richer.
fn merge_records(existing: ShipmentRecord, incoming: ShipmentRecord) -> ShipmentRecord {
    let raw_data = match (&existing.raw_data, &incoming.raw_data) {
        (Some(old), Some(new)) => Some(score::best_merged(new, old)),
        (old, new) => new.clone().or_else(|| old.clone()),
    };

    ShipmentRecord {
        awb: existing.awb.clone(),
        // A payload without any status field normalizes to "pending"; that
        // must not demote a shipment that already progressed.
        status: if incoming.status == "pending" { existing.status.clone() } else { incoming.status },

        recipient_name: keep(existing.recipient_name, incoming.recipient_name),
        recipient_phone: keep(existing.recipient_phone, incoming.recipient_phone),
        recipient_phone_norm: keep(existing.recipient_phone_norm, incoming.recipient_phone_norm),
        recipient_email: keep(existing.recipient_email, incoming.recipient_email),
        delivery_address: keep(existing.delivery_address, incoming.delivery_address),
        locality: keep(existing.locality, incoming.locality),
        county: keep(existing.county, incoming.county),
        latitude: keep(existing.latitude, incoming.latitude),
        longitude: keep(existing.longitude, incoming.longitude),

        weight: keep(existing.weight, incoming.weight),
        volumetric_weight: keep(existing.volumetric_weight, incoming.volumetric_weight),
        dimensions: keep(existing.dimensions, incoming.dimensions),
        content_description: keep(existing.content_description, incoming.content_description),
        number_of_parcels: keep(existing.number_of_parcels, incoming.number_of_parcels),

        cod_amount: keep(existing.cod_amount, incoming.cod_amount),
        shipping_cost: keep(existing.shipping_cost, incoming.shipping_cost),
        estimated_shipping_cost: keep(
            existing.estimated_shipping_cost,
            incoming.estimated_shipping_cost,
        ),
        currency: keep(existing.currency, incoming.currency),
        declared_value: keep(existing.declared_value, incoming.declared_value),

        delivery_instructions: keep(existing.delivery_instructions, incoming.delivery_instructions),
        shipment_reference: keep(existing.shipment_reference, incoming.shipment_reference),
        client_order_id: keep(existing.client_order_id, incoming.client_order_id),
        gateway_order_id: keep(existing.gateway_order_id, incoming.gateway_order_id),

        courier_data: keep_value(existing.courier_data, incoming.courier_data),
        sender_location: keep_value(existing.sender_location, incoming.sender_location),
        recipient_location: keep_value(existing.recipient_location, incoming.recipient_location),
        client_shipment_status: keep_value(
            existing.client_shipment_status,
            incoming.client_shipment_status,
        ),
        additional_services: keep_value(existing.additional_services, incoming.additional_services),

        created_date: keep(existing.created_date, incoming.created_date),
        awb_status_date: keep(existing.awb_status_date, incoming.awb_status_date),
        processing_status: keep(existing.processing_status, incoming.processing_status),
        source_channel: keep(existing.source_channel, incoming.source_channel),
        send_type: keep(existing.send_type, incoming.send_type),
        sender_shop_name: keep(existing.sender_shop_name, incoming.sender_shop_name),

        // Replace semantics: a payload with a trace supersedes the stored
        // trace wholesale, an empty one leaves it alone.
        events: if incoming.events.is_empty() { existing.events } else { incoming.events },
        raw_data,

        driver_id: existing.driver_id,

        last_updated: incoming.last_updated.or(existing.last_updated),
    }
}
