//! Normalization of raw gateway payloads into [`ShipmentRecord`]s.
//!
//! The gateway's JSON differs by endpoint and account: field aliases,
//! strings-vs-objects for places, costs hiding in nested maps, timestamps
//! with and without offsets. All of that is flattened here, in one place,
//! so the rest of the engine deals only in typed records.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use shipsync_types::models::{ShipmentEvent, ShipmentRecord};
use shipsync_types::SyncError;

use crate::fields::{self, resolve, resolve_f64, resolve_str};
use crate::score;

/// Cost aliases also looked up below the top level.
const SHIPPING_COST_KEYS: &[&str] = &[
    "carrierShippingCost",
    "courierShippingCost",
    "shippingCost",
    "carrierCost",
    "courierCost",
    "finalPrice",
    "finalCost",
];
const ESTIMATED_COST_KEYS: &[&str] = &["estimatedShippingCost", "estimatedCost", "estimatedPrice"];
const CURRENCY_KEYS: &[&str] = &["currency", "paymentCurrency", "currencyCode"];

const COST_SEARCH_DEPTH: usize = 3;

/// Maximum rendered length for content descriptions.
const MAX_CONTENT_LEN: usize = 500;

/// Parse gateway timestamps (RFC3339 with trailing `Z`, with offset, or
/// naive) into UTC.
pub fn parse_dt(value: &Value) -> Option<DateTime<Utc>> {
    let s = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Map the gateway's status alias soup into the display vocabulary the
/// rest of the product uses. Unrecognized statuses pass through verbatim.
pub fn normalize_status(payload: &Value) -> String {
    let raw = resolve_str(
        payload,
        &[
            "clientShipmentStatusDescription",
            "processingStatus",
            "status",
            "currentStatus",
            "defaultClientStatus",
        ],
    )
    .unwrap_or_default();

    match raw.to_lowercase().as_str() {
        "livrat" | "delivered" => "Delivered".to_string(),
        "initial" | "routed" | "in transit" | "in_transit" | "in tranzit" | "in_tranzit" => {
            "In Transit".to_string()
        },
        "refuzat" | "refused" => "Refused".to_string(),
        "" => "pending".to_string(),
        _ => raw,
    }
}

/// Digits-only phone form for lookups; keeps a leading `+`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 6 {
        return None;
    }
    if raw.trim_start().starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

/// Event trace under any of its aliases; tolerates `{items: [...]}` wrapping.
pub fn extract_trace(payload: &Value) -> Vec<ShipmentEvent> {
    let raw = resolve(payload, &["shipmentTrace", "traceHistory", "tracking", "events"]);
    let list = match raw {
        Some(Value::Array(a)) => a.as_slice(),
        Some(wrapped @ Value::Object(_)) => {
            match resolve(wrapped, &["items", "events", "trace"]) {
                Some(Value::Array(a)) => a.as_slice(),
                _ => return Vec::new(),
            }
        },
        _ => return Vec::new(),
    };

    list.iter()
        .filter_map(|ev| {
            if !ev.is_object() {
                return None;
            }
            let description = resolve_str(ev, &["eventDescription", "statusDescription"])
                .or_else(|| {
                    resolve(ev, &["courierShipmentStatus"])
                        .and_then(|s| resolve_str(s, &["statusDescription"]))
                });
            let event_date = resolve(ev, &["eventDate", "createdDate", "date"]).and_then(parse_dt);
            if description.is_none() && event_date.is_none() {
                return None;
            }
            Some(ShipmentEvent {
                description: description.unwrap_or_else(|| "Update".to_string()),
                event_date,
                locality: resolve_str(ev, &["localityName", "locality"]).unwrap_or_default(),
            })
        })
        .collect()
}

/// Coordinates from the top level or either location object.
pub fn extract_lat_lon(payload: &Value) -> (Option<f64>, Option<f64>) {
    let pairs: &[(&str, &str)] = &[("latitude", "longitude"), ("lat", "lng"), ("lat", "lon")];
    let mut scopes: Vec<&Value> = vec![payload];
    for key in ["recipientLocation", "senderLocation"] {
        if let Some(loc) = resolve(payload, &[key]) {
            scopes.push(loc);
        }
    }
    for scope in scopes {
        for (lat_key, lon_key) in pairs {
            let lat = resolve_f64(scope, &[lat_key]);
            let lon = resolve_f64(scope, &[lon_key]);
            if let (Some(lat), Some(lon)) = (lat, lon) {
                return (Some(lat), Some(lon));
            }
        }
    }
    (None, None)
}

fn fmt_dim(v: f64) -> String {
    if (v - v.round()).abs() < 1e-6 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.1}")
    }
}

/// `LxWxH cm` when all three dimensions are present and positive, else any
/// preformatted `dimensions` string.
pub fn compute_dimensions(payload: &Value) -> Option<String> {
    let l = resolve_f64(payload, &["length"]);
    let w = resolve_f64(payload, &["width"]);
    let h = resolve_f64(payload, &["height"]);
    if let (Some(l), Some(w), Some(h)) = (l, w, h) {
        if l > 0.0 && w > 0.0 && h > 0.0 {
            return Some(format!("{}x{}x{} cm", fmt_dim(l), fmt_dim(w), fmt_dim(h)));
        }
    }
    resolve_str(payload, &["dimensions"])
}

/// Carrier cost, estimated cost and currency, searched through shallow
/// nesting when the fast top-level path misses.
pub fn extract_costs(payload: &Value) -> (Option<f64>, Option<f64>, Option<String>) {
    let shipping = resolve_f64(payload, SHIPPING_COST_KEYS)
        .or_else(|| fields::find_f64_deep(payload, SHIPPING_COST_KEYS, COST_SEARCH_DEPTH));
    let estimated = resolve_f64(payload, ESTIMATED_COST_KEYS)
        .or_else(|| fields::find_f64_deep(payload, ESTIMATED_COST_KEYS, COST_SEARCH_DEPTH));
    let currency = resolve_str(payload, CURRENCY_KEYS)
        .or_else(|| fields::find_str_deep(payload, CURRENCY_KEYS, COST_SEARCH_DEPTH));
    (shipping, estimated, currency)
}

fn clip(text: String) -> String {
    if text.len() <= MAX_CONTENT_LEN {
        text
    } else {
        let mut cut = MAX_CONTENT_LEN - 3;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", text[..cut].trim_end())
    }
}

fn render_items(items: &Value) -> Option<String> {
    let list = items.as_array()?;
    let mut parts: Vec<String> = Vec::new();
    for item in list {
        let rendered = match item {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Object(_) => {
                let name = resolve_str(
                    item,
                    &["name", "title", "description", "productName", "itemName", "articleName"],
                )
                .or_else(|| resolve_str(item, &["sku", "code", "productCode"]));
                let Some(name) = name else { continue };
                let qty = resolve_f64(item, &["quantity", "qty", "count", "pieces"])
                    .map(|q| q as i64)
                    .filter(|&q| q > 1);
                match qty {
                    Some(q) => format!("{q}x {name}"),
                    None => name,
                }
            },
            _ => continue,
        };
        if !parts.contains(&rendered) {
            parts.push(rendered);
        }
        if parts.len() >= 12 {
            break;
        }
    }
    (!parts.is_empty()).then(|| clip(parts.join("; ")))
}

const CONTENT_KEYS: &[&str] = &[
    "contentDescription",
    "contents",
    "content",
    "packageContent",
    "shipmentContent",
    "goodsDescription",
    "descriptionOfGoods",
    "packingList",
    "packingListNumber",
];

/// Best-effort package content: direct aliases first, then nested
/// containers, then itemized product lists.
pub fn content_description(payload: &Value) -> Option<String> {
    if let Some(s) = resolve_str(payload, CONTENT_KEYS) {
        return Some(clip(s));
    }
    for container in ["additionalServices", "shipment", "details", "clientOrder", "order"] {
        if let Some(obj) = resolve(payload, &[container]) {
            if let Some(s) = resolve_str(obj, CONTENT_KEYS) {
                return Some(clip(s));
            }
        }
    }
    for list_key in ["items", "shipmentItems", "orderItems", "products", "articles", "goods"] {
        if let Some(items) = resolve(payload, &[list_key]) {
            if let Some(rendered) = render_items(items) {
                return Some(rendered);
            }
        }
    }
    fields::find_str_deep(payload, CONTENT_KEYS, COST_SEARCH_DEPTH).map(clip)
}

/// Build a normalized record from a raw payload. The only hard failure is
/// a payload without a resolvable identifier.
pub fn build_record(payload: &Value) -> Result<ShipmentRecord, SyncError> {
    let awb = score::extract_identifier(payload).ok_or(SyncError::MissingIdentifier)?;

    let recipient_loc = resolve(payload, &["recipientLocation"]).filter(|v| v.is_object());
    let sender_loc = resolve(payload, &["senderLocation"]).filter(|v| v.is_object());
    let (lat, lon) = extract_lat_lon(payload);
    let (shipping_cost, estimated_shipping_cost, currency) = extract_costs(payload);

    let recipient_phone = recipient_loc
        .and_then(|loc| resolve_str(loc, &["phoneNumber", "phone"]))
        .or_else(|| resolve_str(payload, &["recipientPhoneNumber", "phone"]));

    let cod_amount = resolve(payload, &["additionalServices"])
        .and_then(|s| resolve_f64(s, &["cashOnDelivery"]))
        .or_else(|| resolve_f64(payload, &["cashOnDelivery", "codAmount", "cod"]));

    let mut record = ShipmentRecord {
        awb,
        status: normalize_status(payload),
        recipient_name: recipient_loc
            .and_then(|loc| resolve_str(loc, &["name"]))
            .or_else(|| resolve_str(payload, &["recipientName", "recipient"])),
        recipient_phone_norm: recipient_phone.as_deref().and_then(normalize_phone),
        recipient_phone,
        recipient_email: recipient_loc
            .and_then(|loc| resolve_str(loc, &["email"]))
            .or_else(|| resolve_str(payload, &["recipientEmail"])),
        delivery_address: recipient_loc
            .and_then(|loc| resolve_str(loc, &["addressText", "address"]))
            .or_else(|| resolve_str(payload, &["address", "recipientAddress"])),
        locality: recipient_loc
            .and_then(|loc| {
                resolve(loc, &["locality", "localityName", "city", "cityName"])
                    .and_then(fields::place_name)
            })
            .or_else(|| {
                resolve(payload, &["city", "recipientLocality", "locality"])
                    .and_then(fields::place_name)
            }),
        county: recipient_loc.and_then(|loc| {
            resolve(loc, &["county", "countyName", "region", "regionName"])
                .and_then(fields::place_name)
        }),
        latitude: lat,
        longitude: lon,
        weight: resolve_f64(payload, &["brutWeight", "weight"]),
        volumetric_weight: resolve_f64(payload, &["volumetricWeight"]),
        dimensions: compute_dimensions(payload),
        content_description: content_description(payload),
        number_of_parcels: resolve_f64(payload, &["numberOfDistinctBarcodes", "numberOfParcels"])
            .map(|n| n as i64),
        cod_amount,
        shipping_cost,
        estimated_shipping_cost,
        currency,
        declared_value: resolve_f64(payload, &["declaredValue"]),
        delivery_instructions: resolve_str(payload, &["shippingInstruction", "instructions"]),
        shipment_reference: resolve_str(payload, &["shipmentReference"]),
        client_order_id: resolve_str(payload, &["clientOrderId"]),
        gateway_order_id: resolve_str(payload, &["id", "orderId"]),
        courier_data: courier_object(payload),
        sender_location: sender_loc.cloned(),
        recipient_location: recipient_loc.cloned(),
        client_shipment_status: resolve(payload, &["clientShipmentStatus"]).cloned(),
        additional_services: resolve(payload, &["additionalServices"])
            .filter(|v| v.is_object())
            .cloned(),
        created_date: resolve(payload, &["createdDate"]).and_then(parse_dt),
        awb_status_date: resolve(payload, &["awbStatusDate"]).and_then(parse_dt),
        processing_status: resolve_str(payload, &["processingStatus"]),
        source_channel: resolve_str(payload, &["sourceChannel", "salesChannel"]),
        send_type: resolve_str(payload, &["sendType", "type"]),
        sender_shop_name: resolve_str(payload, &["storeName", "senderShopName"]),
        events: extract_trace(payload),
        raw_data: None,
        driver_id: None,
        last_updated: Some(Utc::now()),
    };
    record.raw_data = Some(payload.clone());
    Ok(record)
}

/// Courier info appears as an object, a bare name string, or scattered
/// top-level aliases. Normalize to one object.
fn courier_object(payload: &Value) -> Option<Value> {
    let mut base = match resolve(payload, &["courier", "carrier"]) {
        Some(Value::Object(o)) => o.clone(),
        Some(Value::String(name)) if !name.trim().is_empty() => {
            let mut o = serde_json::Map::new();
            o.insert("name".to_string(), Value::String(name.trim().to_string()));
            o
        },
        _ => serde_json::Map::new(),
    };

    for (dst, aliases) in [
        ("courierId", &["courierId", "carrierId"] as &[&str]),
        ("courierName", &["courierName", "carrierName"]),
        ("carrierCode", &["carrierCode"]),
        ("truckNumber", &["truckNumber"]),
        ("tripId", &["tripId"]),
    ] {
        if base.get(dst).is_none_or(fields::is_blank) {
            if let Some(v) = resolve_str(payload, aliases) {
                base.insert(dst.to_string(), Value::String(v));
            }
        }
    }

    (!base.is_empty()).then(|| Value::Object(base))
}
