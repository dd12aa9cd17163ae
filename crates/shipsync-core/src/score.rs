//! Completeness scoring and blank-safe merging of shipment payloads.
//!
//! Different gateway endpoints return different slices of the same
//! shipment: the list endpoint carries status and little else, the detail
//! endpoint carries addresses and parcels, the resolve endpoint sometimes
//! only echoes identifiers. The scorer ranks how much useful detail a
//! payload holds; the merger combines two representations without ever
//! discarding known information.

use serde_json::{Map, Value};

use crate::fields::{self, is_blank};
use crate::identifier;

/// Keys under which the gateway spells the shipment identifier.
pub const AWB_KEYS: &[&str] = &["awb", "trackingNumber", "barCode"];

const SHIPPING_COST_KEYS: &[&str] = &[
    "shippingCost",
    "carrierShippingCost",
    "courierShippingCost",
    "carrierCost",
    "courierCost",
    "finalPrice",
    "finalCost",
    "estimatedShippingCost",
    "estimatedCost",
    "estimatedPrice",
];

const CONTENT_KEYS: &[&str] = &[
    "contentDescription",
    "contents",
    "content",
    "packageContent",
    "goodsDescription",
    "descriptionOfGoods",
    "packingList",
    "packingListNumber",
];

const PARCEL_LIST_KEYS: &[&str] = &["parcels", "packages", "items", "shipmentItems"];

const TRACE_KEYS: &[&str] = &["shipmentTrace", "traceHistory", "tracking", "events"];

/// How deep the cost search may go. Costs nest at most one or two objects
/// down in observed payloads.
const COST_SEARCH_DEPTH: usize = 3;

/// Heuristic measure of how much useful shipment detail a payload contains.
///
/// Higher is richer. Weights reflect operational value: a resolvable
/// identifier and a deliverable address matter most, service flags least.
pub fn score(payload: &Value) -> i32 {
    let mut total = 0;

    if extract_identifier(payload).is_some() {
        total += 2;
    }

    if let Some(loc) = fields::resolve(payload, &["recipientLocation"]) {
        if loc.as_object().is_some_and(|o| !o.is_empty()) {
            total += 1;
            if fields::resolve(loc, &["county", "countyName", "region", "regionName"])
                .is_some_and(|v| fields::place_name(v).is_some())
            {
                total += 3;
            }
            if fields::resolve(loc, &["locality", "localityName", "city", "cityName"])
                .is_some_and(|v| fields::place_name(v).is_some())
            {
                total += 2;
            }
            if fields::resolve_str(loc, &["addressText", "address", "streetAddress"]).is_some() {
                total += 2;
            }
            if fields::resolve_str(loc, &["phoneNumber", "phone"]).is_some() {
                total += 1;
            }
        }
    }

    if fields::find_f64_deep(payload, SHIPPING_COST_KEYS, COST_SEARCH_DEPTH)
        .is_some_and(|c| c != 0.0)
    {
        total += 2;
    }

    if fields::resolve_str(payload, CONTENT_KEYS).is_some() {
        total += 2;
    }

    if fields::resolve(payload, PARCEL_LIST_KEYS).is_some_and(|v| v.is_array()) {
        total += 3;
    }

    if fields::resolve_f64(payload, &["declaredValue"]).is_some() {
        total += 1;
    }
    if fields::resolve_f64(payload, &["brutWeight", "weight"]).is_some() {
        total += 1;
    }
    if fields::resolve_f64(payload, &["volumetricWeight"]).is_some() {
        total += 1;
    }
    if fields::resolve(payload, &["dimensions"]).is_some()
        || (fields::resolve_f64(payload, &["length"]).is_some()
            && fields::resolve_f64(payload, &["width"]).is_some()
            && fields::resolve_f64(payload, &["height"]).is_some())
    {
        total += 1;
    }

    if has_service_flag(payload) {
        total += 1;
    }

    if fields::resolve(payload, TRACE_KEYS).is_some_and(|v| v.is_array()) {
        total += 1;
    }

    total
}

/// The canonical identifier this payload resolves to, if any.
pub fn extract_identifier(payload: &Value) -> Option<String> {
    let raw = fields::resolve_str(payload, AWB_KEYS)?;
    identifier::storage_key(&raw)
}

fn has_service_flag(payload: &Value) -> bool {
    let services = fields::resolve(payload, &["additionalServices"]).unwrap_or(payload);
    for key in ["openPackage", "priority", "saturday", "morning", "insurance"] {
        if let Some(v) = fields::resolve(services, &[key]) {
            if v.as_bool() == Some(true) || v.is_string() || v.is_number() {
                return true;
            }
        }
    }
    false
}

/// Keep every non-blank field of `primary`; fill its blanks from
/// `secondary`. Maps present on both sides repeat the rule one level deep.
///
/// Idempotent: applying twice with the same inputs changes nothing.
pub fn merge_fill_blanks(primary: &Value, secondary: &Value) -> Value {
    match (primary, secondary) {
        (Value::Object(p), Value::Object(s)) => Value::Object(merge_objects(p, s, 0)),
        (p, s) => {
            if is_blank(p) {
                s.clone()
            } else {
                p.clone()
            }
        },
    }
}

fn merge_objects(primary: &Map<String, Value>, secondary: &Map<String, Value>, depth: usize) -> Map<String, Value> {
    let mut out = primary.clone();
    for (key, sec_val) in secondary {
        if is_blank(sec_val) {
            continue;
        }
        match out.get(key) {
            None => {
                out.insert(key.clone(), sec_val.clone());
            },
            Some(cur) if is_blank(cur) => {
                out.insert(key.clone(), sec_val.clone());
            },
            Some(Value::Object(cur_obj)) if depth == 0 => {
                if let Value::Object(sec_obj) = sec_val {
                    let merged = merge_objects(cur_obj, sec_obj, depth + 1);
                    out.insert(key.clone(), Value::Object(merged));
                }
            },
            Some(_) => {},
        }
    }
    out
}

/// Merge two representations of the same shipment and return whichever
/// direction scores higher — order-insensitive with respect to which input
/// was richer.
pub fn best_merged(a: &Value, b: &Value) -> Value {
    let ab = merge_fill_blanks(a, b);
    let ba = merge_fill_blanks(b, a);
    if score(&ba) > score(&ab) {
        ba
    } else {
        ab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rich_payload() -> Value {
        json!({
            "awb": "SAM123456789",
            "recipientLocation": {
                "county": "Cluj",
                "locality": "Cluj-Napoca",
                "addressText": "Str. Memorandumului 28",
                "phoneNumber": "+40700000000"
            },
            "shippingCost": 19.99,
            "contentDescription": "2x carti",
            "parcels": [{"barCode": "SAM123456789001"}],
            "brutWeight": 1.2,
            "shipmentTrace": [{"eventDescription": "Routed"}]
        })
    }

    #[test]
    fn test_rich_outscores_bare() {
        let bare = json!({"awb": "SAM123456789"});
        assert!(score(&rich_payload()) > score(&bare));
        assert_eq!(score(&bare), 2);
    }

    #[test]
    fn test_score_address_breakdown() {
        let base = json!({"recipientLocation": {"dummy": 1}});
        let with_county = json!({"recipientLocation": {"county": "Vrancea"}});
        assert_eq!(score(&base), 1);
        assert_eq!(score(&with_county), 4);
    }

    #[test]
    fn test_zero_cost_not_rewarded() {
        let zero = json!({"shippingCost": 0});
        let paid = json!({"shippingCost": 12.0});
        assert_eq!(score(&zero), 0);
        assert_eq!(score(&paid), 2);
    }

    #[test]
    fn test_nested_cost_found() {
        let nested = json!({"clientOrder": {"payment": {"finalPrice": 30.0}}});
        assert_eq!(score(&nested), 2);
    }

    #[test]
    fn test_merge_never_blanks_primary() {
        let a = json!({"address": "", "cost": 50});
        let b = json!({"address": "Main St 1", "cost": null});
        let merged = merge_fill_blanks(&a, &b);
        assert_eq!(merged, json!({"address": "Main St 1", "cost": 50}));
    }

    #[test]
    fn test_merge_idempotent() {
        let a = json!({"x": 1, "y": "", "loc": {"city": "", "county": "Cluj"}});
        let b = json!({"y": "two", "loc": {"city": "Dej"}, "z": [1]});
        let once = merge_fill_blanks(&a, &b);
        let twice = merge_fill_blanks(&once, &b);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_nested_one_level() {
        let a = json!({"loc": {"city": "", "county": "Cluj"}});
        let b = json!({"loc": {"city": "Dej", "county": "Bihor"}});
        let merged = merge_fill_blanks(&a, &b);
        assert_eq!(merged, json!({"loc": {"city": "Dej", "county": "Cluj"}}));
    }

    #[test]
    fn test_best_merged_order_insensitive() {
        let rich = rich_payload();
        let sparse = json!({"awb": "SAM123456789", "processingStatus": "COMPLETED"});
        let m1 = best_merged(&rich, &sparse);
        let m2 = best_merged(&sparse, &rich);
        assert_eq!(score(&m1), score(&m2));
        assert_eq!(m1.get("processingStatus"), Some(&json!("COMPLETED")));
        assert_eq!(m1.get("shippingCost"), Some(&json!(19.99)));
    }
}
