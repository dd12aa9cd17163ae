//! Generic field resolution over loosely-schematized gateway payloads.
//!
//! The gateway spells the same logical field half a dozen ways depending on
//! endpoint and account (`shippingCost`, `carrierShippingCost`,
//! `shipping_cost`, ...). Rather than ad hoc per-field lookup chains, every
//! extraction goes through one of these resolvers: an ordered candidate-key
//! lookup, plus a bounded-depth worklist walker for values that hide inside
//! nested objects. `serde_json::Value` trees are owned and acyclic, so the
//! walker needs a depth cap but no visited set.

use serde_json::Value;
use std::collections::VecDeque;

/// Depth cap for nested searches. Carrier payload shapes are not
/// contractually bounded, but nothing useful has been observed deeper.
pub const MAX_SEARCH_DEPTH: usize = 6;

/// Blank means null, empty string, or empty collection/map.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Key comparison ignoring case, underscores, dashes and spaces, so one
/// candidate list covers camelCase and snake_case spellings.
fn key_matches(key: &str, candidate: &str) -> bool {
    let mut a = key.chars().filter(|c| c.is_ascii_alphanumeric()).map(|c| c.to_ascii_lowercase());
    let mut b =
        candidate.chars().filter(|c| c.is_ascii_alphanumeric()).map(|c| c.to_ascii_lowercase());
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x == y => {},
            _ => return false,
        }
    }
}

/// First non-blank value under any of the candidate keys, in order.
pub fn resolve<'a>(doc: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = doc.as_object()?;
    for key in keys {
        for (k, v) in obj {
            if key_matches(k, key) && !is_blank(v) {
                return Some(v);
            }
        }
    }
    None
}

/// [`resolve`] narrowed to a trimmed, non-empty string.
pub fn resolve_str(doc: &Value, keys: &[&str]) -> Option<String> {
    let v = resolve(doc, keys)?;
    match v {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        },
        // Numeric codes are rare but printable.
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// [`resolve`] narrowed to a number (accepts numeric strings).
pub fn resolve_f64(doc: &Value, keys: &[&str]) -> Option<f64> {
    as_f64(resolve(doc, keys)?)
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Bounded-depth search: first number under any candidate key, anywhere in
/// the tree up to `max_depth` levels down. Explicit queue, breadth-first,
/// so shallow matches win over deep ones.
pub fn find_f64_deep(doc: &Value, keys: &[&str], max_depth: usize) -> Option<f64> {
    let max_depth = max_depth.min(MAX_SEARCH_DEPTH);
    let mut worklist: VecDeque<(&Value, usize)> = VecDeque::from([(doc, 0)]);
    while let Some((current, depth)) = worklist.pop_front() {
        match current {
            Value::Object(obj) => {
                for (k, v) in obj {
                    if keys.iter().any(|cand| key_matches(k, cand)) {
                        if let Some(f) = as_f64(v) {
                            return Some(f);
                        }
                    }
                    if depth < max_depth && (v.is_object() || v.is_array()) {
                        worklist.push_back((v, depth + 1));
                    }
                }
            },
            Value::Array(arr) => {
                for v in arr {
                    if depth < max_depth && (v.is_object() || v.is_array()) {
                        worklist.push_back((v, depth + 1));
                    }
                }
            },
            _ => {},
        }
    }
    None
}

/// Bounded-depth search for a non-empty string, same traversal as
/// [`find_f64_deep`].
pub fn find_str_deep(doc: &Value, keys: &[&str], max_depth: usize) -> Option<String> {
    let max_depth = max_depth.min(MAX_SEARCH_DEPTH);
    let mut worklist: VecDeque<(&Value, usize)> = VecDeque::from([(doc, 0)]);
    while let Some((current, depth)) = worklist.pop_front() {
        match current {
            Value::Object(obj) => {
                for (k, v) in obj {
                    if keys.iter().any(|cand| key_matches(k, cand)) {
                        if let Value::String(s) = v {
                            let t = s.trim();
                            if !t.is_empty() {
                                return Some(t.to_string());
                            }
                        }
                    }
                    if depth < max_depth && (v.is_object() || v.is_array()) {
                        worklist.push_back((v, depth + 1));
                    }
                }
            },
            Value::Array(arr) => {
                for v in arr {
                    if depth < max_depth && (v.is_object() || v.is_array()) {
                        worklist.push_back((v, depth + 1));
                    }
                }
            },
            _ => {},
        }
    }
    None
}

/// Place fields arrive either as strings or as objects like
/// `{"id": "...", "name": "Vrancea"}`. Reduce to a display-safe string.
pub fn place_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        },
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => resolve_str(
            value,
            &[
                "name",
                "label",
                "value",
                "text",
                "title",
                "countyName",
                "localityName",
                "cityName",
                "regionName",
            ],
        )
        .or_else(|| {
            for key in ["county", "locality", "city", "region"] {
                if let Some(inner) = resolve(value, &[key]) {
                    if let Some(s) = place_name(inner) {
                        return Some(s);
                    }
                }
            }
            None
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blankness() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!("   ")));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!("x")));
    }

    #[test]
    fn test_resolve_order_and_aliases() {
        let doc = json!({"shipping_cost": 12.5, "carrierShippingCost": 99.0});
        // First candidate key wins even when later aliases also match.
        assert_eq!(resolve_f64(&doc, &["carrierShippingCost", "shippingCost"]), Some(99.0));
        // snake_case matches the camelCase candidate.
        assert_eq!(resolve_f64(&doc, &["shippingCost"]), Some(12.5));
    }

    #[test]
    fn test_resolve_skips_blanks() {
        let doc = json!({"status": "", "currentStatus": "Delivered"});
        assert_eq!(resolve_str(&doc, &["status", "currentStatus"]), Some("Delivered".into()));
    }

    #[test]
    fn test_deep_search_depth_cap() {
        let doc = json!({"a": {"b": {"c": {"finalCost": 7.0}}}});
        assert_eq!(find_f64_deep(&doc, &["finalCost"], 3), Some(7.0));
        assert_eq!(find_f64_deep(&doc, &["finalCost"], 2), None);
    }

    #[test]
    fn test_deep_search_prefers_shallow_match() {
        // A deep match inside an earlier sibling must not beat a shallower
        // one later in the document.
        let doc = json!({
            "parcels": [{"inner": {"finalCost": 99.0}}],
            "summary": {"finalCost": 7.0}
        });
        assert_eq!(find_f64_deep(&doc, &["finalCost"], 4), Some(7.0));
    }

    #[test]
    fn test_deep_search_through_arrays() {
        let doc = json!({"parcels": [{"weightPriceShipment": "3.20"}]});
        assert_eq!(find_f64_deep(&doc, &["weightPriceShipment"], 3), Some(3.2));
    }

    #[test]
    fn test_place_name_shapes() {
        assert_eq!(place_name(&json!("Vrancea")), Some("Vrancea".into()));
        assert_eq!(place_name(&json!({"id": 7, "name": "Vrancea"})), Some("Vrancea".into()));
        assert_eq!(place_name(&json!({"county": {"name": "Cluj"}})), Some("Cluj".into()));
        assert_eq!(place_name(&json!(null)), None);
    }
}
