//! Shipment identifier normalization and lookup-candidate derivation.
//!
//! Scanned barcodes and typed identifiers arrive with whitespace, dashes,
//! mixed case and sometimes a 3-digit parcel-sequence suffix (multi-parcel
//! AWBs are labelled `<core>001`, `<core>002`, ...). Everything here reduces
//! to one canonical uppercase alphanumeric form plus an ordered candidate
//! list to try against the gateway.
//!
//! The suffix heuristics are tuned to the carrier's observed identifier
//! format; they live as named constants so they can be validated against
//! real sample identifiers rather than assumed to generalize.

/// Tokens shorter than this are scanner noise, not identifiers.
pub const MIN_TOKEN_LEN: usize = 6;
/// A normalized identifier must be at least this long to carry a parcel suffix.
pub const SUFFIX_ELIGIBLE_LEN: usize = 13;
/// Length of the parcel-sequence suffix.
pub const PARCEL_SUFFIX_LEN: usize = 3;
/// Minimum remaining length after stripping the suffix.
pub const MIN_CORE_LEN: usize = 8;
/// Hard cap on the candidate list.
pub const MAX_CANDIDATES: usize = 12;

/// Canonicalize a raw scanned/typed string: uppercase, alphanumeric only.
///
/// Idempotent; returns an empty string for blank input.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// The suffix-stripped "core" form, when the normalized identifier looks
/// like a multi-parcel label: long enough, contains a letter, and ends in
/// three digits that are not "000".
pub fn parcel_core(normalized: &str) -> Option<&str> {
    if normalized.len() < SUFFIX_ELIGIBLE_LEN {
        return None;
    }
    if !normalized.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let split = normalized.len() - PARCEL_SUFFIX_LEN;
    let (core, suffix) = normalized.split_at(split);
    if !suffix.chars().all(|c| c.is_ascii_digit()) || suffix == "000" {
        return None;
    }
    if core.len() < MIN_CORE_LEN {
        return None;
    }
    Some(core)
}

/// Canonical storage key for a raw identifier: normalized, with the parcel
/// suffix stripped when present. `None` for input that normalizes to nothing.
pub fn storage_key(raw: &str) -> Option<String> {
    let norm = normalize(raw);
    if norm.is_empty() {
        return None;
    }
    match parcel_core(&norm) {
        Some(core) => Some(core.to_string()),
        None => Some(norm),
    }
}

/// Ordered lookup candidates for a raw identifier.
///
/// Alphanumeric tokens of length >= [`MIN_TOKEN_LEN`] are extracted (full
/// form first in priority), each followed by its suffix-stripped core when
/// applicable, then the fully-normalized whole string. Deduplicated in
/// order, capped at [`MAX_CANDIDATES`]. Empty only for blank input.
pub fn candidates(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    let mut push = |cand: String| {
        if !cand.is_empty() && out.len() < MAX_CANDIDATES && !out.contains(&cand) {
            out.push(cand);
        }
    };

    for token in raw.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.len() < MIN_TOKEN_LEN {
            continue;
        }
        let norm = normalize(token);
        let core = parcel_core(&norm).map(str::to_string);
        push(norm);
        if let Some(core) = core {
            push(core);
        }
    }

    let whole = normalize(raw);
    let whole_core = parcel_core(&whole).map(str::to_string);
    push(whole);
    if let Some(core) = whole_core {
        push(core);
    }

    out
}
