//! List-vs-store change detection.
//!
//! The paginated list fetch is cheap; the per-shipment detail fetch is not.
//! This module diffs the list's lightweight metadata against a snapshot of
//! the local store and produces the minimal set of identifiers worth an
//! expensive detail fetch.
//!
//! Known gap: status / processing-status text equality is a heuristic
//! change signal. A remote update that touches neither field nor the
//! last-event timestamp goes unnoticed until a `full` run.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Lightweight per-identifier metadata from the remote list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteMeta {
    pub last_event: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub processing_status: Option<String>,
}

/// What the store remembers about a shipment, for diffing only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredMeta {
    pub status: Option<String>,
    pub processing_status: Option<String>,
    pub last_event: Option<DateTime<Utc>>,
    /// Whether a full detail payload has ever been stored.
    pub has_detail: bool,
}

/// Identifiers needing a detail re-fetch this run.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Absent from the store snapshot.
    pub new: Vec<String>,
    /// Present but stale.
    pub changed: Vec<String>,
    /// Combined fetch list, capped and ordered newest-remote-event-first.
    pub to_fetch: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_fetch.is_empty()
    }
}

fn text_differs(remote: Option<&str>, stored: Option<&str>) -> bool {
    let Some(r) = remote.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };
    match stored.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(s) => !r.eq_ignore_ascii_case(s),
    }
}

/// Diff remote list metadata against the store snapshot.
///
/// An identifier is new when absent from the snapshot; changed when the
/// store lacks a detail payload (and `include_missing_detail` is set), the
/// remote last-event timestamp is strictly newer, or the status /
/// processing-status text differs case-insensitively. When the result
/// exceeds `limit` it is truncated, newest remote timestamp first with a
/// stable identifier tie-break, so the operationally relevant shipments
/// are refreshed first under load.
pub fn compute_changes(
    remote: &HashMap<String, RemoteMeta>,
    stored: &HashMap<String, StoredMeta>,
    limit: Option<usize>,
    include_missing_detail: bool,
) -> ChangeSet {
    let mut new = Vec::new();
    let mut changed = Vec::new();

    for (awb, meta) in remote {
        let Some(existing) = stored.get(awb) else {
            new.push(awb.clone());
            continue;
        };

        if include_missing_detail && !existing.has_detail {
            changed.push(awb.clone());
            continue;
        }

        if let Some(remote_ts) = meta.last_event {
            if existing.last_event.is_none_or(|stored_ts| remote_ts > stored_ts) {
                changed.push(awb.clone());
                continue;
            }
        }

        if text_differs(meta.status.as_deref(), existing.status.as_deref())
            || text_differs(meta.processing_status.as_deref(), existing.processing_status.as_deref())
        {
            changed.push(awb.clone());
        }
    }

    let mut to_fetch: Vec<String> = new.iter().chain(changed.iter()).cloned().collect();
    // Deterministic order regardless of map iteration.
    to_fetch.sort_by(|a, b| {
        let ta = remote.get(a).and_then(|m| m.last_event);
        let tb = remote.get(b).and_then(|m| m.last_event);
        tb.cmp(&ta).then_with(|| a.cmp(b))
    });
    if let Some(limit) = limit {
        to_fetch.truncate(limit);
    }

    new.sort();
    changed.sort();
    ChangeSet { new, changed, to_fetch }
}
