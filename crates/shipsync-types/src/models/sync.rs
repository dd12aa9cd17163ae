use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What started a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Scheduled,
    Manual,
}

/// How wide a run casts its net.
///
/// `Quick` trusts the change heuristics. `Full` additionally re-fetches
/// records that have never stored a detail payload. `Backfill` is `Full`
/// with the per-run detail cap lifted — a one-off catch-up run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Quick,
    Full,
    Backfill,
}

impl SyncMode {
    pub fn include_missing_detail(self) -> bool {
        matches!(self, SyncMode::Full | SyncMode::Backfill)
    }
}

/// Aggregate counters for one sync run. Retained only as "last run".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub trigger: TriggerKind,
    pub mode: SyncMode,

    pub list_items: usize,
    pub unique_identifiers: usize,
    pub new_identifiers: usize,
    pub changed_identifiers: usize,
    pub fetched_details: usize,
    pub fetch_errors: usize,
    pub upserted_list: usize,
    pub upserted_details: usize,
    pub upsert_errors: usize,
}

impl SyncStats {
    /// All-zero stats object; also what a credential-skipped run reports.
    pub fn empty(trigger: TriggerKind, mode: SyncMode, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            trigger,
            mode,
            list_items: 0,
            unique_identifiers: 0,
            new_identifiers: 0,
            changed_identifiers: 0,
            fetched_details: 0,
            fetch_errors: 0,
            upserted_list: 0,
            upserted_details: 0,
            upsert_errors: 0,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Snapshot of the coordinator state, served by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncStatus {
    pub running: bool,
    pub running_since: Option<DateTime<Utc>>,
    pub last_trigger: Option<TriggerKind>,
    /// Message of the most recent failed run, never a backtrace.
    pub last_error: Option<String>,
    pub last_stats: Option<SyncStats>,
}

/// Manual trigger request.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct TriggerRequest {
    #[serde(default)]
    pub wait: bool,
    #[serde(default)]
    pub mode: SyncMode,
    /// Overrides the configured per-run detail-fetch cap.
    #[serde(default)]
    pub detail_limit: Option<usize>,
}

/// Manual trigger outcome.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    /// False when a run was already in flight and this call did not start one.
    pub started: bool,
    pub status: SyncStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_widens_change_set() {
        assert!(!SyncMode::Quick.include_missing_detail());
        assert!(SyncMode::Full.include_missing_detail());
        assert!(SyncMode::Backfill.include_missing_detail());
    }

    #[test]
    fn test_trigger_request_defaults() {
        let req: TriggerRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.wait);
        assert_eq!(req.mode, SyncMode::Quick);
        assert!(req.detail_limit.is_none());
    }

    #[test]
    fn test_mode_serde_lowercase() {
        assert_eq!(serde_json::to_string(&SyncMode::Backfill).unwrap(), "\"backfill\"");
        let m: SyncMode = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(m, SyncMode::Full);
    }
}
