//! Sync orchestration: the run pipeline and the scheduled loop.
//!
//! A run is list → dedup → detect → upsert list rows → bounded detail
//! fetch → upsert details → stats. Runs are single-flight through the
//! [`SyncCoordinator`]; per-item failures are counted, never fatal. The
//! scheduled loop keeps its cadence from run start, so a slow run delays
//! the next tick instead of stacking runs.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use shipsync_types::models::{
    SyncConfig, SyncMode, SyncStats, SyncStatus, TriggerKind, TriggerRequest, TriggerResponse,
};
use shipsync_types::SyncError;

use crate::coordinator::SyncCoordinator;
use crate::detect::{self, RemoteMeta};
use crate::extract;
use crate::fields;
use crate::gateway::ShipmentGateway;
use crate::score;
use crate::store::ShipmentStore;
use crate::upsert;

/// Hard ceiling on list pagination, against a gateway that never stops
/// returning full pages.
const MAX_LIST_PAGES: u32 = 200;

pub struct SyncEngine {
    gateway: Arc<dyn ShipmentGateway>,
    store: Arc<dyn ShipmentStore>,
    coordinator: Arc<SyncCoordinator>,
    config: SyncConfig,
    credentials_ok: bool,
}

impl SyncEngine {
    pub fn new(
        gateway: Arc<dyn ShipmentGateway>,
        store: Arc<dyn ShipmentStore>,
        config: SyncConfig,
        credentials_ok: bool,
    ) -> Self {
        Self {
            gateway,
            store,
            coordinator: Arc::new(SyncCoordinator::new()),
            config,
            credentials_ok,
        }
    }

    pub fn store(&self) -> &Arc<dyn ShipmentStore> {
        &self.store
    }

    pub async fn status(&self) -> SyncStatus {
        self.coordinator.snapshot().await
    }

    /// Manual trigger. Claims the single-flight slot or reports the run
    /// already in flight; with `wait` the caller blocks until the slot
    /// frees either way.
    pub async fn trigger(self: Arc<Self>, req: TriggerRequest) -> TriggerResponse {
        if !self.coordinator.try_start(TriggerKind::Manual).await {
            if req.wait {
                self.coordinator.wait_idle().await;
            }
            return TriggerResponse { started: false, status: self.coordinator.snapshot().await };
        }

        if req.wait {
            let result = self.run_claimed(TriggerKind::Manual, req.mode, req.detail_limit).await;
            self.coordinator.finish(result).await;
        } else {
            let engine = self.clone();
            tokio::spawn(async move {
                let result =
                    engine.run_claimed(TriggerKind::Manual, req.mode, req.detail_limit).await;
                engine.coordinator.finish(result).await;
            });
        }

        TriggerResponse { started: true, status: self.coordinator.snapshot().await }
    }

    /// Scheduled loop. Honors the enable flag, startup jitter and the
    /// `run_immediately` setting; exits cooperatively between runs when the
    /// shutdown channel flips.
    pub async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            tracing::info!("[Sync] scheduled sync disabled");
            return;
        }

        let interval = Duration::from_secs(self.config.interval_secs);

        let jitter = if self.config.startup_jitter_secs > 0 {
            use rand::Rng;
            rand::thread_rng().gen_range(0..=self.config.startup_jitter_secs)
        } else {
            0
        };
        let mut initial_delay = Duration::from_secs(jitter);
        if !self.config.run_immediately {
            initial_delay += interval;
        }
        tracing::info!(
            "[Sync] scheduled loop starting, first run in {}s, interval {}s",
            initial_delay.as_secs(),
            interval.as_secs()
        );
        if self.sleep_or_shutdown(initial_delay, &mut shutdown).await {
            return;
        }

        loop {
            let run_started = Instant::now();
            if self.coordinator.try_start(TriggerKind::Scheduled).await {
                let result = self.run_claimed(TriggerKind::Scheduled, SyncMode::Quick, None).await;
                self.coordinator.finish(result).await;
            } else {
                tracing::debug!("[Sync] run already in flight, skipping scheduled tick");
            }

            let wait = interval.saturating_sub(run_started.elapsed());
            if self.sleep_or_shutdown(wait, &mut shutdown).await {
                return;
            }
        }
    }

    /// True means shut down.
    async fn sleep_or_shutdown(
        &self,
        delay: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("[Sync] scheduled loop stopping");
                    true
                } else {
                    false
                }
            },
        }
    }

    /// The run pipeline. Caller must hold the coordinator slot.
    async fn run_claimed(
        &self,
        trigger: TriggerKind,
        mode: SyncMode,
        detail_limit: Option<usize>,
    ) -> Result<SyncStats, SyncError> {
        let started_at = Utc::now();
        let mut stats = SyncStats::empty(trigger, mode, started_at);

        if !self.credentials_ok {
            tracing::warn!("[Sync] gateway credentials not configured, skipping run");
            return Ok(stats);
        }

        self.gateway.begin_run();

        let items = self.fetch_list(&mut stats).await?;
        let remote = dedup_list(items);
        stats.unique_identifiers = remote.len();

        let stored = self.store.meta_snapshot().await?;
        let cap = match mode {
            SyncMode::Backfill => None,
            _ => detail_limit.or(self.config.max_details_per_run),
        };
        let include_missing =
            self.config.include_missing_detail || mode.include_missing_detail();
        let meta: HashMap<String, RemoteMeta> =
            remote.iter().map(|(awb, entry)| (awb.clone(), entry.meta.clone())).collect();
        let changes = detect::compute_changes(&meta, &stored, cap, include_missing);
        stats.new_identifiers = changes.new.len();
        stats.changed_identifiers = changes.changed.len();

        // List rows always land, changed or not: they refresh status text
        // and timestamps even when no detail fetch is due.
        for entry in remote.values() {
            match upsert::apply_payload(&self.store, &entry.payload, upsert::PayloadKind::List).await
            {
                Ok(_) => stats.upserted_list += 1,
                Err(err) => {
                    stats.upsert_errors += 1;
                    tracing::warn!("[Sync] list upsert failed: {err}");
                },
            }
        }

        self.fetch_details(&changes.to_fetch, &mut stats).await;

        stats.finished_at = Utc::now();
        tracing::info!(
            "[Sync] run finished: {} list items, {} unique, {} new, {} changed, \
             {} details fetched, {} fetch errors, {} upsert errors, {:.1}s",
            stats.list_items,
            stats.unique_identifiers,
            stats.new_identifiers,
            stats.changed_identifiers,
            stats.fetched_details,
            stats.fetch_errors,
            stats.upsert_errors,
            stats.duration_secs()
        );
        Ok(stats)
    }

    /// Sequential pagination. A failure on the first page aborts the run;
    /// a later failure keeps what was collected.
    async fn fetch_list(&self, stats: &mut SyncStats) -> Result<Vec<Value>, SyncError> {
        let mut items = Vec::new();
        for page in 0..MAX_LIST_PAGES {
            let batch = match self.gateway.list_page(page, self.config.page_size).await {
                Ok(batch) => batch,
                Err(err) if page == 0 => return Err(err.into()),
                Err(err) => {
                    tracing::warn!("[Sync] list page {page} failed, continuing with partial list: {err}");
                    break;
                },
            };
            let full_page = batch.len() as u32 >= self.config.page_size;
            items.extend(batch);
            if !full_page {
                break;
            }
        }
        stats.list_items = items.len();
        Ok(items)
    }

    /// Detail fetches, bounded by a semaphore; each item fails alone.
    async fn fetch_details(&self, to_fetch: &[String], stats: &mut SyncStats) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut join = JoinSet::new();
        for awb in to_fetch {
            let awb = awb.clone();
            let gateway = self.gateway.clone();
            let semaphore = semaphore.clone();
            let good_enough = self.config.good_enough_score;
            join.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = gateway.resolve_and_fetch(&awb, good_enough).await;
                (awb, result)
            });
        }

        while let Some(joined) = join.join_next().await {
            let (awb, result) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    stats.fetch_errors += 1;
                    tracing::warn!("[Sync] detail fetch task aborted: {err}");
                    continue;
                },
            };
            match result {
                Ok(Some(payload)) => {
                    stats.fetched_details += 1;
                    match upsert::apply_payload(&self.store, &payload, upsert::PayloadKind::Detail)
                        .await
                    {
                        Ok(_) => stats.upserted_details += 1,
                        Err(err) => {
                            stats.upsert_errors += 1;
                            tracing::warn!("[Sync] detail upsert failed for {awb}: {err}");
                        },
                    }
                },
                Ok(None) => {
                    tracing::debug!("[Sync] no detail resolved for {awb}");
                },
                Err(err) => {
                    stats.fetch_errors += 1;
                    tracing::warn!("[Sync] detail fetch failed for {awb}: {err}");
                },
            }
        }
    }
}

struct RemoteEntry {
    payload: Value,
    meta: RemoteMeta,
}

const LIST_STATUS_KEYS: &[&str] =
    &["clientShipmentStatusDescription", "status", "currentStatus"];
const LIST_EVENT_DATE_KEYS: &[&str] = &["awbStatusDate", "statusDate", "lastStatusDate"];

fn remote_meta(payload: &Value) -> RemoteMeta {
    RemoteMeta {
        last_event: fields::resolve(payload, LIST_EVENT_DATE_KEYS).and_then(extract::parse_dt),
        status: fields::resolve_str(payload, LIST_STATUS_KEYS),
        processing_status: fields::resolve_str(payload, &["processingStatus"]),
    }
}

/// Collapse list rows to one entry per canonical identifier. Multi-parcel
/// shipments appear once per parcel; their payloads merge blank-safe and
/// the freshest metadata wins.
fn dedup_list(items: Vec<Value>) -> HashMap<String, RemoteEntry> {
    let mut out: HashMap<String, RemoteEntry> = HashMap::new();
    for item in items {
        let Some(awb) = score::extract_identifier(&item) else {
            tracing::debug!("[Sync] list row without resolvable identifier, skipped");
            continue;
        };
        let meta = remote_meta(&item);
        match out.entry(awb) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(RemoteEntry { payload: item, meta });
            },
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                entry.payload = score::best_merged(&entry.payload, &item);
                if meta.last_event > entry.meta.last_event {
                    entry.meta = meta;
                }
            },
        }
    }
    out
}
