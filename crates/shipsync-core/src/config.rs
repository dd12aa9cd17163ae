//! Environment-driven configuration (`SHIPSYNC_*`).
//!
//! Every knob has a safe default and a clamp; a typo in an env var degrades
//! to the default rather than failing startup. Missing credentials are not
//! a startup error either: runs are skipped with a warning until they
//! appear, so the read API stays available regardless.

use std::str::FromStr;

use shipsync_types::models::{GatewayConfig, SyncConfig};

pub const MIN_INTERVAL_SECS: u64 = 300;
pub const PAGE_SIZE_RANGE: (u32, u32) = (10, 500);
pub const CONCURRENCY_RANGE: (usize, usize) = (1, 30);
pub const MAX_JITTER_SECS: u64 = 600;

const DEFAULT_PORT: u16 = 8620;

/// Everything the process reads from its environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub sync: SyncConfig,
    /// SQLite mirror path; `None` keeps the mirror in memory.
    pub db_path: Option<std::path::PathBuf>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// The actual parser, injectable for tests.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };

        fn num<T: FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.parse().ok())
        }
        fn flag(value: Option<String>, default: bool) -> bool {
            match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("1" | "true" | "yes" | "on") => true,
                Some("0" | "false" | "no" | "off") => false,
                _ => default,
            }
        }
        fn strip_slash(url: String) -> String {
            url.trim_end_matches('/').to_string()
        }

        let gateway_defaults = GatewayConfig::default();
        let sync_defaults = SyncConfig::default();

        let mut gateway = GatewayConfig {
            base_url: get("SHIPSYNC_GATEWAY_BASE_URL").map(strip_slash).unwrap_or_default(),
            stats_base_url: get("SHIPSYNC_GATEWAY_STATS_URL").map(strip_slash).unwrap_or_default(),
            username: get("SHIPSYNC_GATEWAY_USERNAME").unwrap_or_default(),
            password: get("SHIPSYNC_GATEWAY_PASSWORD").unwrap_or_default(),
            timeout_secs: num(get("SHIPSYNC_HTTP_TIMEOUT_SECS"))
                .unwrap_or(gateway_defaults.timeout_secs),
            retry: gateway_defaults.retry,
        };
        // The list endpoint lives on a stats subdomain that smaller
        // deployments fold into the primary host.
        if gateway.stats_base_url.is_empty() {
            gateway.stats_base_url = gateway.base_url.clone();
        }
        gateway.timeout_secs = gateway.timeout_secs.clamp(5, 300);

        let sync = SyncConfig {
            enabled: flag(get("SHIPSYNC_AUTO_SYNC"), sync_defaults.enabled),
            interval_secs: num(get("SHIPSYNC_SYNC_INTERVAL_SECS"))
                .unwrap_or(sync_defaults.interval_secs)
                .max(MIN_INTERVAL_SECS),
            page_size: num(get("SHIPSYNC_PAGE_SIZE"))
                .unwrap_or(sync_defaults.page_size)
                .clamp(PAGE_SIZE_RANGE.0, PAGE_SIZE_RANGE.1),
            concurrency: num(get("SHIPSYNC_CONCURRENCY"))
                .unwrap_or(sync_defaults.concurrency)
                .clamp(CONCURRENCY_RANGE.0, CONCURRENCY_RANGE.1),
            max_details_per_run: num(get("SHIPSYNC_MAX_DETAILS_PER_RUN")),
            include_missing_detail: flag(
                get("SHIPSYNC_INCLUDE_MISSING_DETAIL"),
                sync_defaults.include_missing_detail,
            ),
            startup_jitter_secs: num(get("SHIPSYNC_STARTUP_JITTER_SECS"))
                .unwrap_or(sync_defaults.startup_jitter_secs)
                .min(MAX_JITTER_SECS),
            run_immediately: flag(
                get("SHIPSYNC_RUN_IMMEDIATELY"),
                sync_defaults.run_immediately,
            ),
            good_enough_score: num(get("SHIPSYNC_GOOD_ENOUGH_SCORE"))
                .unwrap_or(sync_defaults.good_enough_score),
        };

        AppConfig {
            gateway,
            sync,
            db_path: get("SHIPSYNC_DB_PATH").map(Into::into),
            port: num(get("SHIPSYNC_PORT")).unwrap_or(DEFAULT_PORT),
        }
    }
}
