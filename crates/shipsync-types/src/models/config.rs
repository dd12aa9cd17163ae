use serde::{Deserialize, Serialize};

/// Bounded exponential backoff parameters for rate-limited requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts before an item is abandoned (first try included).
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 4, base_delay_ms: 500, max_delay_ms: 8_000 }
    }
}

/// Carrier gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Primary API host (login, detail, resolve endpoints).
    pub base_url: String,
    /// Stats subdomain serving the paginated shipment list.
    pub stats_base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            stats_base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Both credential halves present. A run started without them is
    /// skipped before any network call.
    pub fn has_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.trim().is_empty()
    }
}

/// Synchronization engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether the scheduled loop runs at all. Manual triggers always work.
    pub enabled: bool,
    pub interval_secs: u64,
    pub page_size: u32,
    /// Width of the bounded detail-fetch pool.
    pub concurrency: usize,
    /// Per-run cap on detail fetches; `None` = unlimited.
    pub max_details_per_run: Option<usize>,
    /// Treat records without a stored detail payload as changed.
    pub include_missing_detail: bool,
    /// Delay before the very first scheduled run, to avoid thundering-herd
    /// restarts across processes.
    pub startup_jitter_secs: u64,
    /// When false the first scheduled run waits one full interval.
    pub run_immediately: bool,
    /// Completeness score at which candidate resolution short-circuits.
    pub good_enough_score: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 3_600,
            page_size: 100,
            concurrency: 6,
            max_details_per_run: None,
            include_missing_detail: true,
            startup_jitter_secs: 30,
            run_immediately: true,
            good_enough_score: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_check() {
        let mut cfg = GatewayConfig::default();
        assert!(!cfg.has_credentials());
        cfg.username = "ops".into();
        assert!(!cfg.has_credentials());
        cfg.password = "secret".into();
        assert!(cfg.has_credentials());
    }
}
