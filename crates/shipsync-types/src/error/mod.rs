//! Typed error definitions for shipsync.
//!
//! Two layers, matching how errors propagate:
//!
//! - [`GatewayError`] — a single network interaction with the carrier
//!   gateway. These drive the retry/fallback logic in the client.
//! - [`SyncError`] — a synchronization run or a single item inside one.
//!   Per-item errors are counted into run stats and never abort a run;
//!   only credential misconfiguration skips a run entirely.

use thiserror::Error;

/// Errors from a single carrier gateway request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Login itself failed (bad credentials, gateway down).
    #[error("gateway authentication failed: {0}")]
    Auth(String),

    /// A request came back 401. The client re-logs-in and retries exactly
    /// once; this surfaces only when the retry also failed.
    #[error("gateway session expired")]
    AuthExpired,

    /// 404 for an identifier candidate. The caller moves to the next one.
    #[error("shipment not found")]
    NotFound,

    /// 429 persisted past the bounded backoff cap. The item is abandoned
    /// and counted as a fetch error.
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// 405/501 — the endpoint shape is not available for this account.
    /// Stop trying it for the remainder of the run and fall back to the
    /// primary detail endpoint.
    #[error("endpoint not supported (HTTP {status})")]
    UnsupportedEndpoint { status: u16 },

    /// Connect/timeout/5xx/parse failures. Logged and treated as
    /// not-found for the candidate at hand.
    #[error("transient gateway error: {0}")]
    Transient(String),
}

/// Errors from the synchronization engine and persistence layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Payload carries no resolvable shipment identifier; rejected before
    /// any persistence attempt.
    #[error("payload is missing a shipment identifier")]
    MissingIdentifier,

    /// Store write failed for a single item; the batch continues.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Gateway username/password not configured. The entire run is skipped
    /// before any network call.
    #[error("gateway credentials not configured")]
    MisconfiguredCredentials,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::RateLimited { attempts: 4 };
        assert!(err.to_string().contains('4'));

        let err = GatewayError::UnsupportedEndpoint { status: 405 };
        assert!(err.to_string().contains("405"));
    }

    #[test]
    fn test_sync_error_wraps_gateway() {
        let err: SyncError = GatewayError::NotFound.into();
        assert!(matches!(err, SyncError::Gateway(GatewayError::NotFound)));
    }
}
