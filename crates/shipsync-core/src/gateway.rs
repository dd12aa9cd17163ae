//! Authenticated HTTP client for the carrier gateway.
//!
//! The gateway is rate-limited, occasionally drops authentication, and runs
//! two API generations side by side (the resolve-by-anything endpoint is
//! missing on older deployments). The client hides all of that: a cached
//! bearer token with one transparent re-login on 401, bounded exponential
//! backoff on 429, a legacy login fallback, and per-run degradation to the
//! plain detail endpoint when resolve turns out unsupported.
//!
//! The orchestrator only sees the [`ShipmentGateway`] trait.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use shipsync_types::models::GatewayConfig;
use shipsync_types::GatewayError;

use crate::fields;
use crate::identifier;
use crate::score;

const LOGIN_PATH: &str = "/api/v3/users:login";
const LEGACY_LOGIN_PATH: &str = "/unauthenticated/login";
const LIST_PATH: &str = "/api/v3/shipments";
const DETAIL_PATH: &str = "/api/v1/clients/shipments/byawb";
const RESOLVE_PATH: &str = "/api/v1/clients/shipments/byawborclientorderid";

/// The seam between the orchestrator and the outside world.
#[async_trait]
pub trait ShipmentGateway: Send + Sync {
    /// Reset per-run capability state. Called once at the start of each run.
    fn begin_run(&self);

    /// One page of the lightweight shipment list.
    async fn list_page(&self, page: u32, size: u32) -> Result<Vec<Value>, GatewayError>;

    /// Try every lookup candidate for `raw` and return the richest merged
    /// payload found, short-circuiting once `good_enough` is reached.
    /// `Ok(None)` when no candidate resolved.
    async fn resolve_and_fetch(
        &self,
        raw: &str,
        good_enough: i32,
    ) -> Result<Option<Value>, GatewayError>;
}

pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
    token: RwLock<Option<String>>,
    /// Cleared for the rest of a run when the resolve endpoint answers
    /// 405/501; [`ShipmentGateway::begin_run`] re-arms it.
    resolve_supported: AtomicBool,
}

fn transient(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Transient(err.to_string())
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(transient)?;
        Ok(Self { client, config, token: RwLock::new(None), resolve_supported: AtomicBool::new(true) })
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let retry = &self.config.retry;
        let exp = retry.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(exp.min(retry.max_delay_ms))
    }

    /// Log in and cache the token. Falls back to the legacy login path when
    /// the deployment predates the v3 auth endpoint.
    async fn login(&self) -> Result<String, GatewayError> {
        let body = json!({ "name": self.config.username, "password": self.config.password });

        let primary = format!("{}{}", self.config.base_url, LOGIN_PATH);
        let mut resp =
            self.client.post(&primary).json(&body).send().await.map_err(transient)?;

        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED) {
            let legacy = format!("{}{}", self.config.base_url, LEGACY_LOGIN_PATH);
            tracing::debug!("[Gateway] primary login endpoint missing, trying legacy path");
            resp = self.client.post(&legacy).json(&body).send().await.map_err(transient)?;
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Auth(format!("login rejected with status {status}")));
        }

        let payload: Value = resp.json().await.map_err(transient)?;
        let token = fields::resolve_str(&payload, &["token", "accessToken", "jwt"])
            .ok_or_else(|| GatewayError::Auth("login response carried no token".to_string()))?;

        *self.token.write().await = Some(token.clone());
        tracing::info!("[Gateway] authenticated");
        Ok(token)
    }

    async fn bearer(&self) -> Result<String, GatewayError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await
    }

    /// Authorized GET with the full failure policy: one re-login on 401,
    /// bounded backoff on 429, typed errors for everything else.
    async fn get_json(&self, url: &str) -> Result<Value, GatewayError> {
        let mut reauthed = false;
        let mut rate_attempts: u32 = 0;

        loop {
            let token = self.bearer().await?;
            let resp =
                self.client.get(url).bearer_auth(&token).send().await.map_err(transient)?;
            let status = resp.status();

            if status.is_success() {
                return resp.json().await.map_err(transient);
            }

            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if !reauthed => {
                    reauthed = true;
                    *self.token.write().await = None;
                    tracing::debug!("[Gateway] token rejected, re-authenticating once");
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(GatewayError::AuthExpired);
                },
                StatusCode::NOT_FOUND => return Err(GatewayError::NotFound),
                StatusCode::TOO_MANY_REQUESTS => {
                    rate_attempts += 1;
                    if rate_attempts >= self.config.retry.max_attempts {
                        return Err(GatewayError::RateLimited { attempts: rate_attempts });
                    }
                    let delay = self.backoff_delay(rate_attempts - 1);
                    tracing::warn!(
                        "[Gateway] rate limited (attempt {rate_attempts}), backing off {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                },
                StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
                    return Err(GatewayError::UnsupportedEndpoint { status: status.as_u16() });
                },
                other => {
                    return Err(GatewayError::Transient(format!("gateway returned {other}")));
                },
            }
        }
    }

    /// Detail payload by canonical identifier. The gateway answers with a
    /// single object or a one-element array; 404 means absent.
    pub async fn fetch_detail(&self, awb: &str) -> Result<Option<Value>, GatewayError> {
        let url = format!("{}{}/{}", self.config.base_url, DETAIL_PATH, awb);
        match self.get_json(&url).await {
            Ok(payload) => Ok(unwrap_single(payload)),
            Err(GatewayError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn resolve_candidate(&self, cand: &str) -> Result<Option<Value>, GatewayError> {
        let url = format!("{}{}/{}", self.config.base_url, RESOLVE_PATH, cand);
        match self.get_json(&url).await {
            Ok(payload) => Ok(unwrap_single(payload)),
            Err(GatewayError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Candidate-level lenient detail lookup: absence and transient faults
    /// both mean "try the next candidate".
    async fn lenient_detail(&self, cand: &str) -> Result<Option<Value>, GatewayError> {
        match self.fetch_detail(cand).await {
            Ok(v) => Ok(v),
            Err(GatewayError::Transient(msg)) => {
                tracing::warn!("[Gateway] detail lookup failed for one candidate: {msg}");
                Ok(None)
            },
            Err(err) => Err(err),
        }
    }
}

/// Some endpoints wrap a single shipment in a one-element array.
fn unwrap_single(payload: Value) -> Option<Value> {
    match payload {
        Value::Array(mut items) => {
            if items.is_empty() {
                None
            } else {
                Some(items.swap_remove(0))
            }
        },
        Value::Null => None,
        other => Some(other),
    }
}

/// The list endpoint returns either a bare array or `{items: [...]}`.
fn unwrap_list(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("items").or_else(|| obj.remove("content")) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl ShipmentGateway for HttpGateway {
    fn begin_run(&self) {
        self.resolve_supported.store(true, Ordering::Relaxed);
    }

    async fn list_page(&self, page: u32, size: u32) -> Result<Vec<Value>, GatewayError> {
        let url =
            format!("{}{}?page={}&size={}", self.config.stats_base_url, LIST_PATH, page, size);
        Ok(unwrap_list(self.get_json(&url).await?))
    }

    async fn resolve_and_fetch(
        &self,
        raw: &str,
        good_enough: i32,
    ) -> Result<Option<Value>, GatewayError> {
        let mut best: Option<Value> = None;
        let mut detailed: HashSet<String> = HashSet::new();

        for cand in identifier::candidates(raw) {
            let payload = if self.resolve_supported.load(Ordering::Relaxed) {
                match self.resolve_candidate(&cand).await {
                    Ok(v) => v,
                    Err(GatewayError::UnsupportedEndpoint { status }) => {
                        self.resolve_supported.store(false, Ordering::Relaxed);
                        tracing::warn!(
                            "[Gateway] resolve endpoint unsupported (status {status}), \
                             using detail lookups for the rest of this run"
                        );
                        self.lenient_detail(&cand).await?
                    },
                    Err(GatewayError::Transient(msg)) => {
                        tracing::warn!("[Gateway] resolve failed for one candidate: {msg}");
                        None
                    },
                    Err(err) => return Err(err),
                }
            } else {
                self.lenient_detail(&cand).await?
            };

            let Some(mut payload) = payload else { continue };

            // A resolve hit may be shallow; chase the canonical identifier
            // through the detail endpoint once per identifier.
            if let Some(id) = score::extract_identifier(&payload) {
                if id != cand && detailed.insert(id.clone()) {
                    if let Some(detail) = self.lenient_detail(&id).await? {
                        payload = score::best_merged(&payload, &detail);
                    }
                }
            }

            best = Some(match best {
                None => payload,
                Some(prev) => score::best_merged(&prev, &payload),
            });

            if best.as_ref().is_some_and(|b| score::score(b) >= good_enough) {
                break;
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipsync_types::models::RetryConfig;
    use wiremock::matchers::{body_json_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> GatewayConfig {
        GatewayConfig {
            base_url: server.uri(),
            stats_base_url: server.uri(),
            username: "ops".to_string(),
            password: "secret".to_string(),
            timeout_secs: 5,
            retry: RetryConfig { max_attempts: 3, base_delay_ms: 1, max_delay_ms: 4 },
        }
    }

    async fn mount_login(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": token
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_sends_credentials_and_caches_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json_string(r#"{"name":"ops","password":"secret"}"#))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "t1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LIST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        gw.list_page(0, 10).await.unwrap();
        // Second call reuses the cached token; the login mock expects one hit.
        gw.list_page(1, 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_legacy_login_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(LEGACY_LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "legacy"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        assert_eq!(gw.login().await.unwrap(), "legacy");
    }

    #[tokio::test]
    async fn test_login_rejection_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        assert!(matches!(gw.login().await.unwrap_err(), GatewayError::Auth(_)));
    }

    #[tokio::test]
    async fn test_401_triggers_exactly_one_relogin() {
        let server = MockServer::start().await;
        mount_login(&server, "fresh").await;
        // Stale token is rejected once; the fresh token succeeds.
        Mock::given(method("GET"))
            .and(path(format!("{DETAIL_PATH}/AWB1234567890")))
            .and(wiremock::matchers::header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{DETAIL_PATH}/AWB1234567890")))
            .and(wiremock::matchers::header("authorization", "Bearer fresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"awb": "AWB1234567890"})),
            )
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        *gw.token.write().await = Some("stale".to_string());

        let detail = gw.fetch_detail("AWB1234567890").await.unwrap().unwrap();
        assert_eq!(detail["awb"], "AWB1234567890");
    }

    #[tokio::test]
    async fn test_persistent_401_is_auth_expired() {
        let server = MockServer::start().await;
        mount_login(&server, "t1").await;
        Mock::given(method("GET"))
            .and(path(format!("{DETAIL_PATH}/AWB1234567890")))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        let err = gw.fetch_detail("AWB1234567890").await.unwrap_err();
        assert_eq!(err, GatewayError::AuthExpired);
    }

    #[tokio::test]
    async fn test_429_backoff_gives_up_bounded() {
        let server = MockServer::start().await;
        mount_login(&server, "t1").await;
        Mock::given(method("GET"))
            .and(path(LIST_PATH))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        let err = gw.list_page(0, 10).await.unwrap_err();
        assert_eq!(err, GatewayError::RateLimited { attempts: 3 });
    }

    #[tokio::test]
    async fn test_list_page_accepts_both_shapes() {
        let server = MockServer::start().await;
        mount_login(&server, "t1").await;
        Mock::given(method("GET"))
            .and(path(LIST_PATH))
            .and(query_param("page", "0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"awb": "A1"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LIST_PATH))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"awb": "A2"}, {"awb": "A3"}]
            })))
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        assert_eq!(gw.list_page(0, 50).await.unwrap().len(), 1);
        assert_eq!(gw.list_page(1, 50).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_detail_404_is_absent_not_error() {
        let server = MockServer::start().await;
        mount_login(&server, "t1").await;
        Mock::given(method("GET"))
            .and(path(format!("{DETAIL_PATH}/MISSING123")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        assert_eq!(gw.fetch_detail("MISSING123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_detail_unwraps_single_element_array() {
        let server = MockServer::start().await;
        mount_login(&server, "t1").await;
        Mock::given(method("GET"))
            .and(path(format!("{DETAIL_PATH}/AWB1234567890")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"awb": "AWB1234567890"}])),
            )
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        let detail = gw.fetch_detail("AWB1234567890").await.unwrap().unwrap();
        assert_eq!(detail["awb"], "AWB1234567890");
    }

    #[tokio::test]
    async fn test_resolve_degrades_for_rest_of_run() {
        let server = MockServer::start().await;
        mount_login(&server, "t1").await;
        // Old deployment: resolve answers 405 exactly once, then the client
        // must stop asking.
        Mock::given(method("GET"))
            .and(path(format!("{RESOLVE_PATH}/AWB1234567890")))
            .respond_with(ResponseTemplate::new(405))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{DETAIL_PATH}/AWB1234567890")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"awb": "AWB1234567890"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{DETAIL_PATH}/AWB9876543210")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"awb": "AWB9876543210"})),
            )
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        gw.begin_run();
        let first = gw.resolve_and_fetch("AWB1234567890", 100).await.unwrap().unwrap();
        assert_eq!(first["awb"], "AWB1234567890");
        // No resolve mock exists for this identifier; only the degraded path
        // can answer.
        let second = gw.resolve_and_fetch("AWB9876543210", 100).await.unwrap().unwrap();
        assert_eq!(second["awb"], "AWB9876543210");
    }

    #[tokio::test]
    async fn test_resolve_404_tries_next_candidate() {
        let server = MockServer::start().await;
        mount_login(&server, "t1").await;
        Mock::given(method("GET"))
            .and(path(format!("{RESOLVE_PATH}/ORDER9999")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{RESOLVE_PATH}/AWB1234567890")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"awb": "AWB1234567890"})),
            )
            .mount(&server)
            .await;

        let gw = HttpGateway::new(config(&server)).unwrap();
        gw.begin_run();
        let found = gw.resolve_and_fetch("ORDER9999 AWB1234567890", 100).await.unwrap();
        assert_eq!(found.unwrap()["awb"], "AWB1234567890");
    }
}
