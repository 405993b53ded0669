use audit_engine::{event_types, AuditLogger};
use auth_identity::SessionManager;
use config_engine::GatewayConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Sleeper;
use crate::csrf::CsrfCache;
use crate::error::{ClientError, Result};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_REQUEST_ID: &str = "X-Request-ID";
pub const HEADER_REQUIRED_ROLE: &str = "X-Required-Role";
pub const HEADER_CLIENT_VALIDATION: &str = "X-Client-Validation";
pub const HEADER_CSRF_TOKEN: &str = "X-CSRF-Token";

/// `X-Required-Role` value on a mutating call that carries no hint
pub const ROLE_HINT_NONE: &str = "none";

pub const CSRF_TOKEN_PATH: &str = "/csrf-token";

/// Status some frameworks use for an expired CSRF token
const STATUS_CSRF_EXPIRED: u16 = 419;
/// `code` in a 403 body that marks a CSRF rejection rather than a denial
const CSRF_INVALID_CODE: &str = "CSRF_TOKEN_INVALID";

/// Description of one logical call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub required_role: Option<String>,
    pub require_auth: bool,
    pub timeout: Option<Duration>,
    pub audited: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            required_role: None,
            require_auth: false,
            timeout: None,
            audited: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Role hint sent as `X-Required-Role`
    pub fn required_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }

    /// Refuse to send the request without a session token
    pub fn require_auth(mut self) -> Self {
        self.require_auth = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Emit no security events for this request (used by the security log itself)
    pub fn without_audit(mut self) -> Self {
        self.audited = false;
        self
    }
}

/// Successful (2xx) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub request_id: String,
}

impl ApiResponse {
    /// Decode the body; a malformed body is indeterminate, not a denial
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::indeterminate(format!("malformed response body: {}", e))
        })
    }
}

/// Client tuning derived from [`GatewayConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub csrf_enabled: bool,
    pub max_unauthorized_retries: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
}

impl From<&GatewayConfig> for ClientSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            csrf_enabled: config.csrf.enabled,
            max_unauthorized_retries: config.retry.max_unauthorized_retries,
            retry_base_delay: config.retry_base_delay(),
            request_timeout: config.request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsrfTokenResponse {
    csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn from_response(response: &HttpResponse) -> Self {
        response.parse().unwrap_or_default()
    }
}

/// Wraps every outbound call to the authorization server
///
/// Attaches the bearer token, a request id, the role hint and (for mutating
/// verbs) the CSRF token, and applies the retry policy:
///
/// - 401: up to `max_unauthorized_retries` more attempts, waiting
///   `attempt * retry_base_delay` before each; the token is re-read every
///   attempt since it may be mid-refresh
/// - 403: returned immediately as [`ClientError::AccessDenied`]
/// - CSRF rejection: one token refresh, one retry
///
/// Backoff sleeps only delay the request that is retrying.
pub struct ServerValidationClient {
    transport: Arc<dyn HttpTransport>,
    sessions: Arc<SessionManager>,
    sleeper: Arc<dyn Sleeper>,
    audit: Arc<AuditLogger>,
    csrf: CsrfCache,
    settings: ClientSettings,
    instance_id: Uuid,
    request_counter: AtomicU64,
}

impl ServerValidationClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        sessions: Arc<SessionManager>,
        sleeper: Arc<dyn Sleeper>,
        audit: Arc<AuditLogger>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            transport,
            sessions,
            sleeper,
            audit,
            csrf: CsrfCache::new(),
            settings,
            instance_id: Uuid::new_v4(),
            request_counter: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn csrf(&self) -> &CsrfCache {
        &self.csrf
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Monotonic per-client request id
    pub fn next_request_id(&self) -> String {
        let sequence = self.request_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", self.instance_id, sequence)
    }

    fn bearer_token(&self) -> Option<String> {
        self.sessions
            .current()
            .and_then(|session| session.bearer_token().map(str::to_string))
    }

    // =============================================================================
    // Requests
    // =============================================================================

    pub async fn request(&self, call: ApiRequest) -> Result<ApiResponse> {
        let request_id = self.next_request_id();
        let needs_csrf = self.settings.csrf_enabled && call.method.is_mutating();

        let mut csrf_token = if needs_csrf {
            Some(
                self.csrf
                    .get_or_fetch(|| self.fetch_csrf_token(&request_id))
                    .await?,
            )
        } else {
            None
        };

        let mut unauthorized_retries: u32 = 0;
        let mut csrf_refreshed = false;

        loop {
            let token = self.bearer_token();
            if call.require_auth && token.is_none() {
                debug!(path = %call.path, "No session token for protected endpoint; request not sent");
                return Err(ClientError::AuthenticationRequired);
            }

            let http = self.build(&call, &request_id, token.as_deref(), csrf_token.as_deref());
            let response = self.transport.send(http).await?;

            if needs_csrf && is_csrf_rejection(&response) {
                if csrf_refreshed {
                    warn!(request_id = %request_id, path = %call.path, "CSRF token rejected after refresh");
                    return Err(ClientError::CsrfRejected);
                }
                csrf_refreshed = true;

                let stale = csrf_token.take();
                let (fresh, fetched) = self
                    .csrf
                    .refresh(stale.as_deref(), || self.fetch_csrf_token(&request_id))
                    .await?;
                if fetched {
                    info!(request_id = %request_id, "CSRF token refreshed after rejection");
                    if call.audited {
                        let mut metadata = Map::new();
                        metadata.insert("requestId".to_string(), json!(request_id));
                        metadata.insert("endpoint".to_string(), json!(call.path));
                        self.audit.log_event(event_types::CSRF_TOKEN_REFRESHED, metadata);
                    }
                }
                csrf_token = Some(fresh);
                continue;
            }

            match response.status {
                401 => {
                    if unauthorized_retries >= self.settings.max_unauthorized_retries {
                        warn!(
                            request_id = %request_id,
                            path = %call.path,
                            attempts = unauthorized_retries + 1,
                            "Unauthorized after retries"
                        );
                        return Err(ClientError::Unauthorized {
                            attempts: unauthorized_retries + 1,
                        });
                    }
                    unauthorized_retries += 1;
                    let delay = self.settings.retry_base_delay * unauthorized_retries;
                    debug!(
                        request_id = %request_id,
                        attempt = unauthorized_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Unauthorized; retrying after backoff"
                    );
                    self.sleeper.sleep(delay).await;
                }
                403 => {
                    let body = ErrorBody::from_response(&response);
                    let reason = body
                        .error
                        .or(body.message)
                        .unwrap_or_else(|| "Access denied by server".to_string());
                    debug!(request_id = %request_id, path = %call.path, reason = %reason, "Access denied");
                    return Err(ClientError::AccessDenied { reason });
                }
                _ if response.is_success() => {
                    return Ok(ApiResponse {
                        status: response.status,
                        body: response.body,
                        request_id,
                    });
                }
                status => {
                    warn!(request_id = %request_id, path = %call.path, status = status, "Unexpected response status");
                    return Err(ClientError::indeterminate(format!("HTTP {}", status)));
                }
            }
        }
    }

    pub async fn request_json<T: DeserializeOwned>(&self, call: ApiRequest) -> Result<T> {
        self.request(call).await?.json()
    }

    /// Single attempt with no retries, used for liveness probes.
    /// Healthy iff a 2xx arrives within `timeout`.
    pub async fn probe(&self, path: &str, timeout: Duration) -> bool {
        let request_id = self.next_request_id();
        let call = ApiRequest::get(path).timeout(timeout);
        let token = self.bearer_token();
        let http = self.build(&call, &request_id, token.as_deref(), None);

        match tokio::time::timeout(timeout, self.transport.send(http)).await {
            Ok(Ok(response)) => response.is_success(),
            Ok(Err(e)) => {
                debug!(path = path, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(path = path, "Probe timed out");
                false
            }
        }
    }

    async fn fetch_csrf_token(&self, request_id: &str) -> Result<String> {
        let token = self.bearer_token();
        let call = ApiRequest::get(CSRF_TOKEN_PATH);
        let http = self.build(&call, request_id, token.as_deref(), None);
        let response = self.transport.send(http).await?;

        if !response.is_success() {
            return Err(ClientError::indeterminate(format!(
                "CSRF token fetch failed with HTTP {}",
                response.status
            )));
        }
        let body: CsrfTokenResponse = response
            .parse()
            .map_err(|e| ClientError::indeterminate(format!("malformed CSRF token response: {}", e)))?;
        if body.csrf_token.trim().is_empty() {
            return Err(ClientError::indeterminate("empty CSRF token"));
        }
        Ok(body.csrf_token)
    }

    fn build(&self, call: &ApiRequest, request_id: &str, token: Option<&str>, csrf_token: Option<&str>) -> HttpRequest {
        let mut headers = vec![
            (HEADER_REQUEST_ID.to_string(), request_id.to_string()),
            (HEADER_CLIENT_VALIDATION.to_string(), "true".to_string()),
        ];
        if let Some(token) = token {
            headers.push((HEADER_AUTHORIZATION.to_string(), format!("Bearer {}", token)));
        }
        match &call.required_role {
            Some(role) => headers.push((HEADER_REQUIRED_ROLE.to_string(), role.clone())),
            None if call.method.is_mutating() => {
                headers.push((HEADER_REQUIRED_ROLE.to_string(), ROLE_HINT_NONE.to_string()))
            }
            None => {}
        }
        if let Some(csrf_token) = csrf_token {
            headers.push((HEADER_CSRF_TOKEN.to_string(), csrf_token.to_string()));
        }

        HttpRequest {
            method: call.method,
            path: call.path.clone(),
            query: call.query.clone(),
            headers,
            body: call.body.clone(),
            timeout: call.timeout.unwrap_or(self.settings.request_timeout),
        }
    }
}

fn is_csrf_rejection(response: &HttpResponse) -> bool {
    match response.status {
        STATUS_CSRF_EXPIRED => true,
        403 => ErrorBody::from_response(response).code.as_deref() == Some(CSRF_INVALID_CODE),
        _ => false,
    }
}
