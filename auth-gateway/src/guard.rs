use audit_engine::{event_types, AuditLogger, REQUIRED_ROLE_KEY};
use auth_identity::{AuthSnapshot, SessionManager};
use config_engine::{FailurePolicy, GatewayConfig};
use error_common::{log_error, AccessError, ErrorContext, RecoveryAction};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::health::HealthMonitor;
use crate::policy::{GuardOptions, LocalDenial};
use crate::validator::{AccessDecision, AccessValidator, PrimaryRole};

/// Where the user is sent to sign in, and where they come back to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRedirect {
    pub login_path: String,
    pub return_to: String,
}

impl LoginRedirect {
    pub fn to_url(&self) -> String {
        format!("{}?returnTo={}", self.login_path, urlencoding::encode(&self.return_to))
    }
}

/// How an allowed outcome was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllowMode {
    /// `require_auth == false`
    Public,
    /// The authorization server said yes
    ServerValidated {
        user_role: Option<String>,
        access_level: Option<String>,
    },
    /// Server validation skipped via the emergency-access flag
    Bypassed,
    /// Service unhealthy under `FailOpen`; only the local predicate was checked
    LocalFallback,
}

impl AllowMode {
    pub fn is_server_validated(&self) -> bool {
        matches!(self, AllowMode::ServerValidated { .. })
    }
}

/// RouteGuard state machine
///
/// ```text
/// Initializing ─┬─> Allowed(Public)
///               ├─> Unauthenticated
///               ├─> ServiceUnavailable
///               ├─> ClientPolicyDenied
///               ├─> Allowed(Bypassed | LocalFallback)
///               └─> ServerValidationPending ─┬─> Allowed(ServerValidated)
///                                            ├─> ServerDenied
///                                            └─> ValidationError
/// ```
///
/// Denials are terminal until an explicit [`RouteGuard::retry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    Initializing,
    Unauthenticated { redirect: LoginRedirect },
    ServiceUnavailable { error: AccessError },
    ClientPolicyDenied { error: AccessError },
    ServerValidationPending,
    ServerDenied { error: AccessError },
    ValidationError { error: AccessError },
    Allowed { mode: AllowMode },
}

impl GuardState {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardState::Allowed { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            GuardState::Unauthenticated { .. }
                | GuardState::ServiceUnavailable { .. }
                | GuardState::ClientPolicyDenied { .. }
                | GuardState::ServerDenied { .. }
                | GuardState::ValidationError { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_allowed() || self.is_denied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            GuardState::Initializing => "initializing",
            GuardState::Unauthenticated { .. } => "unauthenticated",
            GuardState::ServiceUnavailable { .. } => "service_unavailable",
            GuardState::ClientPolicyDenied { .. } => "client_policy_denied",
            GuardState::ServerValidationPending => "server_validation_pending",
            GuardState::ServerDenied { .. } => "server_denied",
            GuardState::ValidationError { .. } => "validation_error",
            GuardState::Allowed { .. } => "allowed",
        }
    }

    /// The failure behind a denial state
    pub fn error(&self) -> Option<AccessError> {
        match self {
            GuardState::Unauthenticated { redirect } => Some(AccessError::AuthenticationRequired {
                location: redirect.return_to.clone(),
                login_url: redirect.to_url(),
            }),
            GuardState::ServiceUnavailable { error }
            | GuardState::ClientPolicyDenied { error }
            | GuardState::ServerDenied { error }
            | GuardState::ValidationError { error } => Some(error.clone()),
            _ => None,
        }
    }

    /// Human-readable reason for a denial
    pub fn reason(&self) -> Option<String> {
        self.error().map(|error| error.reason())
    }

    pub fn recovery_actions(&self, safe_default_path: &str) -> Vec<RecoveryAction> {
        self.error()
            .map(|error| error.recovery_actions(safe_default_path))
            .unwrap_or_default()
    }

    /// Visible marker for allows that were not server-validated
    pub fn development_badge(&self, development_mode: bool) -> Option<&'static str> {
        if !development_mode {
            return None;
        }
        match self {
            GuardState::Allowed { mode: AllowMode::Bypassed } => Some("DEV: server validation bypassed"),
            GuardState::Allowed { mode: AllowMode::LocalFallback } => Some("DEV: local fallback, not server-validated"),
            _ => None,
        }
    }
}

/// Result of [`RouteGuard::render`]: content only exists on an allow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Allowed { content: T, mode: AllowMode },
    Denied(GuardState),
}

/// Guard-wide settings taken from the gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSettings {
    pub failure_policy: FailurePolicy,
    pub login_path: String,
    pub safe_default_path: String,
    pub development_mode: bool,
}

impl From<&GatewayConfig> for GuardSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            failure_policy: config.failure_policy,
            login_path: config.routes.login_path.clone(),
            safe_default_path: config.routes.safe_default_path.clone(),
            development_mode: config.development_mode,
        }
    }
}

/// Collaborators a guard evaluates against
#[derive(Clone)]
pub struct GuardDeps {
    pub sessions: Arc<SessionManager>,
    pub validator: Arc<AccessValidator>,
    pub health: Arc<HealthMonitor>,
    pub audit: Arc<AuditLogger>,
    pub settings: GuardSettings,
}

/// Guards one page or action
///
/// Each evaluation runs under a new generation; a result whose generation is
/// no longer current is dropped, which also covers unmounting mid-validation.
/// At most one validation round trip is in flight per guard: a superseding
/// evaluation waits for the previous round trip before issuing its own.
pub struct RouteGuard {
    deps: GuardDeps,
    options: GuardOptions,
    generation: AtomicU64,
    unmounted: AtomicBool,
    in_flight: Mutex<()>,
    state: watch::Sender<GuardState>,
}

impl RouteGuard {
    pub fn new(deps: GuardDeps, options: GuardOptions) -> Self {
        let (state, _) = watch::channel(GuardState::Initializing);
        Self {
            deps,
            options,
            generation: AtomicU64::new(0),
            unmounted: AtomicBool::new(false),
            in_flight: Mutex::new(()),
            state,
        }
    }

    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn development_badge(&self) -> Option<&'static str> {
        self.state().development_badge(self.deps.settings.development_mode)
    }

    /// Evaluate the guard. A denial already reached is returned as is; use
    /// [`RouteGuard::retry`] to re-run it.
    pub async fn evaluate(&self) -> GuardState {
        let current = self.state();
        if current.is_denied() {
            return current;
        }
        self.run().await
    }

    /// Explicit, user-triggered re-evaluation
    pub async fn retry(&self) -> GuardState {
        info!(location = %self.options.location, "Guard re-evaluation requested");
        self.run().await
    }

    /// Invalidate the current generation; later results are never applied
    pub fn unmount(&self) {
        self.unmounted.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!(location = %self.options.location, "Guard unmounted");
    }

    /// Evaluate and produce `content` only when allowed
    pub async fn render<T, F>(&self, content: F) -> Guarded<T>
    where
        F: FnOnce() -> T,
    {
        match self.evaluate().await {
            GuardState::Allowed { mode } => Guarded::Allowed {
                content: content(),
                mode,
            },
            denied => Guarded::Denied(denied),
        }
    }

    // =============================================================================
    // Evaluation
    // =============================================================================

    async fn run(&self) -> GuardState {
        if self.unmounted.load(Ordering::SeqCst) {
            return self.state();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.apply(generation, GuardState::Initializing);

        let snapshot = self.deps.sessions.wait_initialized().await;
        if self.is_current(generation) {
            let outcome = self.decide(generation, &snapshot).await;
            self.apply(generation, outcome);
        }
        self.state()
    }

    async fn decide(&self, generation: u64, snapshot: &AuthSnapshot) -> GuardState {
        let options = &self.options;

        if !options.require_auth {
            return GuardState::Allowed { mode: AllowMode::Public };
        }

        if snapshot.session.is_none() {
            let redirect = self.login_redirect();
            info!(
                location = %options.location,
                login_url = %redirect.to_url(),
                "No session; redirecting to sign-in"
            );
            return GuardState::Unauthenticated { redirect };
        }

        let primary_role = options.requirement().primary_role();

        if !self.deps.health.is_healthy() {
            let policy = options.failure_policy.unwrap_or(self.deps.settings.failure_policy);
            match policy {
                FailurePolicy::FailClosed => {
                    let error = AccessError::ServiceUnavailable {
                        reason: "The access validation service is unavailable. Access is denied until it can be reached."
                            .to_string(),
                    };
                    log_error(&options.location, &error);
                    self.audit(generation, event_types::SERVICE_UNAVAILABLE_DENIED, &primary_role, |metadata| {
                        metadata.insert("failurePolicy".to_string(), json!("fail_closed"));
                    });
                    return GuardState::ServiceUnavailable { error };
                }
                FailurePolicy::FailOpen => {
                    if let Err(denial) = options.check_local(snapshot) {
                        return self.client_policy_denied(generation, snapshot, &primary_role, denial);
                    }
                    warn!(location = %options.location, "Validation service unhealthy; fail-open override applied");
                    self.audit(generation, event_types::FAIL_OPEN_OVERRIDE_APPLIED, &primary_role, |metadata| {
                        metadata.insert("failurePolicy".to_string(), json!("fail_open"));
                    });
                    return GuardState::Allowed {
                        mode: AllowMode::LocalFallback,
                    };
                }
            }
        }

        if let Err(denial) = options.check_local(snapshot) {
            return self.client_policy_denied(generation, snapshot, &primary_role, denial);
        }

        if options.bypass_server_validation {
            warn!(location = %options.location, "Server validation bypassed");
            self.audit(generation, event_types::SERVER_VALIDATION_BYPASSED, &primary_role, |metadata| {
                metadata.insert("bypass".to_string(), Value::Bool(true));
            });
            return GuardState::Allowed { mode: AllowMode::Bypassed };
        }

        self.apply(generation, GuardState::ServerValidationPending);
        let _in_flight = self.in_flight.lock().await;
        if !self.is_current(generation) {
            return GuardState::ServerValidationPending;
        }

        let result = self
            .deps
            .validator
            .validate_access(&primary_role, &options.required_permissions, &options.location)
            .await;
        self.resolve(snapshot, &primary_role, result)
    }

    fn resolve(
        &self,
        snapshot: &AuthSnapshot,
        primary_role: &PrimaryRole,
        result: Result<AccessDecision, ClientError>,
    ) -> GuardState {
        match result {
            Ok(decision) if decision.valid => GuardState::Allowed {
                mode: AllowMode::ServerValidated {
                    user_role: decision.user_role,
                    access_level: decision.access_level,
                },
            },
            Ok(decision) => {
                let context = self
                    .denial_context(snapshot, primary_role)
                    .with_current_role(decision.user_role.clone().or_else(|| snapshot.role().map(|role| role.to_string())));
                let error = AccessError::AccessDenied {
                    reason: decision.denial_reason(),
                    context,
                };
                log_error(&self.options.location, &error);
                GuardState::ServerDenied { error }
            }
            Err(ClientError::Unauthorized { .. }) | Err(ClientError::AuthenticationRequired) => {
                GuardState::Unauthenticated {
                    redirect: self.login_redirect(),
                }
            }
            Err(e) => {
                let error = AccessError::ValidationError {
                    reason: format!("Access could not be verified: {}", e),
                };
                log_error(&self.options.location, &error);
                GuardState::ValidationError { error }
            }
        }
    }

    fn client_policy_denied(
        &self,
        generation: u64,
        snapshot: &AuthSnapshot,
        primary_role: &PrimaryRole,
        denial: LocalDenial,
    ) -> GuardState {
        let context = self
            .denial_context(snapshot, primary_role)
            .with_current_role(snapshot.role().map(|role| role.to_string()))
            .add_context("required", denial.required.clone());
        let error = AccessError::ClientPolicyDenied {
            reason: denial.reason.clone(),
            context,
        };
        log_error(&self.options.location, &error);
        self.audit(generation, event_types::CLIENT_POLICY_DENIED, primary_role, |metadata| {
            metadata.insert("reason".to_string(), json!(denial.reason));
            metadata.insert(
                "currentRole".to_string(),
                json!(snapshot.role().map(|role| role.to_string())),
            );
        });
        GuardState::ClientPolicyDenied { error }
    }

    fn denial_context(&self, snapshot: &AuthSnapshot, primary_role: &PrimaryRole) -> ErrorContext {
        let mut context = ErrorContext::new()
            .with_location(self.options.location.clone())
            .with_required_role(primary_role.as_wire());
        if let Some(session) = &snapshot.session {
            context = context.with_subject_id(session.subject_id.to_string());
        }
        context
    }

    fn login_redirect(&self) -> LoginRedirect {
        LoginRedirect {
            login_path: self.deps.settings.login_path.clone(),
            return_to: self.options.location.clone(),
        }
    }

    /// Emit a guard-level security event while `generation` is still current
    fn audit<F>(&self, generation: u64, event_type: &str, primary_role: &PrimaryRole, extend: F)
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        if !self.is_current(generation) {
            return;
        }
        let mut metadata = Map::new();
        metadata.insert(REQUIRED_ROLE_KEY.to_string(), primary_role.audit_value());
        metadata.insert("primaryRole".to_string(), json!(primary_role.as_wire()));
        metadata.insert("location".to_string(), json!(self.options.location));
        metadata.insert("generation".to_string(), json!(generation));
        extend(&mut metadata);
        self.deps.audit.log_event(event_type, metadata);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn apply(&self, generation: u64, state: GuardState) -> bool {
        if !self.is_current(generation) {
            debug!(
                generation,
                current = self.generation(),
                state = state.name(),
                "Discarding result of superseded guard evaluation"
            );
            return false;
        }
        debug!(generation, state = state.name(), location = %self.options.location, "Guard state");
        self.state.send_replace(state);
        true
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.unmount();
    }
}
