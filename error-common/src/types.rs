use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codes;
use crate::context::ErrorContext;
use crate::recovery::RecoveryAction;

/// Access-control failure taxonomy shared by every gateway component
///
/// Callers must be able to tell "the service said no" (`AccessDenied`) apart
/// from "we could not ask the service" (`ServiceUnavailable`,
/// `ValidationError`) and from the local short-circuit (`ClientPolicyDenied`).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessError {
    /// No session; the user must sign in and come back to `location`
    #[error("Authentication required to access {location}")]
    AuthenticationRequired { location: String, login_url: String },

    /// Validation transport is down and the failure policy is fail-closed
    #[error("Access validation service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    /// Authoritative "no" from the authorization server
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String, context: ErrorContext },

    /// The local role/permission predicate failed; no server round trip was made
    #[error("Access denied by client policy: {reason}")]
    ClientPolicyDenied { reason: String, context: ErrorContext },

    /// Indeterminate or malformed answer from the authorization server
    #[error("Access validation error: {reason}")]
    ValidationError { reason: String },

    /// Security log delivery failed; recorded locally, never surfaced
    #[error("Security log delivery failed: {reason}")]
    LoggingFailure { reason: String },
}

impl AccessError {
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::AuthenticationRequired { .. } => codes::authentication::AUTHENTICATION_REQUIRED,
            AccessError::ServiceUnavailable { .. } => codes::validation::SERVICE_UNAVAILABLE,
            AccessError::AccessDenied { .. } => codes::authorization::ACCESS_DENIED,
            AccessError::ClientPolicyDenied { .. } => codes::authorization::CLIENT_POLICY_DENIED,
            AccessError::ValidationError { .. } => codes::validation::INDETERMINATE_RESPONSE,
            AccessError::LoggingFailure { .. } => codes::audit::LOGGING_FAILURE,
        }
    }

    /// Human-readable reason suitable for a denial screen
    pub fn reason(&self) -> String {
        match self {
            AccessError::AuthenticationRequired { .. } => {
                "You need to sign in to view this page.".to_string()
            }
            AccessError::ServiceUnavailable { reason }
            | AccessError::AccessDenied { reason, .. }
            | AccessError::ClientPolicyDenied { reason, .. }
            | AccessError::ValidationError { reason }
            | AccessError::LoggingFailure { reason } => reason.clone(),
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            AccessError::AccessDenied { context, .. }
            | AccessError::ClientPolicyDenied { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True only for the server's authoritative denial
    pub fn is_authoritative(&self) -> bool {
        matches!(self, AccessError::AccessDenied { .. })
    }

    /// True when the gateway could not obtain an answer at all
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            AccessError::ServiceUnavailable { .. } | AccessError::ValidationError { .. }
        )
    }

    /// Recovery affordances for this failure.
    ///
    /// Every denial offers at least one action. `LoggingFailure` is never
    /// shown to the user and therefore offers none.
    pub fn recovery_actions(&self, safe_default_path: &str) -> Vec<RecoveryAction> {
        let safe_default = RecoveryAction::GoToSafeDefault {
            path: safe_default_path.to_string(),
        };
        match self {
            AccessError::AuthenticationRequired { login_url, .. } => vec![RecoveryAction::SignIn {
                login_url: login_url.clone(),
            }],
            AccessError::ServiceUnavailable { .. } | AccessError::ValidationError { .. } => {
                vec![RecoveryAction::Retry, safe_default]
            }
            AccessError::AccessDenied { .. } | AccessError::ClientPolicyDenied { .. } => {
                vec![RecoveryAction::GoBack, safe_default]
            }
            AccessError::LoggingFailure { .. } => Vec::new(),
        }
    }
}

/// Result type alias for gateway access decisions
pub type Result<T> = std::result::Result<T, AccessError>;

/// Record an access error in the local log at a level matching its severity
pub fn log_error(context: &str, error: &AccessError) {
    match error {
        AccessError::AuthenticationRequired { .. } => {
            tracing::info!(context = context, error_code = error.code(), error = %error, "Authentication required");
        }
        AccessError::LoggingFailure { .. } => {
            tracing::warn!(context = context, error_code = error.code(), error = %error, "Security log delivery failed");
        }
        _ => {
            tracing::warn!(context = context, error_code = error.code(), error = %error, "Access denied");
        }
    }
}
