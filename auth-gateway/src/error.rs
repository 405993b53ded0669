use thiserror::Error;

/// Outcome classes of a call through the [`ServerValidationClient`]
///
/// [`ServerValidationClient`]: crate::client::ServerValidationClient
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// HTTP 403: authoritative, never retried
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    /// Timeout, transport failure, 5xx or a malformed body
    #[error("Could not determine the answer: {reason}")]
    Indeterminate { reason: String },

    /// HTTP 401 persisted through the retry budget
    #[error("Unauthorized after {attempts} attempts")]
    Unauthorized { attempts: u32 },

    /// The server rejected the CSRF token again after one refresh
    #[error("CSRF token rejected after refresh")]
    CsrfRejected,

    /// A protected endpoint was called without a session token
    #[error("Authentication required")]
    AuthenticationRequired,
}

impl ClientError {
    pub fn indeterminate(reason: impl Into<String>) -> Self {
        ClientError::Indeterminate { reason: reason.into() }
    }

    /// True only for the server's authoritative "no"
    pub fn is_authoritative(&self) -> bool {
        matches!(self, ClientError::AccessDenied { .. })
    }
}

impl From<TransportError> for ClientError {
    fn from(error: TransportError) -> Self {
        ClientError::indeterminate(error.to_string())
    }
}

/// Failures below HTTP: nothing came back
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures while assembling or starting a [`GatewayContext`]
///
/// [`GatewayContext`]: crate::context::GatewayContext
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] config_engine::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Identity error: {0}")]
    Identity(#[from] auth_identity::IdentityError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_denial_is_authoritative() {
        assert!(ClientError::AccessDenied { reason: "no".into() }.is_authoritative());
        assert!(!ClientError::indeterminate("HTTP 502").is_authoritative());
        assert!(!ClientError::Unauthorized { attempts: 3 }.is_authoritative());
        assert!(!ClientError::CsrfRejected.is_authoritative());
    }

    #[test]
    fn test_transport_errors_are_indeterminate() {
        let error: ClientError = TransportError::Timeout.into();
        assert_eq!(error, ClientError::indeterminate("Request timed out"));
    }
}
