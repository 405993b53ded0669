use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// What a guard does when the validation service cannot be reached
///
/// `FailClosed` is the default. `FailOpen` must be set explicitly and every
/// use of it is audited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailClosed,
    FailOpen,
}

impl FailurePolicy {
    pub fn is_fail_open(self) -> bool {
        matches!(self, FailurePolicy::FailOpen)
    }
}

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the authorization server API
    pub api_base_url: String,

    /// Per-request timeout in seconds (default: 10)
    pub request_timeout_secs: u64,

    /// CSRF token handling
    pub csrf: CsrfConfig,

    /// Retry policy for unauthorized responses
    pub retry: RetryConfig,

    /// Liveness probing of the validation service
    pub health: HealthConfig,

    /// Default failure policy for guards that do not set one
    pub failure_policy: FailurePolicy,

    /// Security event emission
    pub audit: AuditConfig,

    /// Navigation targets used by denial recovery actions
    pub routes: RoutesConfig,

    /// Shows a visible indicator on allows that were not server-validated
    pub development_mode: bool,

    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Attach `X-CSRF-Token` to mutating requests
    pub enabled: bool,
}

/// Retry policy for HTTP 401
///
/// Delay before retry `n` (1-based) is `n * base_delay_ms`. HTTP 403 is never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first 401 (default: 2)
    pub max_unauthorized_retries: u32,

    /// Backoff base in milliseconds (default: 1000)
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Probe interval in seconds while a session is active (default: 300 = 5 minutes)
    pub interval_secs: u64,

    /// Maximum time a single probe may take before it counts as unhealthy
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,

    /// Mask tokens, e-mail addresses and similar values in event metadata
    pub redact_metadata: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub login_path: String,
    pub safe_default_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is not set
    pub level: String,

    /// Structured JSON output instead of the human-readable format
    pub json: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api/v1".to_string(),
            request_timeout_secs: 10,
            csrf: CsrfConfig::default(),
            retry: RetryConfig::default(),
            health: HealthConfig::default(),
            failure_policy: FailurePolicy::FailClosed,
            audit: AuditConfig::default(),
            routes: RoutesConfig::default(),
            development_mode: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_unauthorized_retries: 2,
            base_delay_ms: 1000,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            probe_timeout_secs: 5,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_metadata: true,
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            safe_default_path: "/dashboard".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl GatewayConfig {
    /// Reject values that would make the gateway misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("api_base_url must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("request_timeout_secs must be positive".to_string()));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(ConfigError::ValidationError("retry.base_delay_ms must be positive".to_string()));
        }
        if self.health.interval_secs == 0 {
            return Err(ConfigError::ValidationError("health.interval_secs must be positive".to_string()));
        }
        if self.health.probe_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("health.probe_timeout_secs must be positive".to_string()));
        }
        if !self.routes.login_path.starts_with('/') {
            return Err(ConfigError::ValidationError("routes.login_path must be an absolute path".to_string()));
        }
        Ok(())
    }

    /// Get request timeout duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get probe interval duration
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health.interval_secs)
    }

    /// Get probe timeout duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.health.probe_timeout_secs)
    }

    /// Get backoff base duration
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms)
    }
}
