use audit_engine::{event_types, AuditLogger, REQUIRED_ROLE_KEY};
use auth_identity::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::{ApiRequest, ServerValidationClient};
use crate::error::{ClientError, Result};

pub const VALIDATE_PATH: &str = "/auth/validate";

/// Access dimensions a guarded operation asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    pub admin: bool,
    pub clinical: bool,
    pub marketing: bool,
    pub roles: Vec<Role>,
}

impl AccessRequirement {
    /// Collapse the requested dimensions into one role using the fixed
    /// precedence admin > clinical > marketing > explicit roles > none
    pub fn primary_role(&self) -> PrimaryRole {
        if self.admin {
            PrimaryRole::Admin
        } else if self.clinical {
            PrimaryRole::Clinical
        } else if self.marketing {
            PrimaryRole::Marketing
        } else if !self.roles.is_empty() {
            PrimaryRole::Roles(self.roles.clone())
        } else {
            PrimaryRole::None
        }
    }
}

/// The single role sent to the authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryRole {
    Admin,
    Clinical,
    Marketing,
    Roles(Vec<Role>),
    None,
}

impl PrimaryRole {
    /// Value of `requiredRole` on the wire and of the `X-Required-Role` hint
    pub fn as_wire(&self) -> String {
        match self {
            PrimaryRole::Admin => "admin".to_string(),
            PrimaryRole::Clinical => "clinical".to_string(),
            PrimaryRole::Marketing => "marketing".to_string(),
            PrimaryRole::Roles(roles) => roles
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(","),
            PrimaryRole::None => "none".to_string(),
        }
    }

    /// Concrete roles for audit metadata, so risk classification sees the
    /// administrative roles behind `admin`
    pub fn audit_value(&self) -> Value {
        match self {
            PrimaryRole::Admin => json!([Role::SuperAdmin.as_str(), Role::PracticeAdmin.as_str()]),
            PrimaryRole::Roles(roles) => Value::Array(
                roles
                    .iter()
                    .map(|role| Value::String(role.as_str().to_string()))
                    .collect(),
            ),
            other => Value::String(other.as_wire()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    required_role: String,
    required_permissions: &'a [String],
    endpoint: &'a str,
    timestamp: DateTime<Utc>,
}

/// Answer of `POST /auth/validate`
///
/// Valid for the single operation it was requested for and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub valid: bool,
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub user_permissions: Vec<String>,
    #[serde(rename = "access_level", default)]
    pub access_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccessDecision {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            user_role: None,
            user_permissions: Vec::new(),
            access_level: None,
            error: Some(reason.into()),
        }
    }

    /// Server-stated reason for a denial
    pub fn denial_reason(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "Access denied by server".to_string())
    }
}

/// One authoritative round trip per guarded operation
///
/// Never caches: the client's own copy of the role is not evidence. Every
/// call emits exactly one security event: granted, denied or failed.
pub struct AccessValidator {
    client: Arc<ServerValidationClient>,
    audit: Arc<AuditLogger>,
}

impl AccessValidator {
    pub fn new(client: Arc<ServerValidationClient>, audit: Arc<AuditLogger>) -> Self {
        Self { client, audit }
    }

    /// Ask the server whether the current identity may perform the operation
    /// at `endpoint`.
    ///
    /// An authoritative 403 is returned as `Ok` with `valid == false`. Errors
    /// mean the answer could not be obtained.
    pub async fn validate_access(
        &self,
        required_role: &PrimaryRole,
        required_permissions: &[String],
        endpoint: &str,
    ) -> Result<AccessDecision> {
        let wire_role = required_role.as_wire();
        let body = ValidateRequest {
            required_role: wire_role.clone(),
            required_permissions,
            endpoint,
            timestamp: Utc::now(),
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| ClientError::indeterminate(format!("could not encode validation request: {}", e)))?;

        let request = ApiRequest::post(VALIDATE_PATH)
            .json(body)
            .required_role(wire_role.clone())
            .require_auth();

        let outcome = match self.client.request_json::<AccessDecision>(request).await {
            Err(ClientError::AccessDenied { reason }) => Ok(AccessDecision::denied(reason)),
            other => other,
        };

        let mut metadata = Map::new();
        metadata.insert(REQUIRED_ROLE_KEY.to_string(), required_role.audit_value());
        metadata.insert("primaryRole".to_string(), json!(wire_role));
        metadata.insert("requiredPermissions".to_string(), json!(required_permissions));
        metadata.insert("endpoint".to_string(), json!(endpoint));

        match &outcome {
            Ok(decision) if decision.valid => {
                metadata.insert("outcome".to_string(), json!("granted"));
                metadata.insert("userRole".to_string(), json!(decision.user_role));
                metadata.insert("accessLevel".to_string(), json!(decision.access_level));
                info!(endpoint = endpoint, required_role = %wire_role, "Server validation granted");
                self.audit.log_event(event_types::ACCESS_VALIDATION_GRANTED, metadata);
            }
            Ok(decision) => {
                metadata.insert("outcome".to_string(), json!("denied"));
                metadata.insert("userRole".to_string(), json!(decision.user_role));
                metadata.insert("reason".to_string(), json!(decision.denial_reason()));
                info!(endpoint = endpoint, required_role = %wire_role, "Server validation denied");
                self.audit.log_event(event_types::ACCESS_VALIDATION_DENIED, metadata);
            }
            Err(e) => {
                metadata.insert("outcome".to_string(), json!("failed"));
                metadata.insert("error".to_string(), json!(e.to_string()));
                warn!(endpoint = endpoint, required_role = %wire_role, error = %e, "Server validation failed");
                self.audit.log_event(event_types::ACCESS_VALIDATION_FAILED, metadata);
            }
        }

        debug!(endpoint = endpoint, "Validation round trip complete");
        outcome
    }
}
