// Security event types and structures
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::risk::classify_risk;

/// Event types emitted by the gateway
pub mod event_types {
    pub const ACCESS_VALIDATION_GRANTED: &str = "access_validation_granted";
    pub const ACCESS_VALIDATION_DENIED: &str = "access_validation_denied";
    pub const ACCESS_VALIDATION_FAILED: &str = "access_validation_failed";
    pub const CLIENT_POLICY_DENIED: &str = "client_policy_denied";
    pub const SERVER_VALIDATION_BYPASSED: &str = "server_validation_bypassed";
    pub const SERVICE_UNAVAILABLE_DENIED: &str = "access_denied_service_unavailable";
    pub const FAIL_OPEN_OVERRIDE_APPLIED: &str = "fail_open_override_applied";
    pub const HEALTH_CHECK_FAILED: &str = "health_check_failed";
    pub const CSRF_TOKEN_REFRESHED: &str = "csrf_token_refreshed";
}

/// Metadata key inspected by [`classify_risk`]
pub const REQUIRED_ROLE_KEY: &str = "requiredRole";

/// Alerting priority of a security event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only security event. The gateway only ever writes these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub event_type: String,
    pub metadata: Map<String, Value>,
    pub risk_level: RiskLevel,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// Build an event; the risk level is derived from type and metadata
    pub fn new(event_type: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let event_type = event_type.into();
        let risk_level = classify_risk(&event_type, &metadata);
        Self {
            id: Uuid::new_v4(),
            event_type,
            metadata,
            risk_level,
            timestamp: Utc::now(),
        }
    }

    /// Whether this event records a bypassed server validation
    pub fn is_bypass(&self) -> bool {
        self.metadata.get("bypass").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Body of `POST /security/log`
    pub fn to_payload(&self) -> SecurityLogPayload {
        let mut metadata = self.metadata.clone();
        metadata.insert("eventId".to_string(), Value::String(self.id.to_string()));
        metadata.insert("timestamp".to_string(), Value::String(self.timestamp.to_rfc3339()));
        SecurityLogPayload {
            event: self.event_type.clone(),
            metadata,
            risk_level: self.risk_level,
        }
    }
}

/// Wire format of a security log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLogPayload {
    pub event: String,
    pub metadata: Map<String, Value>,
    pub risk_level: RiskLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_wire_shape() {
        let mut metadata = Map::new();
        metadata.insert(REQUIRED_ROLE_KEY.to_string(), json!("practice_admin"));
        let event = SecurityEvent::new(event_types::ACCESS_VALIDATION_GRANTED, metadata);

        let payload = serde_json::to_value(event.to_payload()).unwrap();

        assert_eq!(payload["event"], "access_validation_granted");
        assert_eq!(payload["riskLevel"], "medium");
        assert_eq!(payload["metadata"]["requiredRole"], "practice_admin");
        assert!(payload["metadata"]["timestamp"].is_string());
    }

    #[test]
    fn test_bypass_tag() {
        let mut metadata = Map::new();
        metadata.insert("bypass".to_string(), json!(true));
        let event = SecurityEvent::new(event_types::SERVER_VALIDATION_BYPASSED, metadata);
        assert!(event.is_bypass());
        assert!(!SecurityEvent::new("session_signed_in", Map::new()).is_bypass());
    }
}
