//! Risk classification for security events
//!
//! Rules, first match wins:
//! 1. event type contains `denied` or `failed` (case-insensitive) → high
//! 2. `requiredRole` is `super_admin` or `practice_admin` → medium
//! 3. otherwise → low
//!
//! The level only drives alerting priority. It is never consulted by an
//! access decision.

use serde_json::{Map, Value};

use crate::event::{RiskLevel, REQUIRED_ROLE_KEY};

const HIGH_RISK_MARKERS: &[&str] = &["denied", "failed"];
const SENSITIVE_ROLES: &[&str] = &["super_admin", "practice_admin"];

/// Classify an event. Pure and total: same inputs, same level, for any input.
pub fn classify_risk(event_type: &str, metadata: &Map<String, Value>) -> RiskLevel {
    let lowered = event_type.to_ascii_lowercase();
    if HIGH_RISK_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return RiskLevel::High;
    }

    if requires_sensitive_role(metadata.get(REQUIRED_ROLE_KEY)) {
        return RiskLevel::Medium;
    }

    RiskLevel::Low
}

fn requires_sensitive_role(required: Option<&Value>) -> bool {
    match required {
        Some(Value::String(role)) => SENSITIVE_ROLES.contains(&role.as_str()),
        Some(Value::Array(roles)) => roles
            .iter()
            .filter_map(Value::as_str)
            .any(|role| SENSITIVE_ROLES.contains(&role)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn metadata_with_role(role: Value) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert(REQUIRED_ROLE_KEY.to_string(), role);
        metadata
    }

    #[test]
    fn test_denied_and_failed_are_high() {
        assert_eq!(classify_risk("access_validation_denied", &Map::new()), RiskLevel::High);
        assert_eq!(classify_risk("health_check_failed", &Map::new()), RiskLevel::High);
        assert_eq!(classify_risk("LOGIN_FAILED", &Map::new()), RiskLevel::High);
    }

    #[test]
    fn test_type_rule_wins_over_role_rule() {
        let metadata = metadata_with_role(json!("super_admin"));
        assert_eq!(classify_risk("client_policy_denied", &metadata), RiskLevel::High);
    }

    #[test]
    fn test_sensitive_roles_are_medium() {
        assert_eq!(
            classify_risk("access_validation_granted", &metadata_with_role(json!("practice_admin"))),
            RiskLevel::Medium
        );
        assert_eq!(
            classify_risk("access_validation_granted", &metadata_with_role(json!(["nurse", "super_admin"]))),
            RiskLevel::Medium
        );
    }

    #[test]
    fn test_everything_else_is_low() {
        assert_eq!(
            classify_risk("access_validation_granted", &metadata_with_role(json!("clinical"))),
            RiskLevel::Low
        );
        assert_eq!(classify_risk("", &Map::new()), RiskLevel::Low);
        assert_eq!(classify_risk("session_started", &metadata_with_role(json!(42))), RiskLevel::Low);
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(event_type in ".*", role in ".*") {
            let metadata = metadata_with_role(Value::String(role));
            prop_assert_eq!(
                classify_risk(&event_type, &metadata),
                classify_risk(&event_type, &metadata)
            );
        }

        #[test]
        fn prop_denied_or_failed_is_always_high(
            prefix in "[a-z_]{0,12}",
            suffix in "[a-z_]{0,12}",
            marker in prop::sample::select(vec!["denied", "failed", "Denied", "FAILED"]),
            role in ".*",
        ) {
            let event_type = format!("{}{}{}", prefix, marker, suffix);
            let metadata = metadata_with_role(Value::String(role));
            prop_assert_eq!(classify_risk(&event_type, &metadata), RiskLevel::High);
        }
    }
}
