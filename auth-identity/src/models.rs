use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::IdentityError;

/// Practice roles as stored in the profile store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    PracticeAdmin,
    Clinician,
    Nurse,
    Receptionist,
    MarketingManager,
    Patient,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SuperAdmin,
        Role::PracticeAdmin,
        Role::Clinician,
        Role::Nurse,
        Role::Receptionist,
        Role::MarketingManager,
        Role::Patient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::PracticeAdmin => "practice_admin",
            Role::Clinician => "clinician",
            Role::Nurse => "nurse",
            Role::Receptionist => "receptionist",
            Role::MarketingManager => "marketing_manager",
            Role::Patient => "patient",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::PracticeAdmin)
    }

    pub fn has_clinical_access(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::PracticeAdmin | Role::Clinician | Role::Nurse)
    }

    pub fn has_marketing_access(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::PracticeAdmin | Role::MarketingManager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| IdentityError::UnknownRole(s.to_string()))
    }
}

/// Provider-issued session. Replaced as a whole, never mutated in place.
#[derive(Clone)]
pub struct Session {
    pub subject_id: Uuid,
    access_token: Arc<SecretString>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(subject_id: Uuid, access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            access_token: Arc::new(SecretString::new(access_token.into())),
            expires_at,
        }
    }

    /// Bearer token to attach to outbound calls; `None` when the session
    /// carries no usable token
    pub fn bearer_token(&self) -> Option<&str> {
        let token = self.access_token.expose_secret();
        if token.trim().is_empty() {
            None
        } else {
            Some(token.as_str())
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subject_id", &self.subject_id)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authoritative profile from the profile store, never derived from token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
}

pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Events on the identity provider's auth-state stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

/// Immutable view of the current identity
///
/// The local predicates below are the client's own copy of the caller's
/// role. They are good enough to short-circuit an obvious denial and never
/// good enough to grant access on their own.
#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    /// False until the first provider resolution completes
    pub initialized: bool,
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
}

impl AuthSnapshot {
    pub fn signed_out() -> Self {
        Self {
            initialized: true,
            session: None,
            profile: None,
        }
    }

    pub fn signed_in(session: Session, profile: UserProfile) -> Self {
        Self {
            initialized: true,
            session: Some(session),
            profile: Some(profile),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some() && self.profile.is_some()
    }

    pub fn user_profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        if self.is_authenticated() {
            self.profile.as_ref().map(|profile| profile.role)
        } else {
            None
        }
    }

    /// True when authenticated and the role is one of `roles`; an empty list
    /// only requires authentication
    pub fn has_role(&self, roles: &[Role]) -> bool {
        match self.role() {
            Some(role) => roles.is_empty() || roles.contains(&role),
            None => false,
        }
    }

    pub fn can_access_clinical_data(&self) -> bool {
        self.role().map(|role| role.has_clinical_access()).unwrap_or(false)
    }

    pub fn can_access_marketing_data(&self) -> bool {
        self.role().map(|role| role.has_marketing_access()).unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.role().map(|role| role.is_admin()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot_with(role: Role) -> AuthSnapshot {
        let subject = Uuid::new_v4();
        AuthSnapshot::signed_in(
            Session::new(subject, "token", Utc::now() + Duration::hours(1)),
            UserProfile {
                id: subject,
                role,
                full_name: "Test User".to_string(),
                email: "test@clinic.example".to_string(),
                tenant_id: None,
            },
        )
    }

    #[test]
    fn test_role_wire_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(serde_json::to_value(role).unwrap(), role.as_str());
        }
        assert!("doctor".parse::<Role>().is_err());
    }

    #[test]
    fn test_access_predicates() {
        let nurse = snapshot_with(Role::Nurse);
        assert!(nurse.can_access_clinical_data());
        assert!(!nurse.can_access_marketing_data());
        assert!(!nurse.is_admin());

        let marketing = snapshot_with(Role::MarketingManager);
        assert!(marketing.can_access_marketing_data());
        assert!(!marketing.can_access_clinical_data());

        let admin = snapshot_with(Role::PracticeAdmin);
        assert!(admin.is_admin());
        assert!(admin.can_access_clinical_data());
        assert!(admin.can_access_marketing_data());
    }

    #[test]
    fn test_has_role() {
        let receptionist = snapshot_with(Role::Receptionist);
        assert!(receptionist.has_role(&[]));
        assert!(receptionist.has_role(&[Role::Receptionist, Role::Nurse]));
        assert!(!receptionist.has_role(&[Role::Clinician]));

        let signed_out = AuthSnapshot::signed_out();
        assert!(!signed_out.has_role(&[]));
        assert!(!signed_out.is_admin());
    }

    #[test]
    fn test_empty_token_is_never_a_bearer() {
        let session = Session::new(Uuid::new_v4(), "", Utc::now());
        assert_eq!(session.bearer_token(), None);

        let session = Session::new(Uuid::new_v4(), "abc", Utc::now());
        assert_eq!(session.bearer_token(), Some("abc"));
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = Session::new(Uuid::new_v4(), "very-secret", Utc::now());
        assert!(!format!("{:?}", session).contains("very-secret"));
    }

    #[test]
    fn test_profile_wire_shape() {
        let json = serde_json::json!({
            "id": "6f1f3a02-8a4e-4a55-9f0b-3df5a4a1c001",
            "role": "clinician",
            "fullName": "Dana Reyes",
            "email": "dana@clinic.example"
        });
        let profile: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.role, Role::Clinician);
        assert_eq!(profile.tenant_id, None);
    }
}
