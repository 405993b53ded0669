use auth_identity::{AuthSnapshot, Role};
use config_engine::FailurePolicy;

use crate::validator::AccessRequirement;

/// What a guarded page or action requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOptions {
    /// Location being guarded; captured for the post-login return and sent
    /// to the server as the validated endpoint
    pub location: String,
    pub required_roles: Vec<Role>,
    pub required_permissions: Vec<String>,
    pub require_auth: bool,
    pub require_clinical_access: bool,
    pub require_marketing_access: bool,
    pub require_admin_access: bool,
    /// Emergency-access escape hatch: skip the server round trip (audited)
    pub bypass_server_validation: bool,
    /// Overrides the configured policy for this guard only
    pub failure_policy: Option<FailurePolicy>,
}

impl GuardOptions {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            required_roles: Vec::new(),
            required_permissions: Vec::new(),
            require_auth: true,
            require_clinical_access: false,
            require_marketing_access: false,
            require_admin_access: false,
            bypass_server_validation: false,
            failure_policy: None,
        }
    }

    /// Public resource: allowed once initialization completes
    pub fn public(location: impl Into<String>) -> Self {
        Self {
            require_auth: false,
            ..Self::new(location)
        }
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.required_roles = roles.into_iter().collect();
        self
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn clinical(mut self) -> Self {
        self.require_clinical_access = true;
        self
    }

    pub fn marketing(mut self) -> Self {
        self.require_marketing_access = true;
        self
    }

    pub fn admin(mut self) -> Self {
        self.require_admin_access = true;
        self
    }

    pub fn bypass(mut self) -> Self {
        self.bypass_server_validation = true;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    pub fn requirement(&self) -> AccessRequirement {
        AccessRequirement {
            admin: self.require_admin_access,
            clinical: self.require_clinical_access,
            marketing: self.require_marketing_access,
            roles: self.required_roles.clone(),
        }
    }

    /// Evaluate the client's own copy of the role.
    ///
    /// Passing proves nothing; failing is enough to skip the server.
    pub fn check_local(&self, snapshot: &AuthSnapshot) -> Result<(), LocalDenial> {
        if self.require_admin_access && !snapshot.is_admin() {
            return Err(LocalDenial::new("Administrator access is required", "admin"));
        }
        if self.require_clinical_access && !snapshot.can_access_clinical_data() {
            return Err(LocalDenial::new("Clinical data access is required", "clinical"));
        }
        if self.require_marketing_access && !snapshot.can_access_marketing_data() {
            return Err(LocalDenial::new("Marketing data access is required", "marketing"));
        }
        if !self.required_roles.is_empty() && !snapshot.has_role(&self.required_roles) {
            let required = self
                .required_roles
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(",");
            return Err(LocalDenial::new(
                format!("One of the roles [{}] is required", required),
                required,
            ));
        }
        Ok(())
    }
}

/// Why the local predicate failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDenial {
    pub reason: String,
    pub required: String,
}

impl LocalDenial {
    fn new(reason: impl Into<String>, required: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            required: required.into(),
        }
    }
}
