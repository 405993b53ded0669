// Error codes implementation
// Stable codes attached to every access-control failure surfaced by the gateway

pub mod authentication {
    pub const AUTHENTICATION_REQUIRED: &str = "AUTH_2001";
    pub const SESSION_INVALID: &str = "AUTH_2003";
}

pub mod authorization {
    pub const ACCESS_DENIED: &str = "AUTHZ_3001";
    pub const CLIENT_POLICY_DENIED: &str = "AUTHZ_3002";
}

pub mod validation {
    pub const SERVICE_UNAVAILABLE: &str = "VALIDATION_5001";
    pub const INDETERMINATE_RESPONSE: &str = "VALIDATION_5002";
}

pub mod audit {
    pub const LOGGING_FAILURE: &str = "AUDIT_6001";
}
