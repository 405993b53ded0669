//! Common error handling utilities for the RustCare client access gateway
//!
//! This module provides the access-control error taxonomy, stable error codes,
//! and recovery affordances used by every gateway component. It ensures that
//! each denial surfaces a human-readable reason and at least one way out.
//!
//! # Error Categories
//!
//! - **AuthenticationRequired**: No session; redirect to login preserving the location
//! - **ServiceUnavailable**: Validation transport is down (fail-closed)
//! - **AccessDenied**: Authoritative "no" from the authorization server
//! - **ClientPolicyDenied**: Local role/permission short-circuit
//! - **ValidationError**: Indeterminate or malformed server answer
//! - **LoggingFailure**: Audit delivery failure, always swallowed
//!
//! # Example
//!
//! ```rust
//! use error_common::{AccessError, ErrorContext, RecoveryAction};
//!
//! let error = AccessError::AccessDenied {
//!     reason: "insufficient role".to_string(),
//!     context: ErrorContext::new()
//!         .with_current_role(Some("nurse"))
//!         .with_required_role("admin"),
//! };
//!
//! assert!(error.is_authoritative());
//! assert!(error.recovery_actions("/dashboard").contains(&RecoveryAction::GoBack));
//! ```

pub mod types;
pub mod context;
pub mod codes;
pub mod recovery;

pub use types::*;
pub use context::*;
pub use recovery::*;
