//! Security event logging for the RustCare client access gateway
//!
//! This module provides the audit side of the gateway:
//! - Append-only security events with a risk level
//! - A pure, total risk classification used for alerting priority
//! - Fire-and-forget delivery that never fails the guarded operation
//! - Metadata redaction before an event leaves the process
//!
//! # Event Types
//!
//! - **Validation Events**: granted, denied, failed server validations
//! - **Short-circuit Events**: client policy denials, service-unavailable denials
//! - **Override Events**: bypassed validation, fail-open fallbacks
//! - **Infrastructure Events**: failed health probes, CSRF token refreshes
//!
//! # Example
//!
//! ```rust
//! use audit_engine::{classify_risk, RiskLevel};
//! use serde_json::Map;
//!
//! assert_eq!(classify_risk("access_validation_denied", &Map::new()), RiskLevel::High);
//! ```

pub mod event;
pub mod risk;
pub mod sink;
pub mod logger;
pub mod error;

pub use event::*;
pub use risk::*;
pub use sink::*;
pub use logger::*;
pub use error::{AuditError, Result};
