//! Configuration management for the RustCare client access gateway
//!
//! This module provides layered configuration with:
//! - Built-in defaults for every setting
//! - An optional file source (TOML, YAML or JSON, picked by extension)
//! - Environment variable overrides (`RUSTCARE_GATEWAY_*`, `__` for nesting)
//! - Validation before the configuration is handed to the gateway
//!
//! # Example
//!
//! ```rust,no_run
//! use config_engine::{ConfigLoader, FailurePolicy};
//!
//! let config = ConfigLoader::new()
//!     .with_file("rustcare-gateway.toml")
//!     .load()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.failure_policy, FailurePolicy::FailClosed);
//! ```

pub mod engine;
pub mod gateway;
pub mod error;

pub use engine::*;
pub use gateway::*;
pub use error::{ConfigError, Result};
