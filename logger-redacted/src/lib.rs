//! HIPAA-compliant logging for the RustCare client gateway
//!
//! Log text and security-event metadata can carry bearer tokens, CSRF tokens
//! and e-mail addresses. Everything the gateway writes locally or ships to the
//! security log passes through [`PiiRedactor`] first.
//!
//! # Detected Data Types
//!
//! - **Bearer tokens**: `Bearer eyJ...` → `Bearer [REDACTED]`
//! - **JWTs**: `eyJhbGciOi...` → `JWT[REDACTED]`
//! - **Email Addresses**: user@example.com → EMAIL[hash] or u***@e***
//! - **Phone Numbers**: (555) 123-4567 → PHONE[hash] or (***) ***-****
//! - **Sensitive metadata keys**: `token`, `csrfToken`, `authorization`, `email`, ...
//!
//! # Example
//!
//! ```rust,no_run
//! use config_engine::LoggingConfig;
//! use logger_redacted::{init_tracing, redacted_info};
//!
//! init_tracing(&LoggingConfig::default()).expect("subscriber installed once");
//! redacted_info!("User {} signed in", "john.doe@example.com");
//! // Output: "User EMAIL[...] signed in"
//! ```

pub mod redactor;
pub mod macros;

pub use redactor::*;

use config_engine::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::{fmt, fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Tracing subscriber initialization failed: {0}")]
    InitError(String),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. Fails if a subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggerError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggerError::InitError(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
            .map_err(|e| LoggerError::InitError(e.to_string()))
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_level(true),
            )
            .try_init()
            .map_err(|e| LoggerError::InitError(e.to_string()))
    }
}
