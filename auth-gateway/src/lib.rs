//! Server-validated access-control gateway for RustCare client applications
//!
//! Every protected page and every mutating call passes through this crate.
//! The client's own idea of the caller's role is never trusted: each guarded
//! operation is re-confirmed with the authorization server.
//!
//! # Components
//!
//! - [`ServerValidationClient`]: bearer token, request id, role hint and CSRF
//!   token on every call; bounded 401 retry, no 403 retry, one CSRF refresh
//! - [`AccessValidator`]: one `POST /auth/validate` per guarded operation,
//!   audited every time
//! - [`HealthMonitor`]: liveness probing while a session is active
//! - [`RouteGuard`]: the state machine composing all of the above
//! - [`GatewayContext`]: process-scoped wiring with explicit start/shutdown
//!
//! The `testing` feature exposes scripted fakes for the transport and
//! backoff seams.
//!
//! # Example
//!
//! ```rust,no_run
//! use auth_gateway::{GatewayContext, GuardOptions, Guarded};
//! use auth_identity::{InMemoryIdentityProvider, InMemoryProfileStore};
//! use config_engine::GatewayConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = GatewayContext::builder(
//!         GatewayConfig::default(),
//!         Arc::new(InMemoryIdentityProvider::new()),
//!         Arc::new(InMemoryProfileStore::new()),
//!     )
//!     .build()?;
//!     gateway.start().await?;
//!
//!     let guard = gateway.guard(GuardOptions::new("/patients").clinical());
//!     match guard.render(|| "patient list").await {
//!         Guarded::Allowed { content, .. } => println!("{}", content),
//!         Guarded::Denied(state) => println!("denied: {:?}", state.reason()),
//!     }
//!
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod audit_sink;
pub mod client;
pub mod clock;
pub mod context;
pub mod csrf;
pub mod error;
pub mod guard;
pub mod health;
pub mod policy;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod validator;

pub use audit_sink::HttpAuditSink;
pub use client::{ApiRequest, ApiResponse, ClientSettings, ServerValidationClient};
pub use clock::{Sleeper, TokioSleeper};
pub use context::{GatewayContext, GatewayContextBuilder};
pub use csrf::{CsrfCache, CsrfToken};
pub use error::{ClientError, GatewayError, TransportError};
pub use guard::{AllowMode, GuardDeps, GuardSettings, GuardState, Guarded, LoginRedirect, RouteGuard};
pub use health::{HealthMonitor, HealthStatus};
pub use policy::{GuardOptions, LocalDenial};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
pub use validator::{AccessDecision, AccessRequirement, AccessValidator, PrimaryRole};
