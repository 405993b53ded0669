//! Session management for the RustCare client gateway
//!
//! This crate owns "who is the caller":
//! - Tracks the identity provider's session and its auth-state stream
//! - Fetches the authoritative profile (role, name, tenant) after every
//!   sign-in and token refresh
//! - Forces a sign-out when the profile cannot be obtained
//! - Exposes local role predicates used only to short-circuit obvious denials
//!
//! # Example
//!
//! ```rust,no_run
//! use auth_identity::{InMemoryIdentityProvider, InMemoryProfileStore, SessionManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SessionManager::new(
//!         Arc::new(InMemoryIdentityProvider::new()),
//!         Arc::new(InMemoryProfileStore::new()),
//!     );
//!     manager.initialize().await?;
//!
//!     let _subscription = manager.on_change(|snapshot| {
//!         println!("authenticated: {}", snapshot.is_authenticated());
//!     });
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod provider;
pub mod repository;
pub mod service;
pub mod subscription;

pub use error::*;
pub use models::*;
pub use provider::{IdentityProvider, InMemoryIdentityProvider};
pub use repository::{InMemoryProfileStore, ProfileStore};
pub use service::SessionManager;
pub use subscription::Subscription;
