use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{IdentityError, Result};
use crate::models::{AuthEvent, AuthStateChange, Credentials, Session};

/// External identity provider
///
/// Issues bearer tokens and publishes an auth-state stream. The gateway never
/// reads role information from the provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Session the provider currently holds, if any
    async fn current_session(&self) -> Result<Option<Session>>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// Auth-state change stream
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;
}

const EVENT_BUFFER: usize = 32;

struct Account {
    password: String,
    subject_id: Uuid,
}

/// In-memory identity provider for development/testing
pub struct InMemoryIdentityProvider {
    session: Mutex<Option<Session>>,
    accounts: Mutex<HashMap<String, Account>>,
    events: broadcast::Sender<AuthStateChange>,
    sign_out_calls: AtomicUsize,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            session: Mutex::new(None),
            accounts: Mutex::new(HashMap::new()),
            events,
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Start with an already-established session
    pub fn with_session(self, session: Session) -> Self {
        *self.session.lock() = Some(session);
        self
    }

    pub fn with_account(self, email: impl Into<String>, password: impl Into<String>, subject_id: Uuid) -> Self {
        self.accounts.lock().insert(
            email.into(),
            Account {
                password: password.into(),
                subject_id,
            },
        );
        self
    }

    /// Publish a provider-originated event, e.g. a background token refresh
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.lock() = session.clone();
        // No receivers is fine: nobody is listening yet
        let _ = self.events.send(AuthStateChange { event, session });
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let subject_id = {
            let accounts = self.accounts.lock();
            let account = accounts
                .get(&credentials.email)
                .ok_or(IdentityError::InvalidCredentials)?;
            if account.password != *credentials.password.expose_secret() {
                return Err(IdentityError::InvalidCredentials);
            }
            account.subject_id
        };

        let session = Session::new(subject_id, Uuid::new_v4().to_string(), Utc::now() + Duration::hours(1));
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}
