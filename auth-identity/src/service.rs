use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{IdentityError, Result};
use crate::models::{AuthEvent, AuthSnapshot, AuthStateChange, Credentials, Role, Session, UserProfile};
use crate::provider::IdentityProvider;
use crate::repository::ProfileStore;
use crate::subscription::{SubscriberRegistry, Subscription};

/// SessionManager owns the current identity
///
/// It listens to the identity provider's auth-state stream and, after every
/// sign-in or token refresh, re-fetches the authoritative profile from the
/// profile store. If that fetch fails the manager signs out instead of
/// keeping a half-authenticated state.
///
/// The manager is the only writer of the session. Every change publishes a
/// complete new [`AuthSnapshot`]; readers never see a partial update.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,

    /// Current snapshot, replaced atomically
    state: watch::Sender<Arc<AuthSnapshot>>,

    /// Bumped on every auth event; a profile fetch tagged with an older epoch
    /// is discarded when it completes
    epoch: Mutex<u64>,

    subscribers: Arc<SubscriberRegistry>,

    /// Held while callbacks run so they observe snapshots in publish order
    notify: Mutex<()>,

    /// Provider event listener, present between `initialize` and `shutdown`
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Arc<Self> {
        let (state, _) = watch::channel(Arc::new(AuthSnapshot::default()));
        Arc::new(Self {
            provider,
            profiles,
            state,
            epoch: Mutex::new(0),
            subscribers: Arc::new(SubscriberRegistry::default()),
            notify: Mutex::new(()),
            listener: Mutex::new(None),
        })
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    /// Resolve the provider's current session and start listening for changes.
    ///
    /// Calling it again while initialized is a no-op. On a provider error the
    /// manager still initializes, signed out, and returns the error.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        if self.listener.lock().is_some() {
            debug!("Session manager already initialized");
            return Ok(());
        }

        // Subscribe before resolving so no event between the two is lost
        let events = self.provider.subscribe();
        let epoch = self.bump_epoch();

        let resolved = self.provider.current_session().await;
        let outcome = match resolved {
            Ok(Some(session)) => {
                // A failed profile fetch already forced a sign-out
                let _ = self.establish(epoch, session).await;
                Ok(())
            }
            Ok(None) => {
                self.publish(epoch, AuthSnapshot::signed_out());
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Identity provider could not resolve the current session");
                self.publish(epoch, AuthSnapshot::signed_out());
                Err(e)
            }
        };

        let handle = tokio::spawn(listen(Arc::downgrade(self), events));
        let mut listener = self.listener.lock();
        if let Some(previous) = listener.replace(handle) {
            // Lost a race with a concurrent initialize; keep exactly one listener
            previous.abort();
        }

        outcome
    }

    /// Stop listening to the provider. Returns false if it was not listening.
    pub fn shutdown(&self) -> bool {
        match self.listener.lock().take() {
            Some(handle) => {
                handle.abort();
                info!("Session manager stopped");
                true
            }
            None => false,
        }
    }

    // =============================================================================
    // Reads
    // =============================================================================

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn snapshot(&self) -> Arc<AuthSnapshot> {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn watch(&self) -> watch::Receiver<Arc<AuthSnapshot>> {
        self.state.subscribe()
    }

    /// Suspend until the first provider resolution has completed
    pub async fn wait_initialized(&self) -> Arc<AuthSnapshot> {
        let mut receiver = self.state.subscribe();
        loop {
            let snapshot = receiver.borrow_and_update().clone();
            if snapshot.initialized {
                return snapshot;
            }
            if receiver.changed().await.is_err() {
                return snapshot;
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.snapshot().user_profile().cloned()
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.snapshot().has_role(roles)
    }

    pub fn can_access_clinical_data(&self) -> bool {
        self.snapshot().can_access_clinical_data()
    }

    pub fn can_access_marketing_data(&self) -> bool {
        self.snapshot().can_access_marketing_data()
    }

    pub fn is_admin(&self) -> bool {
        self.snapshot().is_admin()
    }

    // =============================================================================
    // Subscriptions
    // =============================================================================

    /// Register a callback invoked with every new snapshot
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthSnapshot) + Send + Sync + 'static,
    {
        let id = self.subscribers.register(Arc::new(callback));
        Subscription::new(id, &self.subscribers)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    // =============================================================================
    // Sign-in / sign-out
    // =============================================================================

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let session = self.provider.sign_in(credentials).await?;
        let epoch = self.bump_epoch();
        self.establish(epoch, session.clone()).await?;
        info!(subject_id = %session.subject_id, "Signed in");
        Ok(session)
    }

    /// Clear local state first, then tell the provider
    pub async fn sign_out(&self) -> Result<()> {
        let epoch = self.bump_epoch();
        self.publish(epoch, AuthSnapshot::signed_out());
        self.provider.sign_out().await
    }

    // =============================================================================
    // Internals
    // =============================================================================

    async fn handle_change(&self, change: AuthStateChange) {
        debug!(event = ?change.event, has_session = change.session.is_some(), "Auth state change");
        match (change.event, change.session) {
            (AuthEvent::SignedOut, _) | (_, None) => {
                let epoch = self.bump_epoch();
                self.publish(epoch, AuthSnapshot::signed_out());
            }
            (AuthEvent::SignedIn | AuthEvent::TokenRefreshed, Some(session)) => {
                let epoch = self.bump_epoch();
                let _ = self.establish(epoch, session).await;
            }
        }
    }

    /// Fetch the authoritative profile for `session` and publish it, or force a
    /// sign-out when the profile cannot be obtained
    async fn establish(&self, epoch: u64, session: Session) -> Result<UserProfile> {
        let fetched = self
            .profiles
            .fetch_profile(session.subject_id)
            .await
            .and_then(|profile| {
                if profile.id == session.subject_id {
                    Ok(profile)
                } else {
                    Err(IdentityError::ProfileMismatch {
                        expected: session.subject_id,
                        actual: profile.id,
                    })
                }
            });

        match fetched {
            Ok(profile) => {
                self.publish(epoch, AuthSnapshot::signed_in(session, profile.clone()));
                Ok(profile)
            }
            Err(e) => {
                warn!(subject_id = %session.subject_id, error = %e, "Profile fetch failed; forcing sign-out");
                if self.publish(epoch, AuthSnapshot::signed_out()) {
                    if let Err(sign_out_error) = self.provider.sign_out().await {
                        warn!(error = %sign_out_error, "Identity provider sign-out failed");
                    }
                }
                Err(e)
            }
        }
    }

    fn bump_epoch(&self) -> u64 {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        *epoch
    }

    /// Publish `snapshot` if `epoch` is still current. Returns whether it was applied.
    ///
    /// Callbacks run under the notify lock and only for a snapshot that is
    /// still current once the lock is held, so the last notification any
    /// subscriber sees is always the applied state.
    fn publish(&self, epoch: u64, snapshot: AuthSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        {
            let current = self.epoch.lock();
            if *current != epoch {
                debug!(epoch, current = *current, "Discarding stale auth state");
                return false;
            }
            self.state.send_replace(snapshot.clone());
        }

        let _notifying = self.notify.lock();
        let current = *self.epoch.lock();
        if current != epoch {
            debug!(epoch, current, "Superseded before notifying subscribers");
            return true;
        }
        self.subscribers.notify(&snapshot);
        true
    }
}

async fn listen(manager: std::sync::Weak<SessionManager>, mut events: broadcast::Receiver<AuthStateChange>) {
    loop {
        match events.recv().await {
            Ok(change) => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_change(change).await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Auth state listener lagged behind the provider");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
