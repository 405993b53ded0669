use audit_engine::{event_types, AuditLogger};
use auth_identity::{SessionManager, Subscription};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ServerValidationClient;

pub const HEALTH_PATH: &str = "/health";

/// Last known liveness of the validation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            healthy: true,
            last_checked_at: None,
        }
    }
}

struct MonitorState {
    task: Option<JoinHandle<()>>,
    /// Bumped on every start and stop; results of an older run are ignored
    run: u64,
    status: HealthStatus,
}

/// Periodic liveness probe of the validation service
///
/// Runs only while a session is active. The probe task is the one
/// background task of the gateway and is cancelled exactly once per session
/// end.
pub struct HealthMonitor {
    client: Arc<ServerValidationClient>,
    audit: Arc<AuditLogger>,
    interval: Duration,
    probe_timeout: Duration,
    state: Mutex<MonitorState>,
    starts: AtomicU64,
    stops: AtomicU64,
    session_link: Mutex<Option<Subscription>>,
}

impl HealthMonitor {
    pub fn new(
        client: Arc<ServerValidationClient>,
        audit: Arc<AuditLogger>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            audit,
            interval,
            probe_timeout,
            state: Mutex::new(MonitorState {
                task: None,
                run: 0,
                status: HealthStatus::default(),
            }),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            session_link: Mutex::new(None),
        })
    }

    pub fn status(&self) -> HealthStatus {
        self.state.lock().status
    }

    pub fn is_healthy(&self) -> bool {
        self.status().healthy
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().task.is_some()
    }

    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }

    /// Follow the session: probe while signed in, stop on sign-out
    pub fn follow(self: &Arc<Self>, sessions: &SessionManager) {
        let monitor: Weak<Self> = Arc::downgrade(self);
        let applied = sessions.watch();
        let subscription = sessions.on_change(move |snapshot| {
            let Some(monitor) = monitor.upgrade() else {
                return;
            };
            // Only start for a session that is still the applied one
            if snapshot.session.is_some() && applied.borrow().session.is_some() {
                monitor.start();
            } else {
                monitor.stop();
            }
        });
        *self.session_link.lock() = Some(subscription);

        if sessions.current().is_some() {
            self.start();
        }
    }

    /// Stop following the session and stop probing
    pub fn detach(&self) {
        if let Some(subscription) = self.session_link.lock().take() {
            subscription.cancel();
        }
        self.stop();
    }

    /// Start probing: once immediately, then every interval. No-op while running.
    pub fn start(self: &Arc<Self>) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime; health monitor not started");
                return false;
            }
        };

        let mut state = self.state.lock();
        if state.task.is_some() {
            return false;
        }
        state.run += 1;
        let run = state.run;

        let monitor = Arc::downgrade(self);
        let interval = self.interval;
        state.task = Some(runtime.spawn(async move {
            loop {
                let Some(strong) = monitor.upgrade() else {
                    break;
                };
                strong.probe_for_run(run).await;
                drop(strong);
                tokio::time::sleep(interval).await;
            }
        }));
        self.starts.fetch_add(1, Ordering::SeqCst);
        info!(interval_secs = interval.as_secs(), "Health monitor started");
        true
    }

    /// Cancel the probe task and reset the status. Returns false if not running.
    pub fn stop(&self) -> bool {
        let task = {
            let mut state = self.state.lock();
            let Some(task) = state.task.take() else {
                return false;
            };
            state.run += 1;
            state.status = HealthStatus::default();
            task
        };
        task.abort();
        self.stops.fetch_add(1, Ordering::SeqCst);
        info!("Health monitor stopped");
        true
    }

    /// Probe once outside the periodic schedule and record the result
    pub async fn check_now(&self) -> HealthStatus {
        let run = self.state.lock().run;
        self.probe_for_run(run).await;
        self.status()
    }

    async fn probe_for_run(&self, run: u64) {
        let healthy = self.client.probe(HEALTH_PATH, self.probe_timeout).await;
        let checked_at = Utc::now();

        let was_healthy = {
            let mut state = self.state.lock();
            if state.run != run {
                debug!("Discarding probe result from a stopped run");
                return;
            }
            let was_healthy = state.status.healthy;
            state.status = HealthStatus {
                healthy,
                last_checked_at: Some(checked_at),
            };
            was_healthy
        };

        if was_healthy && !healthy {
            warn!("Validation service became unhealthy");
            let mut metadata = Map::new();
            metadata.insert("endpoint".to_string(), json!(HEALTH_PATH));
            metadata.insert("checkedAt".to_string(), json!(checked_at.to_rfc3339()));
            self.audit.log_event(event_types::HEALTH_CHECK_FAILED, metadata);
        } else if !was_healthy && healthy {
            info!("Validation service recovered");
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().task.take() {
            task.abort();
        }
    }
}
