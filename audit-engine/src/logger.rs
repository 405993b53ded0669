use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use config_engine::AuditConfig;
use error_common::AccessError;
use logger_redacted::PiiRedactor;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::AuditError;
use crate::event::SecurityEvent;
use crate::sink::AuditSink;

/// Fire-and-forget security event emitter
///
/// `log_event` never fails and never blocks: delivery runs on its own task
/// and a delivery failure is recorded locally as a `LoggingFailure`. A down
/// logging pipe must not turn into an application outage.
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    config: AuditConfig,
    redactor: PiiRedactor,
    pending: Mutex<Vec<JoinHandle<()>>>,
    failures: Arc<AtomicU64>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Self {
        Self {
            sink,
            config,
            redactor: PiiRedactor::default(),
            pending: Mutex::new(Vec::new()),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit one security event
    pub fn log_event(&self, event_type: &str, metadata: Map<String, Value>) {
        if !self.config.enabled {
            debug!(event_type = event_type, "Security event logging disabled; event not emitted");
            return;
        }

        let metadata = if self.config.redact_metadata {
            match self.redactor.redact_json(&Value::Object(metadata)) {
                Value::Object(redacted) => redacted,
                _ => Map::new(),
            }
        } else {
            metadata
        };

        let event = SecurityEvent::new(event_type, metadata);
        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            risk_level = %event.risk_level,
            "Security event emitted"
        );

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                record_failure(&self.failures, &event, &AuditError::NoRuntime);
                return;
            }
        };

        let sink = self.sink.clone();
        let failures = self.failures.clone();
        let task = runtime.spawn(async move {
            if let Err(e) = sink.deliver(&event).await {
                record_failure(&failures, &event, &e);
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|handle| !handle.is_finished());
        pending.push(task);
    }

    /// Wait until every delivery started so far has finished
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.pending.lock());
        for handle in handles {
            // A panicking sink is a delivery failure like any other
            if handle.await.is_err() {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of events that could not be delivered
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn record_failure(failures: &AtomicU64, event: &SecurityEvent, error: &AuditError) {
    failures.fetch_add(1, Ordering::Relaxed);
    let failure = AccessError::LoggingFailure {
        reason: error.to_string(),
    };
    error_common::log_error("audit", &failure);
    logger_redacted::redacted_warn!(
        "Undelivered security event {} [{}] {}",
        event.event_type,
        event.risk_level,
        Value::Object(event.metadata.clone())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{event_types, RiskLevel};
    use crate::sink::{FailingAuditSink, InMemoryAuditSink};
    use serde_json::json;

    fn metadata(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_event_is_delivered_with_risk_level() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let logger = AuditLogger::new(sink.clone(), AuditConfig::default());

        logger.log_event(
            event_types::ACCESS_VALIDATION_DENIED,
            metadata(&[("requiredRole", json!("admin"))]),
        );
        logger.flush().await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].risk_level, RiskLevel::High);
        assert_eq!(logger.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let logger = AuditLogger::new(Arc::new(FailingAuditSink), AuditConfig::default());

        logger.log_event(event_types::ACCESS_VALIDATION_GRANTED, Map::new());
        logger.log_event(event_types::CLIENT_POLICY_DENIED, Map::new());
        logger.flush().await;

        assert_eq!(logger.failure_count(), 2);
    }

    #[tokio::test]
    async fn test_metadata_is_redacted_before_delivery() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let logger = AuditLogger::new(sink.clone(), AuditConfig::default());

        logger.log_event(
            event_types::CSRF_TOKEN_REFRESHED,
            metadata(&[("csrfToken", json!("secret-value")), ("endpoint", json!("/appointments"))]),
        );
        logger.flush().await;

        let event = &sink.events()[0];
        assert_ne!(event.metadata["csrfToken"], "secret-value");
        assert_eq!(event.metadata["endpoint"], "/appointments");
    }

    #[tokio::test]
    async fn test_disabled_logger_emits_nothing() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let config = AuditConfig {
            enabled: false,
            ..Default::default()
        };
        let logger = AuditLogger::new(sink.clone(), config);

        logger.log_event(event_types::ACCESS_VALIDATION_GRANTED, Map::new());
        logger.flush().await;

        assert!(sink.is_empty());
    }

    #[test]
    fn test_log_event_without_runtime_does_not_panic() {
        let logger = AuditLogger::new(Arc::new(InMemoryAuditSink::new()), AuditConfig::default());
        logger.log_event(event_types::ACCESS_VALIDATION_GRANTED, Map::new());
        assert_eq!(logger.failure_count(), 1);
    }
}
