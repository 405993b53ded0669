use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AuditError, Result};
use crate::event::SecurityEvent;

/// Destination of security events
///
/// The gateway ships events to `POST /security/log`; tests and local tools
/// use the in-memory sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, event: &SecurityEvent) -> Result<()>;
}

/// In-memory sink for development/testing
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn deliver(&self, event: &SecurityEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Sink whose pipe is always down
#[derive(Debug, Default)]
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn deliver(&self, _event: &SecurityEvent) -> Result<()> {
        Err(AuditError::DeliveryFailed("security log endpoint unreachable".to_string()))
    }
}
