use async_trait::async_trait;
use audit_engine::{AuditError, AuditSink, SecurityEvent};
use logger_redacted::redacted_warn;
use std::sync::{Arc, OnceLock, Weak};

use crate::client::{ApiRequest, ServerValidationClient};

pub const SECURITY_LOG_PATH: &str = "/security/log";

/// Ships security events to `POST /security/log`
///
/// The sink is created before the client it sends through (the client itself
/// emits events), so the client is attached afterwards. Events delivered
/// before [`HttpAuditSink::attach`] fail and are recorded locally.
#[derive(Debug, Default)]
pub struct HttpAuditSink {
    client: OnceLock<Weak<ServerValidationClient>>,
}

impl HttpAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a client was already attached
    pub fn attach(&self, client: &Arc<ServerValidationClient>) -> bool {
        self.client.set(Arc::downgrade(client)).is_ok()
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn deliver(&self, event: &SecurityEvent) -> audit_engine::Result<()> {
        let client = self
            .client
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| AuditError::DeliveryFailed("security log client not attached".to_string()))?;

        let payload = serde_json::to_value(event.to_payload())?;
        let request = ApiRequest::post(SECURITY_LOG_PATH).json(payload).without_audit();

        client.request(request).await.map(|_| ()).map_err(|e| {
            redacted_warn!("Security log rejected event {}: {}", event.event_type, e);
            AuditError::DeliveryFailed(e.to_string())
        })
    }
}
