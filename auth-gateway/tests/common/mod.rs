//! Shared harness for the gateway integration tests
#![allow(dead_code)]

use audit_engine::{InMemoryAuditSink, SecurityEvent};
use auth_gateway::testing::{RecordingSleeper, ScriptedTransport};
use auth_gateway::{GatewayContext, HttpResponse};
use auth_identity::{InMemoryIdentityProvider, InMemoryProfileStore, Role, Session, UserProfile};
use chrono::{Duration, Utc};
use config_engine::GatewayConfig;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub const VALIDATE: &str = "/auth/validate";
pub const CSRF: &str = "/csrf-token";
pub const HEALTH: &str = "/health";

pub struct Harness {
    pub gateway: GatewayContext,
    pub transport: Arc<ScriptedTransport>,
    pub sleeper: Arc<RecordingSleeper>,
    pub sink: Arc<InMemoryAuditSink>,
    pub provider: Arc<InMemoryIdentityProvider>,
    pub subject: Uuid,
}

impl Harness {
    pub async fn events(&self) -> Vec<SecurityEvent> {
        self.gateway.audit().flush().await;
        self.sink.events()
    }

    pub async fn events_of_type(&self, event_type: &str) -> Vec<SecurityEvent> {
        self.gateway.audit().flush().await;
        self.sink.events_of_type(event_type)
    }
}

fn profile(subject: Uuid, role: Role) -> UserProfile {
    UserProfile {
        id: subject,
        role,
        full_name: "Jordan Lee".to_string(),
        email: "jordan@clinic.example".to_string(),
        tenant_id: None,
    }
}

async fn build(config: GatewayConfig, role: Option<Role>) -> Harness {
    let subject = Uuid::new_v4();
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .respond_always(HEALTH, HttpResponse::empty(200))
        .respond_always(CSRF, HttpResponse::json(200, &json!({"csrfToken": "csrf-default"})));

    let mut provider = InMemoryIdentityProvider::new();
    let mut profiles = InMemoryProfileStore::new();
    if let Some(role) = role {
        provider = provider.with_session(Session::new(subject, "access-token-1", Utc::now() + Duration::hours(1)));
        profiles = profiles.with_profile(profile(subject, role));
    }
    let provider = Arc::new(provider);

    let sleeper = Arc::new(RecordingSleeper::new());
    let sink = Arc::new(InMemoryAuditSink::new());
    let gateway = GatewayContext::builder(config, provider.clone(), Arc::new(profiles))
        .transport(transport.clone())
        .sleeper(sleeper.clone())
        .audit_sink(sink.clone())
        .build()
        .unwrap();
    gateway.start().await.unwrap();

    Harness {
        gateway,
        transport,
        sleeper,
        sink,
        provider,
        subject,
    }
}

pub async fn signed_in(role: Role) -> Harness {
    build(GatewayConfig::default(), Some(role)).await
}

pub async fn signed_in_with(config: GatewayConfig, role: Role) -> Harness {
    build(config, Some(role)).await
}

pub async fn signed_out() -> Harness {
    build(GatewayConfig::default(), None).await
}

pub fn granted(role: &str) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({"valid": true, "userRole": role, "userPermissions": [], "access_level": "full"}),
    )
}

pub fn denied(reason: &str) -> HttpResponse {
    HttpResponse::json(200, &json!({"valid": false, "userRole": "nurse", "error": reason}))
}

/// Yield until `condition` holds or give up
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    condition()
}
