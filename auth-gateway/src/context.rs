use audit_engine::{AuditLogger, AuditSink};
use auth_identity::{IdentityProvider, ProfileStore, SessionManager};
use config_engine::GatewayConfig;
use std::sync::Arc;
use tracing::info;

use crate::audit_sink::HttpAuditSink;
use crate::client::{ClientSettings, ServerValidationClient};
use crate::clock::{Sleeper, TokioSleeper};
use crate::error::GatewayError;
use crate::guard::{GuardDeps, GuardSettings, RouteGuard};
use crate::health::HealthMonitor;
use crate::policy::GuardOptions;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::validator::AccessValidator;

/// Process-scoped gateway
///
/// Constructed once, started once, shut down once. Owns the session manager,
/// the validation client (and with it the CSRF cache), the health monitor and
/// the audit logger, and hands them to every guard it creates.
pub struct GatewayContext {
    config: GatewayConfig,
    sessions: Arc<SessionManager>,
    client: Arc<ServerValidationClient>,
    validator: Arc<AccessValidator>,
    health: Arc<HealthMonitor>,
    audit: Arc<AuditLogger>,
}

impl GatewayContext {
    pub fn builder(
        config: GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> GatewayContextBuilder {
        GatewayContextBuilder {
            config,
            provider,
            profiles,
            transport: None,
            sleeper: None,
            sink: None,
        }
    }

    /// Resolve the current session and start following it.
    ///
    /// The health monitor runs from here on whenever a session is active.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let resolved = self.sessions.initialize().await;
        self.health.follow(&self.sessions);
        info!(api_base_url = %self.config.api_base_url, "Access gateway started");
        resolved.map_err(GatewayError::from)
    }

    /// Stop probing, stop following the identity provider and drain
    /// pending security events
    pub async fn shutdown(&self) {
        self.health.detach();
        self.sessions.shutdown();
        self.audit.flush().await;
        info!("Access gateway stopped");
    }

    /// Guard for one page or action
    pub fn guard(&self, options: GuardOptions) -> RouteGuard {
        RouteGuard::new(self.guard_deps(), options)
    }

    pub fn guard_deps(&self) -> GuardDeps {
        GuardDeps {
            sessions: self.sessions.clone(),
            validator: self.validator.clone(),
            health: self.health.clone(),
            audit: self.audit.clone(),
            settings: GuardSettings::from(&self.config),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn client(&self) -> &Arc<ServerValidationClient> {
        &self.client
    }

    pub fn validator(&self) -> &Arc<AccessValidator> {
        &self.validator
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }
}

pub struct GatewayContextBuilder {
    config: GatewayConfig,
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    transport: Option<Arc<dyn HttpTransport>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    sink: Option<Arc<dyn AuditSink>>,
}

impl GatewayContextBuilder {
    /// Defaults to a `reqwest` transport against `api_base_url`
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Defaults to real tokio sleeps
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Defaults to `POST /security/log` through the gateway's own client
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<GatewayContext, GatewayError> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.api_base_url.clone(), config.request_timeout())?),
        };
        let sleeper: Arc<dyn Sleeper> = match self.sleeper {
            Some(sleeper) => sleeper,
            None => Arc::new(TokioSleeper),
        };

        let (sink, http_sink): (Arc<dyn AuditSink>, Option<Arc<HttpAuditSink>>) = match self.sink {
            Some(sink) => (sink, None),
            None => {
                let http_sink = Arc::new(HttpAuditSink::new());
                let shared: Arc<dyn AuditSink> = http_sink.clone();
                (shared, Some(http_sink))
            }
        };
        let audit = Arc::new(AuditLogger::new(sink, config.audit.clone()));

        let sessions = SessionManager::new(self.provider, self.profiles);
        let client = Arc::new(ServerValidationClient::new(
            transport,
            sessions.clone(),
            sleeper,
            audit.clone(),
            ClientSettings::from(&config),
        ));
        if let Some(http_sink) = http_sink {
            let _ = http_sink.attach(&client);
        }

        let validator = Arc::new(AccessValidator::new(client.clone(), audit.clone()));
        let health = HealthMonitor::new(
            client.clone(),
            audit.clone(),
            config.health_interval(),
            config.probe_timeout(),
        );

        Ok(GatewayContext {
            config,
            sessions,
            client,
            validator,
            health,
            audit,
        })
    }
}
