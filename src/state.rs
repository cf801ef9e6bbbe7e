use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::database::{ConnectionBackend, ConnectionManager, MySqlBackend};
use crate::middleware::rate_limit::RateLimiter;
use crate::services::onboarding_service::OnboardingService;
use crate::services::trust_service::TrustService;
use crate::tenant::{MySqlTrustSource, TrustContextResolver};
use crate::wizard::onboarding::OnboardingPayload;
use crate::wizard::WizardSessions;

/// Process-wide handles shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub connections: Arc<ConnectionManager>,
    pub trust_contexts: Arc<TrustContextResolver>,
    pub wizard_sessions: Arc<WizardSessions<OnboardingPayload>>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Self {
        let backend: Arc<dyn ConnectionBackend<MySqlPool>> = Arc::new(MySqlBackend::from_config(&config));
        let connections = Arc::new(ConnectionManager::new(backend));
        let trust_contexts = Arc::new(TrustContextResolver::new(
            Arc::new(MySqlTrustSource::new(connections.clone())),
            Duration::from_secs(config.tenancy.trust_cache_ttl_secs),
        ));
        Self::new(config, connections, trust_contexts)
    }

    /// Assemble state around existing connection and context handles.
    pub fn new(
        config: AppConfig,
        connections: Arc<ConnectionManager>,
        trust_contexts: Arc<TrustContextResolver>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            Duration::from_secs(config.api.rate_limit_window_secs),
            config.api.rate_limit_requests,
            config.api.auth_rate_limit_requests,
        )
        .trusting_proxies(config.api.trusted_proxies.clone()));
        Self {
            config: Arc::new(config),
            connections,
            trust_contexts,
            wizard_sessions: Arc::new(WizardSessions::new()),
            rate_limiter,
        }
    }

    pub fn trust_service(&self) -> TrustService {
        TrustService::new(self.connections.clone(), self.trust_contexts.clone())
    }

    pub fn onboarding(&self) -> OnboardingService {
        OnboardingService::new(
            self.config.tenancy.wizard_timeout_minutes,
            self.wizard_sessions.clone(),
            self.connections.clone(),
            self.trust_service(),
        )
    }
}
