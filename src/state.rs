//! Application state for dependency injection
//!
//! Handlers and middleware depend on the [`HasAuthz`] trait rather than on
//! [`AppState`] directly, so tests can assemble their own state.

use crate::config::Config;
use crate::jwt::JwtManager;
use crate::policy::PolicyRegistry;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Access to the collaborators of the authorization pipeline.
pub trait HasAuthz: Clone + Send + Sync + 'static {
    /// Get the application configuration
    fn config(&self) -> &Config;

    /// Get the JWT manager used to verify bearer tokens
    fn jwt_manager(&self) -> &JwtManager;

    /// Get the registry of named policies
    fn policies(&self) -> &Arc<PolicyRegistry>;

    /// Prometheus handle when metrics are enabled
    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        None
    }
}

/// Production application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt_manager: JwtManager,
    pub policies: Arc<PolicyRegistry>,
    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the state from configuration, loading the policy registry.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let jwt_manager = JwtManager::new(config.jwt.clone())?;
        let policies = Arc::new(PolicyRegistry::load(&config.authz)?);
        Ok(Self {
            config: Arc::new(config),
            jwt_manager,
            policies,
            prometheus_handle: None,
        })
    }

    pub fn with_prometheus_handle(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.prometheus_handle = handle;
        self
    }
}

impl HasAuthz for AppState {
    fn config(&self) -> &Config {
        &self.config
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        self.prometheus_handle.as_ref()
    }
}
