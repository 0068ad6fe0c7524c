use crate::config::FheConfig;
use crate::engine::EngineFactory;
use crate::error::Result;
use crate::readiness::probe_http_client;
use crate::retry::RetryPolicy;
use crate::session::SessionManager;
use std::sync::Arc;

/// Entry point of the FHE orchestration layer: readiness checks, encryption
/// and user decryption on top of a lazily built engine session.
///
/// The readiness, encryption and decryption operations live in their own
/// modules as further `impl` blocks of this type.
pub struct FhevmClient<F: EngineFactory> {
    pub(crate) sessions: SessionManager<F>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) http: reqwest::Client,
}

impl<F: EngineFactory> FhevmClient<F> {
    pub fn new(config: FheConfig, factory: F) -> Result<Self> {
        Ok(Self {
            sessions: SessionManager::new(factory, config),
            retry_policy: RetryPolicy::default(),
            http: probe_http_client()?,
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn config(&self) -> &FheConfig {
        self.sessions.config()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn factory(&self) -> &F {
        self.sessions.factory()
    }

    /// Shared engine session, see [`SessionManager::get_or_create`].
    pub async fn session(&self) -> Result<Arc<F::Engine>> {
        self.sessions.get_or_create().await
    }
}
