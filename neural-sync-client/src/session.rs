use crate::config::FheConfig;
use crate::engine::EngineFactory;
use crate::error::{record_error, EngineError, Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use observability::metrics::METRICS;
use observability::metrics_names::OP_SESSION_INIT;
use std::sync::Arc;
use tokio::sync::Mutex;

type Construction<E> = Shared<BoxFuture<'static, std::result::Result<Arc<E>, Arc<EngineError>>>>;

/// Owns the single long-lived engine instance.
///
/// The slot holds either nothing, the construction in flight or its
/// successful result. Every caller arriving while a construction is pending
/// awaits that same construction. A failed construction is evicted so the
/// next caller starts from scratch.
pub struct SessionManager<F: EngineFactory> {
    factory: Arc<F>,
    config: Arc<FheConfig>,
    slot: Mutex<Option<Construction<F::Engine>>>,
}

impl<F: EngineFactory> SessionManager<F> {
    pub fn new(factory: F, config: FheConfig) -> Self {
        Self {
            factory: Arc::new(factory),
            config: Arc::new(config),
            slot: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FheConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Returns the session, constructing it on first use.
    pub async fn get_or_create(&self) -> Result<Arc<F::Engine>> {
        let construction = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let fresh = construct(self.factory.clone(), self.config.clone())
                        .boxed()
                        .shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        match construction.clone().await {
            Ok(engine) => Ok(engine),
            Err(e) => {
                let mut slot = self.slot.lock().await;
                // only evict our own failed attempt, a newer one may already be in flight
                if slot
                    .as_ref()
                    .is_some_and(|current| current.ptr_eq(&construction))
                {
                    *slot = None;
                }
                Err(Error::SessionConstruction(e))
            }
        }
    }

    /// The constructed session if construction already succeeded, without
    /// triggering or awaiting anything.
    pub async fn current(&self) -> Option<Arc<F::Engine>> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .and_then(|pending| pending.peek())
            .and_then(|outcome| outcome.as_ref().ok().cloned())
    }
}

async fn construct<F: EngineFactory>(
    factory: Arc<F>,
    config: Arc<FheConfig>,
) -> std::result::Result<Arc<F::Engine>, Arc<EngineError>> {
    tracing::info!(
        chain_id = config.chain_id,
        gateway_chain_id = config.gateway_chain_id,
        rpc_url = %config.rpc_url,
        relayer_url = %config.relayer_url,
        kms_contract = %config.kms_contract,
        acl_contract = %config.acl_contract,
        "Creating FHE session"
    );
    if let Err(e) = METRICS.increment_request_counter(OP_SESSION_INIT) {
        tracing::warn!("Failed to increment request counter: {:?}", e);
    }
    let _timer = METRICS.time_operation(OP_SESSION_INIT);

    if let Err(e) = factory.init_runtime().await {
        tracing::warn!("Engine runtime init reported an error (may already be initialized): {e}");
    }

    match factory.create_instance(&config).await {
        Ok(engine) => {
            tracing::info!("FHE session created");
            Ok(Arc::new(engine))
        }
        Err(e) => {
            tracing::error!("FHE session construction failed: {e}");
            let e = Arc::new(e);
            record_error(OP_SESSION_INIT, &Error::SessionConstruction(e.clone()));
            Err(e)
        }
    }
}
