use crate::client::FhevmClient;
use crate::engine::{EngineFactory, FheEngine};
use crate::error::{record_error, Error, RelayerError, Result};
use observability::metrics::METRICS;
use observability::metrics_names::{OP_ENCRYPTION_READY_CHECK, OP_RELAYER_PROBE};
use std::time::Duration;
use strum_macros::Display;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of the relayer probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RelayerProbe {
    /// The relayer answered, whatever the status.
    Reachable,
    /// The relayer answered with a gateway error (502, 503, 504).
    Unreachable,
    /// No answer could be obtained, the reason is not observable.
    Unknown,
}

/// HTTP client for relayer probes, bounded by [`PROBE_TIMEOUT`].
pub fn probe_http_client() -> Result<reqwest::Client> {
    let http = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(RelayerError::from)?;
    Ok(http)
}

/// Best-effort relayer probe, for diagnostics only.
///
/// Any answer counts as reachable except gateway errors. A failed request
/// says nothing about the relayer itself and yields [`RelayerProbe::Unknown`].
pub async fn probe_relayer_url(http: &reqwest::Client, relayer_url: &str) -> Result<RelayerProbe> {
    let url = relayer_url.trim();
    if url.is_empty() {
        return Err(Error::RelayerUrlMissing);
    }
    let _timer = METRICS.time_operation(OP_RELAYER_PROBE);
    let probe = match http.get(url).send().await {
        Ok(response) => match response.status().as_u16() {
            502..=504 => RelayerProbe::Unreachable,
            _ => RelayerProbe::Reachable,
        },
        Err(e) => {
            tracing::warn!("Relayer probe failed: {e}");
            RelayerProbe::Unknown
        }
    };
    Ok(probe)
}

impl<F: EngineFactory> FhevmClient<F> {
    /// Load-bearing readiness signal: the session can be built and holds a
    /// public key.
    pub async fn check_encryption_ready(&self) -> Result<bool> {
        let _timer = METRICS.time_operation(OP_ENCRYPTION_READY_CHECK);
        let outcome = self.public_key_loaded().await;
        if let Err(e) = &outcome {
            record_error(OP_ENCRYPTION_READY_CHECK, e);
        }
        outcome
    }

    async fn public_key_loaded(&self) -> Result<bool> {
        let engine = self.session().await?;
        match engine.public_key() {
            Some(key) => {
                tracing::info!(key_id = %key.id, "FHE public key loaded, encryption ready");
                Ok(true)
            }
            None => {
                tracing::error!("FHE session built but the relayer served no public key");
                Err(Error::KeyUnavailable)
            }
        }
    }

    /// Best-effort probe of the configured relayer, see [`probe_relayer_url`].
    pub async fn probe_relayer(&self) -> Result<RelayerProbe> {
        probe_relayer_url(&self.http, &self.config().relayer_url).await
    }

    /// Informational relayer check. It never gates the critical path: any
    /// probe outcome is reported as reachable, only a missing relayer URL fails.
    pub async fn check_relayer_reachable(&self) -> Result<bool> {
        match self.probe_relayer().await? {
            RelayerProbe::Reachable => tracing::info!("Relayer reachable"),
            other => tracing::warn!("Relayer probe outcome {other}, continuing anyway"),
        }
        Ok(true)
    }
}
