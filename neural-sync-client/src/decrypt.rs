use crate::client::FhevmClient;
use crate::eip712::{deterministic_contract_addresses, DecryptAuthorization, DEFAULT_DECRYPT_DURATION_DAYS};
use crate::engine::{ClearValue, EngineFactory, FheEngine, UserDecryptRequest};
use crate::error::{record_error, Error, Result};
use crate::handle::{normalize_handle, CiphertextHandle, HandleContractPair};
use crate::retry::with_relayer_retry;
use crate::wallet::WalletSigner;
use alloy_primitives::Address;
use observability::metrics::METRICS;
use observability::metrics_names::{OP_USER_DECRYPT, OP_USER_DECRYPT_ATTEMPT, TAG_HANDLE_COUNT};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Re-keys the relayer answer by canonical handle.
fn normalize_results(results: HashMap<String, ClearValue>) -> HashMap<String, ClearValue> {
    results
        .into_iter()
        .map(|(handle, value)| (normalize_handle(&handle), value))
        .collect()
}

/// Picks the value of every requested handle, in request order.
fn reindex(
    handles: &[HandleContractPair],
    results: &HashMap<String, ClearValue>,
) -> Result<Vec<u64>> {
    handles
        .iter()
        .map(|pair| {
            let key = pair.handle.normalized();
            let value = results
                .get(&key)
                .ok_or_else(|| Error::DecryptionResultMissing(key.clone()))?;
            value
                .to_scalar()
                .map_err(|found| Error::UnsupportedValueType { handle: key, found })
        })
        .collect()
}

impl<F: EngineFactory> FhevmClient<F> {
    /// User decryption of a batch of handles, results in the order of `handles`.
    ///
    /// The wallet is asked for exactly one signature, whatever the batch
    /// size. Transient relayer failures are retried with that same
    /// signature. Every requested handle must be present in the relayer
    /// answer.
    pub async fn decrypt(
        &self,
        handles: &[HandleContractPair],
        account: Address,
        signer: &dyn WalletSigner,
    ) -> Result<Vec<u64>> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        if let Err(e) = METRICS.increment_request_counter(OP_USER_DECRYPT) {
            tracing::warn!("Failed to increment request counter: {:?}", e);
        }
        let mut timer = METRICS.time_operation(OP_USER_DECRYPT);
        if let Err(e) = timer.tag(TAG_HANDLE_COUNT, handles.len().to_string()) {
            tracing::warn!("Failed to tag decryption timer: {:?}", e);
        }

        let outcome = self.decrypt_inner(handles, account, signer).await;
        if let Err(e) = &outcome {
            if e.is_user_rejection() {
                tracing::info!("User declined the decryption signature");
            } else {
                record_error(OP_USER_DECRYPT, e);
            }
        }
        outcome
    }

    async fn decrypt_inner(
        &self,
        handles: &[HandleContractPair],
        account: Address,
        signer: &dyn WalletSigner,
    ) -> Result<Vec<u64>> {
        let engine = self.session().await?;
        let keypair = engine.generate_keypair();

        let contract_addresses =
            deterministic_contract_addresses(handles.iter().map(|pair| pair.contract_address));
        let start_timestamp = unix_now();
        let authorization = DecryptAuthorization::new(
            engine.eip712_domain(),
            keypair.public_key.clone(),
            contract_addresses.clone(),
            start_timestamp,
            DEFAULT_DECRYPT_DURATION_DAYS,
        );
        tracing::info!(
            %account,
            handles = handles.len(),
            contracts = contract_addresses.len(),
            "Requesting decryption signature"
        );
        let signature = signer.sign_typed_data(account, &authorization).await?;

        let request = UserDecryptRequest {
            handles: handles.to_vec(),
            keypair,
            signature,
            contract_addresses,
            user_address: account,
            start_timestamp,
            duration_days: DEFAULT_DECRYPT_DURATION_DAYS,
        };
        let engine = &engine;
        let request = &request;
        let results = with_relayer_retry(&self.retry_policy, OP_USER_DECRYPT, move |attempt| async move {
            tracing::debug!(attempt, "Submitting user decryption to the relayer");
            if let Err(e) = METRICS.increment_request_counter(OP_USER_DECRYPT_ATTEMPT) {
                tracing::warn!("Failed to increment request counter: {:?}", e);
            }
            engine.user_decrypt(request).await
        })
        .await?;

        let values = reindex(handles, &normalize_results(results))?;
        tracing::info!(handles = values.len(), "User decryption complete");
        Ok(values)
    }

    /// Decrypts handles that all belong to `contract_address`.
    pub async fn decrypt_handles(
        &self,
        ciphertexts: &[CiphertextHandle],
        contract_address: Address,
        account: Address,
        signer: &dyn WalletSigner,
    ) -> Result<Vec<u64>> {
        let pairs: Vec<HandleContractPair> = ciphertexts
            .iter()
            .map(|handle| HandleContractPair::new(*handle, contract_address))
            .collect();
        self.decrypt(&pairs, account, signer).await
    }

    /// Decrypts a single handle.
    pub async fn decrypt_handle(
        &self,
        ciphertext: CiphertextHandle,
        contract_address: Address,
        account: Address,
        signer: &dyn WalletSigner,
    ) -> Result<u64> {
        let values = self
            .decrypt_handles(&[ciphertext], contract_address, account, signer)
            .await?;
        values
            .into_iter()
            .next()
            .ok_or_else(|| Error::DecryptionResultMissing(ciphertext.normalized()))
    }
}
