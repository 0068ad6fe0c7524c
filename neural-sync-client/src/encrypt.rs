use crate::client::FhevmClient;
use crate::engine::{EngineFactory, FheEngine};
use crate::error::{record_error, EngineError, Error, Result};
use alloy_primitives::{Address, Bytes, B256};
use observability::metrics::METRICS;
use observability::metrics_names::OP_ENCRYPT;

/// Encrypted value ready for on-chain submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedChoice {
    pub handle: B256,
    pub input_proof: Bytes,
}

impl<F: EngineFactory> FhevmClient<F> {
    /// Encrypts a 32-bit plaintext for `contract_address`, to be submitted by
    /// `caller_address`.
    ///
    /// No retry here: nothing has been committed yet, failures go straight
    /// back to the caller.
    pub async fn encrypt_u32(
        &self,
        value: u32,
        contract_address: Address,
        caller_address: Address,
    ) -> Result<EncryptedChoice> {
        if let Err(e) = METRICS.increment_request_counter(OP_ENCRYPT) {
            tracing::warn!("Failed to increment request counter: {:?}", e);
        }
        let _timer = METRICS.time_operation(OP_ENCRYPT);

        let outcome = self.encrypt_inner(value, contract_address, caller_address).await;
        if let Err(e) = &outcome {
            record_error(OP_ENCRYPT, e);
        }
        outcome
    }

    async fn encrypt_inner(
        &self,
        value: u32,
        contract_address: Address,
        caller_address: Address,
    ) -> Result<EncryptedChoice> {
        let engine = self.session().await?;
        let mut input = engine.create_encrypted_input(contract_address, caller_address);
        input.add32(value);
        tracing::info!(%contract_address, %caller_address, "Encrypting 32-bit input");

        let payload = engine.encrypt(input).await.map_err(Error::Encryption)?;
        let handle = payload.handles.first().copied().ok_or_else(|| {
            Error::Encryption(EngineError::InvalidInput(
                "engine returned no handle".to_string(),
            ))
        })?;
        if payload.input_proof.is_empty() {
            return Err(Error::Encryption(EngineError::InvalidInput(
                "engine returned an empty input proof".to_string(),
            )));
        }
        tracing::debug!(%handle, proof_len = payload.input_proof.len(), "Input encrypted");
        Ok(EncryptedChoice {
            handle,
            input_proof: payload.input_proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FheConfig;
    use crate::engine::{
        ClearValue, DecryptionKeypair, EncryptedInput, EncryptedPayload, FhePlaintext, PublicKey,
        UserDecryptRequest,
    };
    use crate::error::RelayerError;
    use alloy_sol_types::Eip712Domain;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Engine recording what it was asked to encrypt.
    #[derive(Default)]
    struct RecordingEngine {
        inputs: Mutex<Vec<EncryptedInput>>,
        outcome: Option<EncryptedPayload>,
    }

    #[async_trait]
    impl FheEngine for RecordingEngine {
        fn public_key(&self) -> Option<PublicKey> {
            None
        }

        async fn encrypt(&self, input: EncryptedInput) -> std::result::Result<EncryptedPayload, EngineError> {
            self.inputs.lock().unwrap().push(input);
            self.outcome
                .clone()
                .ok_or_else(|| EngineError::Relayer(RelayerError::Status {
                    status: 503,
                    message: "input verifier down".to_string(),
                }))
        }

        fn generate_keypair(&self) -> DecryptionKeypair {
            DecryptionKeypair {
                public_key: Bytes::new(),
                private_key: Bytes::new(),
            }
        }

        fn eip712_domain(&self) -> Eip712Domain {
            Eip712Domain::default()
        }

        async fn user_decrypt(
            &self,
            _request: &UserDecryptRequest,
        ) -> std::result::Result<HashMap<String, ClearValue>, RelayerError> {
            Ok(HashMap::new())
        }
    }

    struct RecordingFactory(Option<EncryptedPayload>);

    #[async_trait]
    impl EngineFactory for RecordingFactory {
        type Engine = RecordingEngine;

        async fn init_runtime(&self) -> std::result::Result<(), EngineError> {
            Ok(())
        }

        async fn create_instance(&self, _config: &FheConfig) -> std::result::Result<RecordingEngine, EngineError> {
            Ok(RecordingEngine {
                inputs: Mutex::new(Vec::new()),
                outcome: self.0.clone(),
            })
        }
    }

    fn client(outcome: Option<EncryptedPayload>) -> FhevmClient<RecordingFactory> {
        FhevmClient::new(FheConfig::sepolia().unwrap(), RecordingFactory(outcome)).unwrap()
    }

    #[tokio::test]
    async fn test_encrypt_returns_first_handle() {
        let first = B256::repeat_byte(0x11);
        let client = client(Some(EncryptedPayload {
            handles: vec![first, B256::repeat_byte(0x22)],
            input_proof: Bytes::from_static(&[9, 9, 9]),
        }));
        let contract = Address::repeat_byte(0xcc);
        let caller = Address::repeat_byte(0xaa);

        let encrypted = client.encrypt_u32(1, contract, caller).await.unwrap();
        assert_eq!(encrypted.handle, first);
        assert_eq!(encrypted.input_proof, Bytes::from_static(&[9, 9, 9]));

        let engine = client.session().await.unwrap();
        let inputs = engine.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].contract_address(), contract);
        assert_eq!(inputs[0].user_address(), caller);
        assert_eq!(inputs[0].values(), &[FhePlaintext::Uint32(1)]);
    }

    #[tokio::test]
    async fn test_encrypt_failure_is_not_retried() {
        let client = client(None);
        let err = client
            .encrypt_u32(0, Address::repeat_byte(0xcc), Address::repeat_byte(0xaa))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Encryption(EngineError::Relayer(_))));
        let engine = client.session().await.unwrap();
        assert_eq!(engine.inputs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_encrypt_without_handle() {
        let client = client(Some(EncryptedPayload {
            handles: vec![],
            input_proof: Bytes::from_static(&[1]),
        }));
        assert!(matches!(
            client
                .encrypt_u32(1, Address::ZERO, Address::ZERO)
                .await,
            Err(Error::Encryption(EngineError::InvalidInput(_)))
        ));
    }
}
