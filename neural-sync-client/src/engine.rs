//! Seam to the external FHE engine (relayer SDK).
//!
//! The engine owns the cryptography: public key distribution, input
//! encryption and proof generation, keypair generation and the relayer
//! round trip of a user decryption. This crate only orchestrates it.

use crate::config::FheConfig;
use crate::error::{EngineError, RelayerError};
use crate::handle::HandleContractPair;
use alloy_primitives::{Address, Bytes, Signature, B256, U256};
use alloy_sol_types::Eip712Domain;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// FHE public key served by the relayer.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub id: String,
    pub data: Bytes,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Ephemeral keypair of a single decryption batch. Never reused.
#[derive(Clone)]
pub struct DecryptionKeypair {
    pub public_key: Bytes,
    pub private_key: Bytes,
}

impl fmt::Debug for DecryptionKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKeypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// A plaintext queued for encryption, with its declared bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FhePlaintext {
    Bool(bool),
    Uint8(u8),
    Uint32(u32),
    Uint64(u64),
}

impl FhePlaintext {
    pub fn bit_width(&self) -> u32 {
        match self {
            FhePlaintext::Bool(_) => 1,
            FhePlaintext::Uint8(_) => 8,
            FhePlaintext::Uint32(_) => 32,
            FhePlaintext::Uint64(_) => 64,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            FhePlaintext::Bool(v) => u64::from(*v),
            FhePlaintext::Uint8(v) => u64::from(*v),
            FhePlaintext::Uint32(v) => u64::from(*v),
            FhePlaintext::Uint64(v) => *v,
        }
    }
}

/// Encrypted input builder scoped to a contract and the account calling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    contract_address: Address,
    user_address: Address,
    values: Vec<FhePlaintext>,
}

impl EncryptedInput {
    pub fn new(contract_address: Address, user_address: Address) -> Self {
        Self {
            contract_address,
            user_address,
            values: Vec::new(),
        }
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.values.push(FhePlaintext::Bool(value));
        self
    }

    pub fn add8(&mut self, value: u8) -> &mut Self {
        self.values.push(FhePlaintext::Uint8(value));
        self
    }

    pub fn add32(&mut self, value: u32) -> &mut Self {
        self.values.push(FhePlaintext::Uint32(value));
        self
    }

    pub fn add64(&mut self, value: u64) -> &mut Self {
        self.values.push(FhePlaintext::Uint64(value));
        self
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn user_address(&self) -> Address {
        self.user_address
    }

    pub fn values(&self) -> &[FhePlaintext] {
        &self.values
    }
}

/// Committed ciphertext package: one handle per queued value plus a proof
/// covering all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub handles: Vec<B256>,
    pub input_proof: Bytes,
}

/// Everything the relayer needs for one user decryption.
#[derive(Debug, Clone)]
pub struct UserDecryptRequest {
    pub handles: Vec<HandleContractPair>,
    pub keypair: DecryptionKeypair,
    pub signature: Signature,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

/// Clear value as returned by the relayer for one handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClearValue {
    Bool(bool),
    Uint(U256),
    Text(String),
    Bytes(Bytes),
}

impl ClearValue {
    /// Coerces the value to a plain integer.
    ///
    /// Big integers, booleans and numeric strings (decimal or `0x` hex) are
    /// accepted. On failure the description of the offending value is returned.
    pub fn to_scalar(&self) -> Result<u64, String> {
        match self {
            ClearValue::Bool(v) => Ok(u64::from(*v)),
            ClearValue::Uint(v) => {
                u64::try_from(*v).map_err(|_| format!("integer {v} does not fit in 64 bits"))
            }
            ClearValue::Text(s) => {
                let parsed = U256::from_str(s.trim())
                    .map_err(|_| format!("string {s:?} is not a number"))?;
                u64::try_from(parsed).map_err(|_| format!("integer {s} does not fit in 64 bits"))
            }
            ClearValue::Bytes(b) => Err(format!("raw bytes {b}")),
        }
    }
}

/// A ready to use FHE engine instance bound to one network configuration.
#[async_trait]
pub trait FheEngine: Send + Sync + 'static {
    /// Public key fetched during construction, `None` if the relayer did not serve one.
    fn public_key(&self) -> Option<PublicKey>;

    fn create_encrypted_input(&self, contract_address: Address, user_address: Address) -> EncryptedInput {
        EncryptedInput::new(contract_address, user_address)
    }

    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedPayload, EngineError>;

    fn generate_keypair(&self) -> DecryptionKeypair;

    /// Domain of the user decryption EIP-712 authorization.
    fn eip712_domain(&self) -> Eip712Domain;

    /// Single relayer round trip, keyed by handle in whatever case the relayer chose.
    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<HashMap<String, ClearValue>, RelayerError>;
}

/// Builds engine instances. Construction is split in two steps as the
/// underlying runtime may already be initialized.
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: FheEngine;

    /// Runtime bootstrap, failure here is not fatal.
    async fn init_runtime(&self) -> Result<(), EngineError>;

    /// Creates the instance, fetching the public key from the relayer.
    async fn create_instance(&self, config: &FheConfig) -> Result<Self::Engine, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_value_to_scalar() {
        assert_eq!(ClearValue::Bool(true).to_scalar(), Ok(1));
        assert_eq!(ClearValue::Bool(false).to_scalar(), Ok(0));
        assert_eq!(ClearValue::Uint(U256::from(7)).to_scalar(), Ok(7));
        assert_eq!(ClearValue::Text("42".to_string()).to_scalar(), Ok(42));
        assert_eq!(ClearValue::Text("0x10".to_string()).to_scalar(), Ok(16));
        assert!(ClearValue::Text("abc".to_string()).to_scalar().is_err());
        assert!(ClearValue::Uint(U256::MAX).to_scalar().is_err());
        assert!(ClearValue::Bytes(Bytes::from_static(&[1])).to_scalar().is_err());
    }

    #[test]
    fn test_clear_value_from_json() {
        let values: HashMap<String, ClearValue> =
            serde_json::from_str(r#"{"0xAA": true, "0xbb": "5"}"#).unwrap();
        assert_eq!(values["0xAA"], ClearValue::Bool(true));
        assert_eq!(values["0xbb"].to_scalar(), Ok(5));
    }

    #[test]
    fn test_encrypted_input_builder() {
        let mut input = EncryptedInput::new(Address::repeat_byte(0xcc), Address::repeat_byte(0xaa));
        input.add32(1).add_bool(true);
        assert_eq!(
            input.values(),
            &[FhePlaintext::Uint32(1), FhePlaintext::Bool(true)]
        );
        assert_eq!(input.values()[0].bit_width(), 32);
        assert_eq!(input.contract_address(), Address::repeat_byte(0xcc));
    }

    #[test]
    fn test_keypair_debug_redacts_private_key() {
        let keypair = DecryptionKeypair {
            public_key: Bytes::from_static(&[1, 2]),
            private_key: Bytes::from_static(&[0xde, 0xad]),
        };
        let printed = format!("{keypair:?}");
        assert!(printed.contains("redacted"));
        assert!(!printed.contains("dead"));
    }
}
