use crate::error::Error;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical lookup form of a handle: `0x` prefixed, lowercase.
///
/// The relayer may answer with a different case than the one submitted, so
/// every handle is passed through here before being used as a map key.
pub fn normalize_handle(handle: &str) -> String {
    let trimmed = handle.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", body.to_lowercase())
}

/// Opaque 32 byte reference to an encrypted value stored on-chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct CiphertextHandle(B256);

impl CiphertextHandle {
    pub const fn new(value: B256) -> Self {
        Self(value)
    }

    pub fn as_b256(&self) -> &B256 {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Canonical string form, see [`normalize_handle`].
    pub fn normalized(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<B256> for CiphertextHandle {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<CiphertextHandle> for B256 {
    fn from(value: CiphertextHandle) -> Self {
        value.0
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({})", self.normalized())
    }
}

impl FromStr for CiphertextHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_handle(s);
        let bytes = hex::decode(&normalized[2..])
            .map_err(|e| Error::InvalidHandle(format!("{s}: {e}")))?;
        let value = B256::try_from(bytes.as_slice()).map_err(|_| {
            Error::InvalidHandle(format!(
                "{s}: expected 32 bytes, got {} bytes",
                bytes.len()
            ))
        })?;
        Ok(Self(value))
    }
}

/// One encrypted value on-chain: the handle and the contract that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: CiphertextHandle,
    pub contract_address: Address,
}

impl HandleContractPair {
    pub fn new(handle: impl Into<CiphertextHandle>, contract_address: Address) -> Self {
        Self {
            handle: handle.into(),
            contract_address,
        }
    }
}
