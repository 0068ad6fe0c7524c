use crate::eip712::DecryptAuthorization;
use crate::error::{ChainError, USER_REJECTED_REQUEST_CODE};
use crate::rpc::JsonRpcClient;
use alloy_primitives::{Address, Signature};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("User rejected the request: {0}")]
    Rejected(String),
    #[error("Signer error: {0}")]
    SignerError(#[from] alloy_signer::Error),
    #[error("Local signer error: {0}")]
    LocalSignerError(#[from] alloy_signer_local::LocalSignerError),
    #[error("Wallet provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, WalletError>;

/// Wallet signing capability, the `signTypedData` of browser wallets.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Account the wallet signs for.
    fn address(&self) -> Address;

    /// Signs the EIP-712 `typed_data` (domain, primary type, types and
    /// message) on behalf of `account`. Blocks until the holder approves or
    /// declines.
    async fn sign_typed_data(
        &self,
        account: Address,
        typed_data: &DecryptAuthorization,
    ) -> Result<Signature>;
}

/// In-process wallet holding a private key.
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    reject: Arc<AtomicBool>,
}

impl LocalWallet {
    /// Create a new random wallet
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    /// Create a wallet from a hex encoded private key
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(private_key.trim())?;
        Ok(Self::from_signer(signer))
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        Self {
            signer,
            reject: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every following signature request fail as if the holder declined it.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.signer.address())
            .field("reject", &self.reject.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_typed_data(
        &self,
        account: Address,
        typed_data: &DecryptAuthorization,
    ) -> Result<Signature> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(WalletError::Rejected(
                "user rejected the signature request".to_string(),
            ));
        }
        if account != self.signer.address() {
            return Err(WalletError::Provider(format!(
                "account {account} is not managed by this wallet"
            )));
        }
        let hash = typed_data.signing_hash();
        Ok(self.signer.sign_hash_sync(&hash)?)
    }
}

/// Wallet reached over JSON-RPC (`eth_signTypedData_v4`), e.g. a node with
/// unlocked accounts or a wallet bridge.
#[derive(Debug, Clone)]
pub struct RpcWallet {
    rpc: JsonRpcClient,
    account: Address,
}

impl RpcWallet {
    pub fn new(rpc: JsonRpcClient, account: Address) -> Self {
        Self { rpc, account }
    }
}

#[async_trait]
impl WalletSigner for RpcWallet {
    fn address(&self) -> Address {
        self.account
    }

    async fn sign_typed_data(
        &self,
        account: Address,
        typed_data: &DecryptAuthorization,
    ) -> Result<Signature> {
        let payload = serde_json::to_string(&typed_data.to_typed_data())
            .map_err(|e| WalletError::Provider(format!("cannot encode typed data: {e}")))?;
        let signature: String = self
            .rpc
            .request("eth_signTypedData_v4", json!([account, payload]))
            .await
            .map_err(|e| match e {
                ChainError::Rpc { code, message } if code == USER_REJECTED_REQUEST_CODE => {
                    WalletError::Rejected(message)
                }
                other => WalletError::Provider(other.to_string()),
            })?;
        let bytes = hex::decode(signature.trim_start_matches("0x"))
            .map_err(|e| WalletError::Provider(format!("malformed signature: {e}")))?;
        Signature::try_from(bytes.as_slice())
            .map_err(|e| WalletError::Provider(format!("malformed signature: {e}")))
    }
}
