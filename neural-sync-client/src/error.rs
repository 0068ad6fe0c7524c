use crate::wallet::WalletError;
use alloy_primitives::B256;
use observability::metrics::METRICS;
use std::sync::Arc;
use strum_macros::IntoStaticStr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// EIP-1193 error code returned by wallets when the user declines a request.
pub const USER_REJECTED_REQUEST_CODE: i64 = 4001;

/// Phrases wallets put in rejection messages when they do not expose a
/// structured error kind.
const USER_REJECTION_PHRASES: [&str; 5] = [
    "user rejected",
    "user denied",
    "user cancelled",
    "rejected the request",
    "transaction was rejected",
];

/// Top level error of the client.
///
/// The variant names double as metric error tags (snake case).
#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Relayer URL missing")]
    RelayerUrlMissing,

    #[error("FHE session construction failed: {0}")]
    SessionConstruction(#[source] Arc<EngineError>),

    #[error("Public key unavailable")]
    KeyUnavailable,

    #[error("Encryption failed: {0}")]
    Encryption(#[source] EngineError),

    #[error(transparent)]
    Relayer(#[from] RelayerError),

    #[error("User rejected the request: {0}")]
    UserRejection(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Decryption result missing for handle {0}")]
    DecryptionResultMissing(String),

    #[error("Unsupported decrypted value type for handle {handle}: {found}")]
    UnsupportedValueType { handle: String, found: String },

    #[error(
        "Round result still syncing after {attempts} reads (latest round {latest}, previous round {previous}). Please retry in a moment."
    )]
    RoundSyncTimeout {
        previous: u64,
        latest: u64,
        attempts: u32,
    },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Whether the wallet holder declined a signature or a transaction.
    ///
    /// Structured signals win: [`WalletError::Rejected`] and JSON-RPC code 4001.
    /// Message inspection is only used for errors that carry no such signal.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            Error::UserRejection(_) => true,
            Error::Wallet(WalletError::Rejected(_)) => true,
            Error::Wallet(WalletError::Provider(message)) => mentions_user_rejection(message),
            Error::Wallet(_) => false,
            Error::Chain(ChainError::Rpc { code, .. }) => *code == USER_REJECTED_REQUEST_CODE,
            Error::Chain(ChainError::Transport(message)) => mentions_user_rejection(message),
            _ => false,
        }
    }

    /// Whether the user should simply try again later.
    pub fn is_retriable_by_user(&self) -> bool {
        matches!(self, Error::RoundSyncTimeout { .. })
    }

    /// Short stable label used as metric tag.
    pub fn metric_tag(&self) -> &'static str {
        self.into()
    }
}

pub(crate) fn mentions_user_rejection(message: &str) -> bool {
    let message = message.to_lowercase();
    USER_REJECTION_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}

/// Count an error against an operation, never failing the caller.
pub(crate) fn record_error(operation: &'static str, error: &Error) {
    if let Err(e) = METRICS.increment_error_counter(operation, error.metric_tag()) {
        tracing::warn!("Failed to increment error counter: {:?}", e);
    }
}

/// Errors raised by the external encryption engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine runtime initialization failed: {0}")]
    RuntimeInit(String),

    #[error("Engine instance creation failed: {0}")]
    InstanceCreation(String),

    #[error("Invalid encrypted input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Relayer(#[from] RelayerError),
}

/// Errors returned by the relayer HTTP service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayerError {
    #[error("Relayer responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Relayer error: {0}")]
    Other(String),
}

impl RelayerError {
    /// HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RelayerError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RelayerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RelayerError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => RelayerError::Network(e.to_string()),
        }
    }
}

/// Errors of the chain read/write interface.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transaction {0} reverted")]
    Reverted(B256),

    #[error("No receipt for transaction {0} after {1} polls")]
    ReceiptTimeout(B256, u32),

    #[error("Failed to decode call result: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Transport(e.to_string())
    }
}

impl From<alloy_sol_types::Error> for ChainError {
    fn from(e: alloy_sol_types::Error) -> Self {
        ChainError::Decode(e.to_string())
    }
}
