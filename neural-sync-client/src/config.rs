use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::round::RoundPollConfig;
use alloy_primitives::Address;
use observability::conf::{Settings, TelemetryConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

/// Prefix of every configuration environment variable, e.g. `NEURAL_SYNC__FHE__RELAYER_URL`.
pub const ENV_PREFIX: &str = "NEURAL_SYNC";

// Public Sepolia deployment of the FHE protocol
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;
pub const DEFAULT_GATEWAY_CHAIN_ID: u64 = 10_901;
pub const DEFAULT_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const DEFAULT_RELAYER_URL: &str = "https://relayer.testnet.zama.org";
pub const DEFAULT_ACL_CONTRACT: &str = "0xf0Ffdc93b7E186bC2f8CB3dAA75D86d1930A433D";
pub const DEFAULT_KMS_CONTRACT: &str = "0xbE0E383937d564D7FF0BC3b46c51f0bF8d5C311A";
pub const DEFAULT_INPUT_VERIFIER_CONTRACT: &str = "0xBBC1fFCdc7C316aAAd72E807D9b0272BE8F84DA0";
pub const DEFAULT_DECRYPTION_CONTRACT: &str = "0x5D8BD78e2ea6bbE41f26dFe9fdaEAa349e077478";
pub const DEFAULT_INPUT_VERIFICATION_CONTRACT: &str = "0x483b9dE06E4E4C7D35CCf5837A1668487406D955";

pub const DEFAULT_GAME_CONTRACT: &str = "0x786AE7f804e7CFD55e4Bab6f4a812980Bb8c705C";
pub const DEFAULT_EXPLORER_BASE: &str = "https://sepolia.etherscan.io/address";
pub const DEFAULT_SOURCE_URL: &str = "https://github.com/6sanep/Neural-Sync";

/// Validates an account address and returns it in canonical form.
///
/// Mixed case input must carry a valid EIP-55 checksum, all-lowercase and
/// all-uppercase input is accepted as is. The checksummed string is
/// available through `Address::to_checksum(None)` or `Display`.
pub fn checksum_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let body = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| Error::Configuration(format!("address {trimmed:?} lacks the 0x prefix")))?;
    let address = Address::from_str(trimmed)
        .map_err(|e| Error::Configuration(format!("invalid address {trimmed:?}: {e}")))?;

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None)[2..] != *body {
        return Err(Error::Configuration(format!(
            "address {trimmed:?} has an invalid checksum"
        )));
    }
    Ok(address)
}

/// Override value if present and non-empty after trimming, default otherwise.
fn fallback<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

fn fallback_number(key: &str, value: Option<&str>, default: u64) -> Result<u64> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v
            .parse::<u64>()
            .map_err(|e| Error::Configuration(format!("{key} must be an unsigned integer, got {v:?}: {e}"))),
        _ => Ok(default),
    }
}

fn fallback_address(key: &str, value: Option<&str>, default: &str) -> Result<Address> {
    checksum_address(fallback(value, default)).map_err(|e| match e {
        Error::Configuration(msg) => Error::Configuration(format!("{key}: {msg}")),
        other => other,
    })
}

/// Raw string overrides of the FHE network parameters, as read from files
/// and environment. Absent and blank values fall back to the Sepolia defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FheConfigOverrides {
    pub chain_id: Option<String>,
    pub gateway_chain_id: Option<String>,
    pub rpc_url: Option<String>,
    pub relayer_url: Option<String>,
    pub acl_contract: Option<String>,
    pub kms_contract: Option<String>,
    pub input_verifier_contract: Option<String>,
    pub decryption_contract: Option<String>,
    pub input_verification_contract: Option<String>,
}

/// Resolved FHE network configuration. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FheConfig {
    pub chain_id: u64,
    pub gateway_chain_id: u64,
    pub rpc_url: String,
    pub relayer_url: String,
    pub acl_contract: Address,
    pub kms_contract: Address,
    pub input_verifier_contract: Address,
    /// Verifying contract of the user decryption EIP-712 domain.
    pub decryption_contract: Address,
    pub input_verification_contract: Address,
}

impl FheConfig {
    /// Layers `overrides` on the built-in defaults, failing fast on any
    /// malformed number or address.
    pub fn resolve(overrides: &FheConfigOverrides) -> Result<Self> {
        let o = overrides;
        let config = Self {
            chain_id: fallback_number("chain_id", o.chain_id.as_deref(), DEFAULT_CHAIN_ID)?,
            gateway_chain_id: fallback_number(
                "gateway_chain_id",
                o.gateway_chain_id.as_deref(),
                DEFAULT_GATEWAY_CHAIN_ID,
            )?,
            rpc_url: fallback(o.rpc_url.as_deref(), DEFAULT_RPC_URL).to_string(),
            relayer_url: fallback(o.relayer_url.as_deref(), DEFAULT_RELAYER_URL).to_string(),
            acl_contract: fallback_address(
                "acl_contract",
                o.acl_contract.as_deref(),
                DEFAULT_ACL_CONTRACT,
            )?,
            kms_contract: fallback_address(
                "kms_contract",
                o.kms_contract.as_deref(),
                DEFAULT_KMS_CONTRACT,
            )?,
            input_verifier_contract: fallback_address(
                "input_verifier_contract",
                o.input_verifier_contract.as_deref(),
                DEFAULT_INPUT_VERIFIER_CONTRACT,
            )?,
            decryption_contract: fallback_address(
                "decryption_contract",
                o.decryption_contract.as_deref(),
                DEFAULT_DECRYPTION_CONTRACT,
            )?,
            input_verification_contract: fallback_address(
                "input_verification_contract",
                o.input_verification_contract.as_deref(),
                DEFAULT_INPUT_VERIFICATION_CONTRACT,
            )?,
        };
        tracing::debug!(
            chain_id = config.chain_id,
            gateway_chain_id = config.gateway_chain_id,
            rpc_url = %config.rpc_url,
            relayer_url = %config.relayer_url,
            "FHE configuration resolved"
        );
        Ok(config)
    }

    /// Public Sepolia configuration without any override.
    pub fn sepolia() -> Result<Self> {
        Self::resolve(&FheConfigOverrides::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GameOverrides {
    pub contract_address: Option<String>,
    pub explorer_base: Option<String>,
    pub source_url: Option<String>,
}

/// Where the game contract lives and how to link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameConfig {
    pub contract_address: Address,
    pub explorer_base: String,
    pub source_url: String,
}

impl GameConfig {
    pub fn resolve(overrides: &GameOverrides) -> Result<Self> {
        Ok(Self {
            contract_address: fallback_address(
                "game.contract_address",
                overrides.contract_address.as_deref(),
                DEFAULT_GAME_CONTRACT,
            )?,
            explorer_base: fallback(overrides.explorer_base.as_deref(), DEFAULT_EXPLORER_BASE)
                .trim_end_matches('/')
                .to_string(),
            source_url: fallback(overrides.source_url.as_deref(), DEFAULT_SOURCE_URL).to_string(),
        })
    }

    /// Block explorer page of the game contract.
    pub fn contract_link(&self) -> String {
        format!("{}/{}", self.explorer_base, self.contract_address)
    }
}

/// Everything the client reads from configuration files and environment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub fhe: FheConfigOverrides,
    #[serde(default)]
    pub game: GameOverrides,
    #[serde(default)]
    pub round_poll: RoundPollConfig,
    #[serde(default)]
    pub relayer_retry: RetryPolicy,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Validated, resolved form of [`ClientSettings`].
#[derive(Debug, Clone, Serialize)]
pub struct ClientConfig {
    pub fhe: FheConfig,
    pub game: GameConfig,
    pub round_poll: RoundPollConfig,
    pub relayer_retry: RetryPolicy,
    pub telemetry: TelemetryConfig,
}

impl ClientSettings {
    /// Reads the layered configuration (see [`Settings::init_conf`]) with the
    /// `NEURAL_SYNC` prefix, `path` being an extra required file.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = match path {
            Some(path) => Settings::builder()
                .path(path)
                .env_prefix(ENV_PREFIX)
                .build()
                .init_conf(),
            None => Settings::builder().env_prefix(ENV_PREFIX).build().init_conf(),
        };
        settings.map_err(|e| Error::Configuration(e.to_string()))
    }

    pub fn resolve(&self) -> Result<ClientConfig> {
        self.round_poll
            .validate()
            .map_err(|e| Error::Configuration(format!("round_poll: {e}")))?;
        self.relayer_retry
            .validate()
            .map_err(|e| Error::Configuration(format!("relayer_retry: {e}")))?;
        Ok(ClientConfig {
            fhe: FheConfig::resolve(&self.fhe)?,
            game: GameConfig::resolve(&self.game)?,
            round_poll: self.round_poll,
            relayer_retry: self.relayer_retry.clone(),
            telemetry: self.telemetry.clone(),
        })
    }
}
