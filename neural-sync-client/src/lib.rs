//! Client side orchestration of the Neural Sync FHE game.
//!
//! [`client::FhevmClient`] owns the lazily built FHE session and exposes the
//! readiness checks, encryption and user decryption. [`game::NeuralSession`]
//! plays rounds on top of it against a [`chain::GameChain`].

pub mod chain;
pub mod cli;
pub mod client;
pub mod config;
pub mod decrypt;
pub mod eip712;
pub mod encrypt;
pub mod engine;
pub mod error;
pub mod game;
pub mod handle;
pub mod readiness;
pub mod retry;
pub mod round;
pub mod rpc;
pub mod session;
pub mod simulation;
pub mod wallet;

pub use client::FhevmClient;
pub use encrypt::EncryptedChoice;
pub use error::{Error, Result};
pub use handle::{normalize_handle, CiphertextHandle, HandleContractPair};
pub use readiness::RelayerProbe;
