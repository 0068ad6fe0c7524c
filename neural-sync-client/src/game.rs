//! Round orchestration of the Neural Sync game.
//!
//! A round encrypts the player pill, submits it, waits for the contract to
//! settle the round and decrypts the system pill together with the synced
//! flag under a single wallet signature.

use crate::chain::GameChain;
use crate::client::FhevmClient;
use crate::engine::EngineFactory;
use crate::error::{record_error, Error, Result};
use crate::handle::HandleContractPair;
use crate::round::{wait_for_new_round, RoundPollConfig};
use crate::wallet::WalletSigner;
use alloy_primitives::{Address, B256};
use observability::metrics::METRICS;
use observability::metrics_names::{OP_PLAY_ROUND, TAG_OUTCOME};
use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumString};

/// Plaintext of the flag meaning the player matched the system.
const SYNCED_FLAG: u64 = 1;

/// The two choices of the game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Pill {
    Red,
    Blue,
}

impl Pill {
    /// Encoding used on-chain.
    pub fn value(self) -> u32 {
        match self {
            Pill::Red => 0,
            Pill::Blue => 1,
        }
    }

    /// Decoding of a decrypted system choice, anything but 0 is blue.
    pub fn from_value(value: u64) -> Self {
        if value == 0 {
            Pill::Red
        } else {
            Pill::Blue
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Ready,
    Encrypting,
    Waiting,
    Decrypting,
    Synced,
    Desynced,
    Error,
}

impl Phase {
    /// A round is being played.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Encrypting | Phase::Waiting | Phase::Decrypting)
    }

    /// A new round may be submitted from this phase once the session started.
    /// A failed round can be retried straight away.
    pub fn accepts_choice(self) -> bool {
        matches!(
            self,
            Phase::Ready | Phase::Synced | Phase::Desynced | Phase::Error
        )
    }
}

/// Observable state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameState {
    pub phase: Phase,
    /// Encryption readiness was established by [`NeuralSession::start`].
    pub has_started: bool,
    pub user_choice: Option<Pill>,
    pub system_choice: Option<Pill>,
    pub round_id: Option<u64>,
    pub tx_hash: Option<B256>,
    pub last_error: Option<String>,
}

/// A settled round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResult {
    pub user_choice: Pill,
    pub system_choice: Pill,
    pub round_id: u64,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Synced(RoundResult),
    Desynced(RoundResult),
    /// The player declined a wallet prompt, the session is ready again.
    Cancelled,
}

impl RoundOutcome {
    fn metric_tag(&self) -> &'static str {
        match self {
            RoundOutcome::Synced(_) => "synced",
            RoundOutcome::Desynced(_) => "desynced",
            RoundOutcome::Cancelled => "cancelled",
        }
    }
}

/// One player at the table: encryption client, game contract and wallet.
pub struct NeuralSession<F: EngineFactory, C: GameChain> {
    client: Arc<FhevmClient<F>>,
    chain: Arc<C>,
    signer: Arc<dyn WalletSigner>,
    round_poll: RoundPollConfig,
    state: GameState,
}

impl<F: EngineFactory, C: GameChain> NeuralSession<F, C> {
    pub fn new(
        client: Arc<FhevmClient<F>>,
        chain: Arc<C>,
        signer: Arc<dyn WalletSigner>,
        round_poll: RoundPollConfig,
    ) -> Self {
        Self {
            client,
            chain,
            signer,
            round_poll,
            state: GameState::default(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn player(&self) -> Address {
        self.signer.address()
    }

    /// Makes the session ready once encryption is available. The relayer
    /// probe runs in the background and is not awaited.
    pub async fn start(&mut self) -> Result<()> {
        if self.state.phase.is_in_flight() {
            return Err(Error::InvalidState(format!(
                "cannot start while {}",
                self.state.phase
            )));
        }
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.check_relayer_reachable().await {
                tracing::warn!("Relayer check failed: {e}");
            }
        });
        match self.client.check_encryption_ready().await {
            Ok(_) => {
                self.state = GameState {
                    phase: Phase::Ready,
                    has_started: true,
                    ..Default::default()
                };
                tracing::info!(player = %self.player(), "Session ready");
                Ok(())
            }
            Err(e) => {
                self.state.has_started = false;
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Plays one round with `pill`.
    ///
    /// A declined wallet prompt resets the session to ready and yields
    /// [`RoundOutcome::Cancelled`]. Any other failure leaves the session in
    /// the error phase and is returned.
    pub async fn submit_choice(&mut self, pill: Pill) -> Result<RoundOutcome> {
        if self.state.phase.is_in_flight() {
            return Err(Error::InvalidState(format!(
                "a round is already in flight ({})",
                self.state.phase
            )));
        }
        if !self.state.has_started || !self.state.phase.accepts_choice() {
            return Err(Error::InvalidState(format!(
                "session is {}, start it first",
                self.state.phase
            )));
        }
        if let Err(e) = METRICS.increment_request_counter(OP_PLAY_ROUND) {
            tracing::warn!("Failed to increment request counter: {:?}", e);
        }
        let mut timer = METRICS.time_operation(OP_PLAY_ROUND);

        self.state.user_choice = Some(pill);
        self.state.system_choice = None;
        self.state.tx_hash = None;
        self.state.last_error = None;

        let outcome = match self.play_round(pill).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_user_rejection() => {
                tracing::info!("Player declined the wallet prompt, round cancelled");
                self.state = GameState {
                    phase: Phase::Ready,
                    has_started: true,
                    round_id: self.state.round_id,
                    ..Default::default()
                };
                Ok(RoundOutcome::Cancelled)
            }
            Err(e) => {
                record_error(OP_PLAY_ROUND, &e);
                self.fail(&e);
                Err(e)
            }
        };
        if let Ok(round) = &outcome {
            if let Err(e) = timer.tag(TAG_OUTCOME, round.metric_tag()) {
                tracing::warn!("Failed to tag round timer: {:?}", e);
            }
        }
        outcome
    }

    async fn play_round(&mut self, pill: Pill) -> Result<RoundOutcome> {
        let player = self.player();
        let contract = self.chain.contract_address();

        self.state.phase = Phase::Encrypting;
        let previous_round_id = self.chain.last_round(player).await?.round_id;
        let encrypted = self.client.encrypt_u32(pill.value(), contract, player).await?;

        self.state.phase = Phase::Waiting;
        let tx_hash = self
            .chain
            .play(player, encrypted.handle, encrypted.input_proof)
            .await?;
        self.state.tx_hash = Some(tx_hash);
        self.chain.wait_for_receipt(tx_hash).await?;

        let chain = self.chain.clone();
        let snapshot = wait_for_new_round(&self.round_poll, previous_round_id, move || {
            let chain = chain.clone();
            async move { chain.last_round(player).await.map_err(Error::from) }
        })
        .await?;

        self.state.phase = Phase::Decrypting;
        let values = self
            .client
            .decrypt(
                &[
                    HandleContractPair::new(snapshot.system_choice, contract),
                    HandleContractPair::new(snapshot.is_synced_flag, contract),
                ],
                player,
                self.signer.as_ref(),
            )
            .await?;
        let [system_value, flag] = values[..] else {
            return Err(Error::InvalidState(format!(
                "expected 2 decrypted values, got {}",
                values.len()
            )));
        };

        let result = RoundResult {
            user_choice: pill,
            system_choice: Pill::from_value(system_value),
            round_id: snapshot.round_id,
            tx_hash,
        };
        let synced = flag == SYNCED_FLAG;
        self.state.system_choice = Some(result.system_choice);
        self.state.round_id = Some(result.round_id);
        self.state.phase = if synced { Phase::Synced } else { Phase::Desynced };
        tracing::info!(
            round_id = result.round_id,
            user = %pill,
            system = %result.system_choice,
            synced,
            "Round settled"
        );
        Ok(if synced {
            RoundOutcome::Synced(result)
        } else {
            RoundOutcome::Desynced(result)
        })
    }

    /// Back to the initial state, readiness has to be established again.
    pub fn reset(&mut self) {
        self.state = GameState::default();
    }

    fn fail(&mut self, error: &Error) {
        tracing::error!("Session error: {error}");
        self.state.phase = Phase::Error;
        self.state.last_error = Some(error.to_string());
    }
}
