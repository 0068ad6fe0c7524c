//! In-memory stand-ins for the relayer, the FHE engine and the game
//! contract, sharing one ciphertext ledger.
//!
//! Ciphertexts are plain values hidden behind random handles. The engine
//! still enforces what the real services enforce: input proofs commit to
//! their handles, the contract and the sender; user decryption requires a
//! signature recovering to the requesting account, the handle contract in
//! the signed list and an ACL grant to the account.

use crate::chain::{GameChain, TransactionReceipt};
use crate::config::FheConfig;
use crate::eip712::{decryption_domain, DecryptAuthorization};
use crate::engine::{
    ClearValue, DecryptionKeypair, EncryptedInput, EncryptedPayload, EngineFactory, FheEngine,
    PublicKey, UserDecryptRequest,
};
use crate::error::{ChainError, EngineError, RelayerError};
use crate::round::RoundSnapshot;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::Eip712Domain;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

const SIMULATED_KEY_ID: &str = "simulated-fhe-public-key";
const HANDLE_LEN: usize = 32;
// mirrors the gas estimation failure of a node
const EXECUTION_REVERTED_CODE: i64 = -32000;

#[derive(Debug, Clone)]
struct StoredCiphertext {
    value: u64,
    contract: Address,
    allowed: HashSet<Address>,
}

#[derive(Debug, Default)]
struct PlayerRounds {
    settled: RoundSnapshot,
    /// Next round and the number of reads it stays hidden for.
    pending: Option<(RoundSnapshot, u32)>,
}

#[derive(Debug)]
struct Ledger {
    rng: StdRng,
    ciphertexts: HashMap<B256, StoredCiphertext>,
    rounds: HashMap<Address, PlayerRounds>,
    receipts: HashMap<B256, TransactionReceipt>,
    last_round_id: u64,
    block_number: u64,
    relayer_failures: Vec<u16>,
}

impl Ledger {
    fn new(rng: StdRng) -> Self {
        Self {
            rng,
            ciphertexts: HashMap::new(),
            rounds: HashMap::new(),
            receipts: HashMap::new(),
            last_round_id: 0,
            block_number: 0,
            relayer_failures: Vec::new(),
        }
    }

    fn random_b256(&mut self) -> B256 {
        B256::from(self.rng.gen::<[u8; HANDLE_LEN]>())
    }

    fn store(&mut self, value: u64, contract: Address, allowed: &[Address]) -> B256 {
        let handle = self.random_b256();
        self.ciphertexts.insert(
            handle,
            StoredCiphertext {
                value,
                contract,
                allowed: allowed.iter().copied().collect(),
            },
        );
        handle
    }
}

/// Commitment of an input proof to its handles, contract and sender.
fn input_commitment(handles: &[B256], contract: Address, user: Address) -> B256 {
    let mut preimage = Vec::with_capacity(handles.len() * HANDLE_LEN + 40);
    for handle in handles {
        preimage.extend_from_slice(handle.as_slice());
    }
    preimage.extend_from_slice(contract.as_slice());
    preimage.extend_from_slice(user.as_slice());
    keccak256(preimage)
}

/// Proof layout: handle count, handles, commitment.
fn encode_input_proof(handles: &[B256], contract: Address, user: Address) -> Result<Bytes, EngineError> {
    let count = u8::try_from(handles.len())
        .map_err(|_| EngineError::InvalidInput(format!("too many values: {}", handles.len())))?;
    let mut proof = vec![count];
    for handle in handles {
        proof.extend_from_slice(handle.as_slice());
    }
    proof.extend_from_slice(input_commitment(handles, contract, user).as_slice());
    Ok(Bytes::from(proof))
}

fn decode_input_proof(proof: &[u8]) -> Option<(Vec<B256>, B256)> {
    let (&count, rest) = proof.split_first()?;
    let handles_len = usize::from(count) * HANDLE_LEN;
    if rest.len() != handles_len + HANDLE_LEN {
        return None;
    }
    let handles = rest[..handles_len]
        .chunks_exact(HANDLE_LEN)
        .map(B256::from_slice)
        .collect();
    Some((handles, B256::from_slice(&rest[handles_len..])))
}

fn reverted(reason: &str) -> ChainError {
    ChainError::Rpc {
        code: EXECUTION_REVERTED_CODE,
        message: format!("execution reverted: {reason}"),
    }
}

fn rejected(status: u16, message: String) -> RelayerError {
    RelayerError::Status { status, message }
}

/// Shared simulated network: relayer, key management and chain state.
#[derive(Clone)]
pub struct SimulatedNetwork {
    ledger: Arc<Mutex<Ledger>>,
    settlement_lag: Arc<AtomicU32>,
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible network, handles and system choices derive from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(rng))),
            settlement_lag: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of round reads for which a freshly played round stays invisible.
    pub fn with_settlement_lag(self, reads: u32) -> Self {
        self.set_settlement_lag(reads);
        self
    }

    /// Changes the lag of rounds played from now on, for every handle on this network.
    pub fn set_settlement_lag(&self, reads: u32) {
        self.settlement_lag.store(reads, Ordering::SeqCst);
    }

    /// The next decryption requests fail with `statuses`, in order.
    pub async fn inject_relayer_failures(&self, statuses: &[u16]) {
        let mut ledger = self.ledger.lock().await;
        ledger.relayer_failures.extend(statuses.iter().rev());
    }

    pub fn engine_factory(&self) -> SimulatedEngineFactory {
        SimulatedEngineFactory {
            network: self.clone(),
        }
    }

    pub fn game_chain(&self, contract: Address) -> SimulatedGameChain {
        SimulatedGameChain {
            network: self.clone(),
            contract,
        }
    }
}

pub struct SimulatedEngineFactory {
    network: SimulatedNetwork,
}

#[async_trait]
impl EngineFactory for SimulatedEngineFactory {
    type Engine = SimulatedEngine;

    async fn init_runtime(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn create_instance(&self, config: &FheConfig) -> Result<SimulatedEngine, EngineError> {
        let key = self.network.ledger.lock().await.random_b256();
        Ok(SimulatedEngine {
            network: self.network.clone(),
            public_key: PublicKey {
                id: SIMULATED_KEY_ID.to_string(),
                data: Bytes::from(key.to_vec()),
            },
            domain: decryption_domain(config.gateway_chain_id, config.decryption_contract),
        })
    }
}

pub struct SimulatedEngine {
    network: SimulatedNetwork,
    public_key: PublicKey,
    domain: Eip712Domain,
}

#[async_trait]
impl FheEngine for SimulatedEngine {
    fn public_key(&self) -> Option<PublicKey> {
        Some(self.public_key.clone())
    }

    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedPayload, EngineError> {
        if input.values().is_empty() {
            return Err(EngineError::InvalidInput("nothing to encrypt".to_string()));
        }
        let contract = input.contract_address();
        let user = input.user_address();
        let mut ledger = self.network.ledger.lock().await;
        let handles: Vec<B256> = input
            .values()
            .iter()
            .map(|value| ledger.store(value.as_u64(), contract, &[user, contract]))
            .collect();
        let input_proof = encode_input_proof(&handles, contract, user)?;
        Ok(EncryptedPayload {
            handles,
            input_proof,
        })
    }

    fn generate_keypair(&self) -> DecryptionKeypair {
        let mut rng = rand::thread_rng();
        DecryptionKeypair {
            public_key: Bytes::from(rng.gen::<[u8; 32]>().to_vec()),
            private_key: Bytes::from(rng.gen::<[u8; 32]>().to_vec()),
        }
    }

    fn eip712_domain(&self) -> Eip712Domain {
        self.domain.clone()
    }

    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<HashMap<String, ClearValue>, RelayerError> {
        let mut ledger = self.network.ledger.lock().await;
        if let Some(status) = ledger.relayer_failures.pop() {
            return Err(rejected(status, "simulated relayer failure".to_string()));
        }

        let authorization = DecryptAuthorization::new(
            self.domain.clone(),
            request.keypair.public_key.clone(),
            request.contract_addresses.clone(),
            request.start_timestamp,
            request.duration_days,
        );
        let signer = request
            .signature
            .recover_address_from_prehash(&authorization.signing_hash())
            .map_err(|e| rejected(400, format!("invalid signature: {e}")))?;
        if signer != request.user_address {
            return Err(rejected(
                400,
                format!("signature of {signer} does not match {}", request.user_address),
            ));
        }

        let mut answer = HashMap::with_capacity(request.handles.len());
        for pair in &request.handles {
            let handle = *pair.handle.as_b256();
            if !request.contract_addresses.contains(&pair.contract_address) {
                return Err(rejected(
                    400,
                    format!("contract {} is not part of the signed request", pair.contract_address),
                ));
            }
            let stored = ledger
                .ciphertexts
                .get(&handle)
                .ok_or_else(|| rejected(404, format!("unknown handle {}", pair.handle)))?;
            if stored.contract != pair.contract_address || !stored.allowed.contains(&request.user_address) {
                return Err(rejected(
                    403,
                    format!("{} is not allowed to decrypt {}", request.user_address, pair.handle),
                ));
            }
            // the relayer answers in upper case
            answer.insert(
                format!("0x{}", hex::encode_upper(handle)),
                ClearValue::Uint(U256::from(stored.value)),
            );
        }
        Ok(answer)
    }
}

/// Game contract over the simulated ledger.
pub struct SimulatedGameChain {
    network: SimulatedNetwork,
    contract: Address,
}

#[async_trait]
impl GameChain for SimulatedGameChain {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn last_round(&self, player: Address) -> Result<RoundSnapshot, ChainError> {
        let mut ledger = self.network.ledger.lock().await;
        let rounds = ledger.rounds.entry(player).or_default();
        match rounds.pending.take() {
            Some((snapshot, 0)) => rounds.settled = snapshot,
            Some((snapshot, hidden_reads)) => rounds.pending = Some((snapshot, hidden_reads - 1)),
            None => {}
        }
        Ok(rounds.settled)
    }

    async fn play(
        &self,
        from: Address,
        encrypted_choice: B256,
        input_proof: Bytes,
    ) -> Result<B256, ChainError> {
        let (handles, commitment) =
            decode_input_proof(&input_proof).ok_or_else(|| reverted("malformed input proof"))?;
        if !handles.contains(&encrypted_choice)
            || commitment != input_commitment(&handles, self.contract, from)
        {
            return Err(reverted("invalid input proof"));
        }

        let mut ledger = self.network.ledger.lock().await;
        let choice = ledger
            .ciphertexts
            .get(&encrypted_choice)
            .map(|stored| stored.value)
            .ok_or_else(|| reverted("unknown ciphertext"))?;
        let system_value: u64 = ledger.rng.gen_range(0..=1);
        let synced = u64::from(choice == system_value);

        let allowed = [from, self.contract];
        let system_choice = ledger.store(system_value, self.contract, &allowed);
        let is_synced_flag = ledger.store(synced, self.contract, &allowed);
        ledger.last_round_id += 1;
        let snapshot = RoundSnapshot {
            system_choice: system_choice.into(),
            is_synced_flag: is_synced_flag.into(),
            round_id: ledger.last_round_id,
        };
        let lag = self.network.settlement_lag.load(Ordering::SeqCst);
        let rounds = ledger.rounds.entry(from).or_default();
        if let Some((previous, _)) = rounds.pending.take() {
            rounds.settled = previous;
        }
        if lag == 0 {
            rounds.settled = snapshot;
        } else {
            rounds.pending = Some((snapshot, lag));
        }

        ledger.block_number += 1;
        let tx_hash = ledger.random_b256();
        let receipt = TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: ledger.block_number,
        };
        ledger.receipts.insert(tx_hash, receipt);
        tracing::debug!(%from, round_id = snapshot.round_id, "Simulated round played");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, ChainError> {
        self.network
            .ledger
            .lock()
            .await
            .receipts
            .get(&tx_hash)
            .copied()
            .ok_or(ChainError::ReceiptTimeout(tx_hash, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FhevmClient;
    use crate::error::Error;
    use crate::game::{NeuralSession, Phase, Pill, RoundOutcome};
    use crate::handle::HandleContractPair;
    use crate::retry::RetryPolicy;
    use crate::round::RoundPollConfig;
    use crate::session::tests::CountingFactory;
    use crate::wallet::{LocalWallet, WalletSigner};

    const GAME: Address = Address::new([0xcc; 20]);

    fn client(network: &SimulatedNetwork) -> Arc<FhevmClient<SimulatedEngineFactory>> {
        // nothing listens there, the informational relayer probe fails fast
        let config = FheConfig {
            relayer_url: "http://127.0.0.1:9".to_string(),
            ..FheConfig::sepolia().unwrap()
        };
        Arc::new(
            FhevmClient::new(config, network.engine_factory())
                .unwrap()
                .with_retry_policy(RetryPolicy::builder().base_delay_ms(10).build()),
        )
    }

    fn fast_poll() -> RoundPollConfig {
        RoundPollConfig::builder()
            .initial_delay_ms(0)
            .poll_interval_ms(10)
            .build()
    }

    #[test]
    fn test_input_proof_layout() {
        let handles = [B256::repeat_byte(1), B256::repeat_byte(2)];
        let proof = encode_input_proof(&handles, GAME, Address::ZERO).unwrap();
        assert_eq!(proof.len(), 1 + 3 * HANDLE_LEN);
        let (decoded, commitment) = decode_input_proof(&proof).unwrap();
        assert_eq!(decoded, handles);
        assert_eq!(commitment, input_commitment(&handles, GAME, Address::ZERO));
        assert!(decode_input_proof(&proof[..10]).is_none());
        assert!(decode_input_proof(&[]).is_none());
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt() {
        let network = SimulatedNetwork::with_seed(7);
        let client = client(&network);
        let wallet = LocalWallet::random();
        let encrypted = client
            .encrypt_u32(1, GAME, wallet.address())
            .await
            .unwrap();
        assert!(!encrypted.input_proof.is_empty());

        let value = client
            .decrypt_handle(encrypted.handle.into(), GAME, wallet.address(), &wallet)
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn test_decrypt_requires_acl_grant() {
        let network = SimulatedNetwork::with_seed(7);
        let client = client(&network);
        let owner = LocalWallet::random();
        let stranger = LocalWallet::random();
        let encrypted = client
            .encrypt_u32(5, GAME, owner.address())
            .await
            .unwrap();
        let err = client
            .decrypt(
                &[HandleContractPair::new(encrypted.handle, GAME)],
                stranger.address(),
                &stranger,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Relayer(RelayerError::Status { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_decrypt_rejects_foreign_signature() {
        let network = SimulatedNetwork::with_seed(7);
        let client = client(&network);
        let owner = LocalWallet::random();
        let encrypted = client
            .encrypt_u32(5, GAME, owner.address())
            .await
            .unwrap();

        // signs for itself while claiming to be the owner
        struct Impostor(LocalWallet);
        #[async_trait]
        impl WalletSigner for Impostor {
            fn address(&self) -> Address {
                self.0.address()
            }
            async fn sign_typed_data(
                &self,
                _account: Address,
                typed_data: &DecryptAuthorization,
            ) -> crate::wallet::Result<alloy_primitives::Signature> {
                self.0.sign_typed_data(self.0.address(), typed_data).await
            }
        }

        let err = client
            .decrypt(
                &[HandleContractPair::new(encrypted.handle, GAME)],
                owner.address(),
                &Impostor(LocalWallet::random()),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Relayer(RelayerError::Status { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_tampered_proof_reverts() {
        let network = SimulatedNetwork::with_seed(7);
        let client = client(&network);
        let chain = network.game_chain(GAME);
        let player = Address::repeat_byte(0xaa);
        let encrypted = client.encrypt_u32(1, GAME, player).await.unwrap();

        // proof bound to another sender
        let err = chain
            .play(Address::repeat_byte(0xbb), encrypted.handle, encrypted.input_proof.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rpc { code: EXECUTION_REVERTED_CODE, .. }));

        assert!(chain
            .play(player, encrypted.handle, encrypted.input_proof)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_settlement_lag_hides_new_round() {
        let network = SimulatedNetwork::with_seed(3).with_settlement_lag(2);
        let client = client(&network);
        let chain = network.game_chain(GAME);
        let player = Address::repeat_byte(0xaa);

        assert_eq!(chain.last_round(player).await.unwrap().round_id, 0);
        let encrypted = client.encrypt_u32(0, GAME, player).await.unwrap();
        let tx = chain
            .play(player, encrypted.handle, encrypted.input_proof)
            .await
            .unwrap();
        assert_eq!(chain.wait_for_receipt(tx).await.unwrap().block_number, 1);

        assert_eq!(chain.last_round(player).await.unwrap().round_id, 0);
        assert_eq!(chain.last_round(player).await.unwrap().round_id, 0);
        assert_eq!(chain.last_round(player).await.unwrap().round_id, 1);
    }

    #[tokio::test]
    async fn test_round_ids_are_global() {
        let network = SimulatedNetwork::with_seed(11);
        let client = client(&network);
        let chain = network.game_chain(GAME);
        let (alice, bob) = (Address::repeat_byte(0xa1), Address::repeat_byte(0xb0));

        for player in [alice, bob, alice] {
            let encrypted = client.encrypt_u32(1, GAME, player).await.unwrap();
            chain
                .play(player, encrypted.handle, encrypted.input_proof)
                .await
                .unwrap();
        }
        assert_eq!(chain.last_round(alice).await.unwrap().round_id, 3);
        assert_eq!(chain.last_round(bob).await.unwrap().round_id, 2);
    }

    #[tokio::test]
    async fn test_game_round_settles() {
        let network = SimulatedNetwork::with_seed(42).with_settlement_lag(1);
        let client = client(&network);
        let wallet = Arc::new(LocalWallet::random());
        let mut session = NeuralSession::new(
            client,
            Arc::new(network.game_chain(GAME)),
            wallet.clone(),
            fast_poll(),
        );

        // a choice before readiness is refused
        assert!(matches!(
            session.submit_choice(Pill::Red).await,
            Err(Error::InvalidState(_))
        ));

        session.start().await.unwrap();
        assert_eq!(session.phase(), Phase::Ready);

        let outcome = session.submit_choice(Pill::Blue).await.unwrap();
        let result = match outcome {
            RoundOutcome::Synced(result) => {
                assert_eq!(result.system_choice, Pill::Blue);
                assert_eq!(session.phase(), Phase::Synced);
                result
            }
            RoundOutcome::Desynced(result) => {
                assert_eq!(result.system_choice, Pill::Red);
                assert_eq!(session.phase(), Phase::Desynced);
                result
            }
            RoundOutcome::Cancelled => panic!("round cancelled"),
        };
        assert_eq!(result.user_choice, Pill::Blue);
        assert_eq!(result.round_id, 1);
        assert_eq!(session.state().round_id, Some(1));
        assert_eq!(session.state().system_choice, Some(result.system_choice));

        // another round right away
        let second = session.submit_choice(Pill::Red).await.unwrap();
        assert!(matches!(
            second,
            RoundOutcome::Synced(r) | RoundOutcome::Desynced(r) if r.round_id == 2
        ));

        session.reset();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.state().user_choice, None);
    }

    #[tokio::test]
    async fn test_rejection_resets_to_ready() {
        let network = SimulatedNetwork::with_seed(42);
        let wallet = Arc::new(LocalWallet::random());
        let mut session = NeuralSession::new(
            client(&network),
            Arc::new(network.game_chain(GAME)),
            wallet.clone(),
            fast_poll(),
        );
        session.start().await.unwrap();

        wallet.set_reject(true);
        let outcome = session.submit_choice(Pill::Red).await.unwrap();
        assert_eq!(outcome, RoundOutcome::Cancelled);
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.state().user_choice, None);
        assert_eq!(session.state().last_error, None);

        wallet.set_reject(false);
        assert!(!matches!(
            session.submit_choice(Pill::Red).await.unwrap(),
            RoundOutcome::Cancelled
        ));
    }

    #[tokio::test]
    async fn test_round_timeout_moves_to_error() {
        // the round never shows up within the budget
        let network = SimulatedNetwork::with_seed(42).with_settlement_lag(10);
        let mut session = NeuralSession::new(
            client(&network),
            Arc::new(network.game_chain(GAME)),
            Arc::new(LocalWallet::random()),
            fast_poll(),
        );
        session.start().await.unwrap();

        let err = session.submit_choice(Pill::Blue).await.unwrap_err();
        assert!(err.is_retriable_by_user());
        assert_eq!(session.phase(), Phase::Error);
        assert!(session.state().has_started);
        assert!(session.state().last_error.is_some());
        assert!(session.state().tx_hash.is_some());

        // the player plays again without restarting the session
        network.set_settlement_lag(0);
        let outcome = session.submit_choice(Pill::Blue).await.unwrap();
        assert!(matches!(
            outcome,
            RoundOutcome::Synced(r) | RoundOutcome::Desynced(r) if r.round_id == 2
        ));
        assert!(matches!(session.phase(), Phase::Synced | Phase::Desynced));
        assert_eq!(session.state().last_error, None);
    }

    #[tokio::test]
    async fn test_failed_start_refuses_choices() {
        let network = SimulatedNetwork::with_seed(8);
        let factory = CountingFactory {
            without_key: true,
            ..Default::default()
        };
        let client = Arc::new(FhevmClient::new(FheConfig::sepolia().unwrap(), factory).unwrap());
        let mut session = NeuralSession::new(
            client,
            Arc::new(network.game_chain(GAME)),
            Arc::new(LocalWallet::random()),
            fast_poll(),
        );
        assert!(matches!(session.start().await, Err(Error::KeyUnavailable)));
        assert_eq!(session.phase(), Phase::Error);
        assert!(!session.state().has_started);
        assert!(matches!(
            session.submit_choice(Pill::Red).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_start_does_not_wait_for_a_silent_relayer() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let config = FheConfig {
            relayer_url: format!("http://{addr}/"),
            ..FheConfig::sepolia().unwrap()
        };
        let network = SimulatedNetwork::with_seed(9);
        let client = Arc::new(FhevmClient::new(config, network.engine_factory()).unwrap());
        let mut session = NeuralSession::new(
            client,
            Arc::new(network.game_chain(GAME)),
            Arc::new(LocalWallet::random()),
            fast_poll(),
        );

        tokio::time::timeout(std::time::Duration::from_secs(2), session.start())
            .await
            .expect("start waited for the relayer probe")
            .unwrap();
        assert_eq!(session.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_transient_relayer_failures_are_absorbed() {
        let network = SimulatedNetwork::with_seed(5);
        let client = client(&network);
        let wallet = LocalWallet::random();
        let encrypted = client.encrypt_u32(1, GAME, wallet.address()).await.unwrap();

        network.inject_relayer_failures(&[503, 429]).await;
        let value = client
            .decrypt_handle(encrypted.handle.into(), GAME, wallet.address(), &wallet)
            .await
            .unwrap();
        assert_eq!(value, 1);
    }
}
