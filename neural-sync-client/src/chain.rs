use crate::error::ChainError;
use crate::round::RoundSnapshot;
use crate::rpc::JsonRpcClient;
use alloy_primitives::{Address, Bytes, B256, U64};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_RECEIPT_MAX_POLLS: u32 = 120;

// Game contract entry points used by the client
sol! {
    interface NeuralSyncGame {
        function getLastRound(address player)
            external
            view
            returns (bytes32 systemChoice, bytes32 isSyncedFlag, uint64 roundId);

        function play(bytes32 encryptedChoice, bytes inputProof) external returns (bytes32, bytes32);
    }
}

/// Mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
}

/// Read/write access to the game contract.
#[async_trait]
pub trait GameChain: Send + Sync {
    fn contract_address(&self) -> Address;

    /// Handles and id of the last round of `player`.
    async fn last_round(&self, player: Address) -> Result<RoundSnapshot, ChainError>;

    /// Submits a round, returns the transaction hash.
    async fn play(
        &self,
        from: Address,
        encrypted_choice: B256,
        input_proof: Bytes,
    ) -> Result<B256, ChainError>;

    /// Waits for `tx_hash` to be mined. A reverted transaction is an error.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, ChainError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: Option<U64>,
    status: Option<U64>,
}

/// [`GameChain`] over an Ethereum JSON-RPC endpoint. Transactions are sent
/// with `eth_sendTransaction`, the node or wallet behind the endpoint holds
/// the account.
#[derive(Debug, Clone)]
pub struct RpcGameChain {
    rpc: JsonRpcClient,
    contract: Address,
    receipt_poll_interval: Duration,
    receipt_max_polls: u32,
}

impl RpcGameChain {
    pub fn new(rpc: JsonRpcClient, contract: Address) -> Self {
        Self {
            rpc,
            contract,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            receipt_max_polls: DEFAULT_RECEIPT_MAX_POLLS,
        }
    }

    pub fn with_receipt_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_max_polls = max_polls;
        self
    }
}

/// Decodes the `getLastRound` return data.
pub fn decode_last_round(data: &[u8]) -> Result<RoundSnapshot, ChainError> {
    let decoded = NeuralSyncGame::getLastRoundCall::abi_decode_returns(data)?;
    Ok(RoundSnapshot {
        system_choice: decoded.systemChoice.into(),
        is_synced_flag: decoded.isSyncedFlag.into(),
        round_id: decoded.roundId,
    })
}

#[async_trait]
impl GameChain for RpcGameChain {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn last_round(&self, player: Address) -> Result<RoundSnapshot, ChainError> {
        let call = NeuralSyncGame::getLastRoundCall { player };
        let data = Bytes::from(call.abi_encode());
        let output: Bytes = self
            .rpc
            .request(
                "eth_call",
                json!([{ "to": self.contract, "data": data }, "latest"]),
            )
            .await?;
        let snapshot = decode_last_round(&output)?;
        tracing::debug!(%player, round_id = snapshot.round_id, "Read last round");
        Ok(snapshot)
    }

    async fn play(
        &self,
        from: Address,
        encrypted_choice: B256,
        input_proof: Bytes,
    ) -> Result<B256, ChainError> {
        let call = NeuralSyncGame::playCall {
            encryptedChoice: encrypted_choice,
            inputProof: input_proof,
        };
        let data = Bytes::from(call.abi_encode());
        let tx_hash: B256 = self
            .rpc
            .request(
                "eth_sendTransaction",
                json!([{ "from": from, "to": self.contract, "data": data }]),
            )
            .await?;
        tracing::info!(%from, %tx_hash, "Round transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, ChainError> {
        for poll in 1..=self.receipt_max_polls {
            let receipt: Option<RpcReceipt> = self
                .rpc
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            // pending transactions have no receipt, or one without block yet
            if let Some(RpcReceipt {
                transaction_hash,
                block_number: Some(block_number),
                status,
            }) = receipt
            {
                if status == Some(U64::ZERO) {
                    tracing::error!(%tx_hash, "Round transaction reverted");
                    return Err(ChainError::Reverted(tx_hash));
                }
                tracing::info!(%tx_hash, block = %block_number, poll, "Round transaction mined");
                return Ok(TransactionReceipt {
                    transaction_hash,
                    block_number: block_number.to::<u64>(),
                });
            }
            if poll < self.receipt_max_polls {
                tokio::time::sleep(self.receipt_poll_interval).await;
            }
        }
        Err(ChainError::ReceiptTimeout(tx_hash, self.receipt_max_polls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolValue;

    #[test]
    fn test_decode_last_round() {
        let system = B256::repeat_byte(0x01);
        let flag = B256::repeat_byte(0x02);
        let data = (system, flag, 42u64).abi_encode_params();

        let snapshot = decode_last_round(&data).unwrap();
        assert_eq!(snapshot.system_choice, system.into());
        assert_eq!(snapshot.is_synced_flag, flag.into());
        assert_eq!(snapshot.round_id, 42);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_last_round(&[1, 2, 3]),
            Err(ChainError::Decode(_))
        ));
    }

    #[test]
    fn test_call_selectors() {
        assert_eq!(
            NeuralSyncGame::getLastRoundCall::SIGNATURE,
            "getLastRound(address)"
        );
        assert_eq!(NeuralSyncGame::playCall::SIGNATURE, "play(bytes32,bytes)");

        let call = NeuralSyncGame::playCall {
            encryptedChoice: B256::repeat_byte(0xee),
            inputProof: Bytes::from_static(&[1, 2, 3]),
        };
        let encoded = call.abi_encode();
        assert_eq!(&encoded[..4], NeuralSyncGame::playCall::SELECTOR.as_slice());
        let decoded = NeuralSyncGame::playCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.encryptedChoice, B256::repeat_byte(0xee));
    }
}
