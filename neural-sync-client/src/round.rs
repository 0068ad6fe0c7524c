use crate::error::{record_error, Error, Result};
use crate::handle::CiphertextHandle;
use observability::metrics::METRICS;
use observability::metrics_names::OP_ROUND_POLL;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use typed_builder::TypedBuilder;
use validator::Validate;

const DEFAULT_INITIAL_DELAY_MS: u64 = 15_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Polling budget used after a round transaction confirmed.
///
/// The initial delay leaves room for the off-chain settlement of the round
/// and depends on the network latency, hence configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate, TypedBuilder)]
#[serde(default)]
pub struct RoundPollConfig {
    #[builder(default = DEFAULT_INITIAL_DELAY_MS)]
    pub initial_delay_ms: u64,
    #[builder(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    #[validate(range(min = 1))]
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl Default for RoundPollConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RoundPollConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Last round of a player as stored by the game contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Encrypted system pill.
    pub system_choice: CiphertextHandle,
    /// Encrypted flag, 1 when the player matched the system.
    pub is_synced_flag: CiphertextHandle,
    /// 0 when the player never played.
    pub round_id: u64,
}

impl RoundSnapshot {
    /// Whether this snapshot is a round settled after `previous`.
    pub fn is_newer_than(&self, previous: u64) -> bool {
        self.round_id != 0 && self.round_id > previous
    }
}

/// Waits for the round following `previous_round_id` to show up.
///
/// Sleeps the initial delay, then reads the round state up to
/// `max_attempts` times, `poll_interval` apart. There is no sleep after the
/// last read. A read failure aborts the wait.
pub async fn wait_for_new_round<R, Fut>(
    config: &RoundPollConfig,
    previous_round_id: u64,
    mut read_round: R,
) -> Result<RoundSnapshot>
where
    R: FnMut() -> Fut,
    Fut: Future<Output = Result<RoundSnapshot>>,
{
    if let Err(e) = METRICS.increment_request_counter(OP_ROUND_POLL) {
        tracing::warn!("Failed to increment request counter: {:?}", e);
    }
    let _timer = METRICS.time_operation(OP_ROUND_POLL);

    tracing::info!(
        previous_round_id,
        "Waiting {}ms for round settlement",
        config.initial_delay_ms
    );
    tokio::time::sleep(config.initial_delay()).await;

    let mut latest = previous_round_id;
    for attempt in 1..=config.max_attempts {
        let snapshot = read_round().await?;
        if snapshot.is_newer_than(previous_round_id) {
            tracing::info!(round_id = snapshot.round_id, attempt, "New round observed");
            return Ok(snapshot);
        }
        latest = snapshot.round_id;
        tracing::debug!(
            attempt,
            latest,
            previous_round_id,
            "Round not settled yet"
        );
        if attempt < config.max_attempts {
            tokio::time::sleep(config.poll_interval()).await;
        }
    }

    let err = Error::RoundSyncTimeout {
        previous: previous_round_id,
        latest,
        attempts: config.max_attempts,
    };
    tracing::warn!("{err}");
    record_error(OP_ROUND_POLL, &err);
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use tokio::time::Instant;

    fn snapshot(round_id: u64) -> RoundSnapshot {
        RoundSnapshot {
            system_choice: B256::repeat_byte(1).into(),
            is_synced_flag: B256::repeat_byte(2).into(),
            round_id,
        }
    }

    #[test]
    fn test_defaults() {
        let config = RoundPollConfig::default();
        assert_eq!(config.initial_delay(), Duration::from_secs(15));
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.max_attempts, 3);
        assert!(config.validate().is_ok());
        assert!(RoundPollConfig::builder().max_attempts(0).build().validate().is_err());
    }

    #[test]
    fn test_newer_round() {
        assert!(snapshot(4).is_newer_than(3));
        assert!(!snapshot(3).is_newer_than(3));
        assert!(!snapshot(2).is_newer_than(3));
        // a zeroed round is never a result, whatever the previous id
        assert!(!snapshot(0).is_newer_than(0));
        assert!(snapshot(1).is_newer_than(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_round_on_second_read() {
        let config = RoundPollConfig::default();
        let start = Instant::now();
        let mut reads = 0;
        let round = wait_for_new_round(&config, 7, || {
            reads += 1;
            let id = if reads < 2 { 7 } else { 8 };
            async move { Ok(snapshot(id)) }
        })
        .await
        .unwrap();
        assert_eq!(round.round_id, 8);
        assert_eq!(reads, 2);
        // 15s settlement + one interval
        assert!(start.elapsed() >= Duration::from_millis(18_000));
        assert!(start.elapsed() < Duration::from_millis(18_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_budget() {
        let config = RoundPollConfig::default();
        let start = Instant::now();
        let mut reads = 0;
        let err = wait_for_new_round(&config, 5, || {
            reads += 1;
            async { Ok(snapshot(5)) }
        })
        .await
        .unwrap_err();
        assert_eq!(reads, 3);
        assert!(matches!(
            err,
            Error::RoundSyncTimeout {
                previous: 5,
                latest: 5,
                attempts: 3
            }
        ));
        assert!(err.is_retriable_by_user());
        // no sleep after the last read
        assert!(start.elapsed() >= Duration::from_millis(21_000));
        assert!(start.elapsed() < Duration::from_millis(21_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_aborts() {
        let config = RoundPollConfig::builder().initial_delay_ms(0).build();
        let mut reads = 0;
        let err = wait_for_new_round(&config, 0, || {
            reads += 1;
            async { Err(Error::InvalidState("rpc down".to_string())) }
        })
        .await
        .unwrap_err();
        assert_eq!(reads, 1);
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
