use crate::chain::{GameChain, RpcGameChain};
use crate::client::FhevmClient;
use crate::config::{checksum_address, ClientConfig, ClientSettings};
use crate::game::{NeuralSession, Pill, RoundOutcome};
use crate::readiness::{probe_http_client, probe_relayer_url};
use crate::round::RoundPollConfig;
use crate::rpc::JsonRpcClient;
use crate::simulation::SimulatedNetwork;
use crate::wallet::{LocalWallet, WalletSigner};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;

const DEFAULT_TRUNCATE_SIZE: usize = 4;

/// Shortens an address for display, `0x1234…abcd` for a size of 4.
pub fn truncate_address(address: &str, size: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 2 * size + 2 {
        return address.to_string();
    }
    let head: String = chars[..size + 2].iter().collect();
    let tail: String = chars[chars.len() - size..].iter().collect();
    format!("{head}…{tail}")
}

#[derive(Debug, Args, Clone)]
pub struct LastRoundParameters {
    /// Player address
    #[clap(long, short = 'p')]
    pub player: String,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateParameters {
    /// Pill to play every round with
    #[clap(value_enum, long)]
    pub pill: Pill,
    /// Number of rounds to play
    #[clap(long, short = 'n', default_value_t = 1)]
    pub rounds: u32,
    /// Number of round reads a new round stays hidden for
    #[clap(long, default_value_t = 1)]
    pub settlement_lag: u32,
    /// Skip the settlement delay of the configured round polling
    #[clap(long, default_value_t = false)]
    pub fast: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum NsCommand {
    /// Print the resolved configuration
    Config,
    /// Probe the configured relayer
    CheckRelayer,
    /// Read the last round of a player from the game contract
    LastRound(LastRoundParameters),
    /// Play rounds against an in-memory network
    Simulate(SimulateParameters),
}

#[derive(Debug, Parser)]
#[clap(name = "neural-sync", version, about = "Neural Sync FHE game client")]
pub struct CmdConfig {
    /// Path to the configuration file
    #[clap(long, short = 'f')]
    pub file_conf: Option<String>,
    /// The command to execute
    #[clap(subcommand)]
    pub command: NsCommand,
    /// Whether to print logs or not
    #[clap(long, short = 'l')]
    pub logs: bool,
}

impl CmdConfig {
    /// Loads and resolves the configuration layers, plus `--file-conf` if given.
    pub fn load_config(&self) -> anyhow::Result<ClientConfig> {
        let settings = ClientSettings::load(self.file_conf.as_deref())?;
        Ok(settings.resolve()?)
    }
}

/// Runs `cmd_config.command`, returns the lines to print.
pub async fn execute_cmd(cmd_config: &CmdConfig, config: &ClientConfig) -> anyhow::Result<Vec<String>> {
    let command = &cmd_config.command;
    tracing::info!("Starting command: {:?}", command);

    match command {
        NsCommand::Config => Ok(vec![serde_json::to_string_pretty(config)?]),
        NsCommand::CheckRelayer => {
            let probe = probe_relayer_url(&probe_http_client()?, &config.fhe.relayer_url).await?;
            Ok(vec![format!("Relayer {}: {probe}", config.fhe.relayer_url)])
        }
        NsCommand::LastRound(params) => {
            let player = checksum_address(&params.player)?;
            let rpc = JsonRpcClient::new(config.fhe.rpc_url.clone())?;
            let chain = RpcGameChain::new(rpc, config.game.contract_address);
            let round = chain.last_round(player).await?;
            Ok(vec![
                format!("Contract: {}", config.game.contract_link()),
                format!("Player: {}", truncate_address(&player.to_string(), DEFAULT_TRUNCATE_SIZE)),
                format!("Round id: {}", round.round_id),
                format!("System choice handle: {}", round.system_choice),
                format!("Synced flag handle: {}", round.is_synced_flag),
            ])
        }
        NsCommand::Simulate(params) => simulate(params, config).await,
    }
}

async fn simulate(params: &SimulateParameters, config: &ClientConfig) -> anyhow::Result<Vec<String>> {
    let network = SimulatedNetwork::new().with_settlement_lag(params.settlement_lag);
    let client = Arc::new(
        FhevmClient::new(config.fhe.clone(), network.engine_factory())?
            .with_retry_policy(config.relayer_retry.clone()),
    );
    let wallet = Arc::new(LocalWallet::random());
    let round_poll = if params.fast {
        RoundPollConfig {
            initial_delay_ms: 0,
            ..config.round_poll
        }
    } else {
        config.round_poll
    };
    let mut session = NeuralSession::new(
        client,
        Arc::new(network.game_chain(config.game.contract_address)),
        wallet.clone(),
        round_poll,
    );
    session.start().await?;

    let player = truncate_address(&wallet.address().to_string(), DEFAULT_TRUNCATE_SIZE);
    let mut lines = vec![format!("Player {player} playing {} round(s)", params.rounds)];
    for _ in 0..params.rounds {
        let line = match session.submit_choice(params.pill).await? {
            RoundOutcome::Synced(r) => format!(
                "Round {}: you chose {}, system chose {}, SYNCED",
                r.round_id, r.user_choice, r.system_choice
            ),
            RoundOutcome::Desynced(r) => format!(
                "Round {}: you chose {}, system chose {}, DESYNCED",
                r.round_id, r.user_choice, r.system_choice
            ),
            RoundOutcome::Cancelled => "Round cancelled".to_string(),
        };
        lines.push(line);
    }
    Ok(lines)
}
