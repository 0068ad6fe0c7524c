use clap::Parser;
use neural_sync_client::cli::{execute_cmd, CmdConfig};
use observability::telemetry::init_tracing;

// CLI
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd_config = CmdConfig::parse();
    let config = cmd_config.load_config()?;
    if cmd_config.logs {
        init_tracing(&config.telemetry)?;
    }

    for line in execute_cmd(&cmd_config, &config).await? {
        println!("{line}");
    }
    Ok(())
}
