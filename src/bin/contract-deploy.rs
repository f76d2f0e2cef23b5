use anyhow::{Context, Result};
use clap::Parser;
use contract_deploy::cli::{run_command, ContractDeployCli};
use contract_deploy::pipeline::CancellationSignal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ContractDeployCli::parse();

    // API keys and RPC credentials usually live in .env next to the config
    let env_file = cli
        .root
        .clone()
        .or_else(|| cli.config.parent().map(|p| p.to_path_buf()))
        .unwrap_or_default()
        .join(".env");
    let loaded = dotenvy::from_path(&env_file).is_ok() || dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt().with_max_level(cli.log_level()).init();

    info!("Starting contract-deploy v{}", env!("CARGO_PKG_VERSION"));
    if loaded {
        info!("Loaded environment from .env");
    }

    let cancel = CancellationSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight work");
            on_interrupt.cancel();
        }
    });

    let code = run_command(&cli, cancel)
        .await
        .with_context(|| format!("contract-deploy failed using {}", cli.config.display()))?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
