use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Versioned compiler routing and idempotent multi-network contract deployment
#[derive(Parser, Debug)]
#[command(name = "contract-deploy")]
#[command(about = "Compile contracts with per-file compiler versions and deploy them idempotently")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct ContractDeployCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project configuration file (YAML or JSON)
    #[arg(short, long, global = true, default_value = "deploy.yaml")]
    pub config: PathBuf,

    /// Project root; defaults to the directory holding the config file
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Maximum compilation batches run in parallel
    #[arg(long, global = true)]
    pub jobs: Option<usize>,

    /// Directory holding per-network deployment records
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which compiler profile builds each source and the resulting batches
    Plan,

    /// Compile every batch
    Build {
        /// Do not write artifact JSON files
        #[arg(long)]
        no_artifacts: bool,
    },

    /// Build, deploy new or changed contracts, then verify them
    Deploy {
        /// Target networks; the configured default_network when omitted
        networks: Vec<String>,

        /// Skip source verification
        #[arg(long)]
        no_verify: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl ContractDeployCli {
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_arguments() {
        let cli = ContractDeployCli::parse_from([
            "contract-deploy",
            "deploy",
            "sepolia",
            "mainnet",
            "--no-verify",
            "-vv",
            "--config",
            "project/deploy.json",
        ]);

        match &cli.command {
            Commands::Deploy {
                networks,
                no_verify,
            } => {
                assert_eq!(networks, &vec!["sepolia".to_string(), "mainnet".to_string()]);
                assert!(*no_verify);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("project/deploy.json"));
        assert_eq!(cli.log_level(), tracing::Level::TRACE);
    }

    #[test]
    fn test_defaults() {
        let cli = ContractDeployCli::parse_from(["contract-deploy", "plan"]);
        assert_eq!(cli.config, PathBuf::from("deploy.yaml"));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.jobs.is_none());
    }
}
