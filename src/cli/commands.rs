use crate::cli::options::{Commands, ContractDeployCli, OutputFormat};
use crate::cli::output::{
    build_json, plan_json, print_build_report, print_plan, print_run_summary, run_json,
};
use crate::config::ProjectConfig;
use crate::pipeline::{CancellationSignal, Pipeline, PipelineError, RunSummary};
use crate::registry::ProfileRegistry;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Process exit status reported when Ctrl-C interrupted the run.
pub const EXIT_CANCELLED: i32 = 130;

/// Loads the configuration named on the command line. Returns the project
/// root alongside the validated registry.
pub fn load_registry(cli: &ContractDeployCli) -> Result<(PathBuf, ProfileRegistry), PipelineError> {
    let config = ProjectConfig::load(&cli.config)?;
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => cli
            .config
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let registry = ProfileRegistry::load(&config)?;
    Ok((root, registry))
}

/// Runs the selected command and returns the process exit status.
pub async fn run_command(
    cli: &ContractDeployCli,
    cancel: CancellationSignal,
) -> Result<i32, PipelineError> {
    let (root, registry) = load_registry(cli)?;
    info!("Project root: {}", root.display());

    let mut pipeline = Pipeline::new(&registry, &root).with_cancellation(cancel.clone());
    if let Some(jobs) = cli.jobs {
        pipeline = pipeline.with_workers(jobs);
    }
    if let Some(state_dir) = &cli.state_dir {
        pipeline = pipeline.with_state_dir(state_dir);
    }

    let code = match &cli.command {
        Commands::Plan => {
            let planned = pipeline.plan().await?;
            match cli.format {
                OutputFormat::Text => print_plan(&planned),
                OutputFormat::Json => println!("{:#}", plan_json(&planned)),
            }
            0
        }
        Commands::Build { no_artifacts } => {
            if *no_artifacts {
                pipeline = pipeline.with_artifacts_dir(None);
            }
            let (_, report) = pipeline.build().await?;
            match cli.format {
                OutputFormat::Text => print_build_report(&report),
                OutputFormat::Json => println!("{:#}", build_json(&report)),
            }
            if !report.failures.is_empty() {
                1
            } else if !report.cancelled_batches.is_empty() {
                EXIT_CANCELLED
            } else {
                0
            }
        }
        Commands::Deploy {
            networks,
            no_verify,
        } => {
            let summary = pipeline.deploy(networks, !*no_verify).await?;
            match cli.format {
                OutputFormat::Text => print_run_summary(&summary),
                OutputFormat::Json => println!("{:#}", run_json(&summary)),
            }
            deploy_exit_code(&summary, cancel.is_cancelled())
        }
    };
    Ok(code)
}

/// Non-zero when a network could not resolve its accounts or when every
/// scheduled contract failed. Individual failures alone do not fail the run.
pub fn deploy_exit_code(summary: &RunSummary, cancelled: bool) -> i32 {
    let account_errors = summary.account_errors();
    for e in &account_errors {
        error!("{}", e);
    }

    if !account_errors.is_empty() || summary.all_failed() {
        1
    } else if cancelled {
        warn!("Run {} was cancelled", summary.run_id);
        EXIT_CANCELLED
    } else {
        0
    }
}
