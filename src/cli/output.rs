use crate::compilation::BuildReport;
use crate::deploy::DeployAction;
use crate::pipeline::{PlannedBuild, RunSummary};
use crate::types::VerificationStatus;
use serde_json::json;

/// Print the route table and batches
pub fn print_plan(planned: &PlannedBuild) {
    println!("📋 Routes ({} sources)", planned.routes.len());
    for (path, route) in &planned.routes {
        println!("  {path} → {}", route.profile_id);
    }
    println!();

    println!("📦 Batches ({}):", planned.plan.batches.len());
    for batch in &planned.plan.batches {
        println!("  {} ({} sources)", batch.profile_id, batch.artifacts.len());
        for path in batch.paths() {
            println!("    • {path}");
        }
    }
}

pub fn plan_json(planned: &PlannedBuild) -> serde_json::Value {
    json!({
        "routes": planned
            .routes
            .iter()
            .map(|(path, route)| (path.clone(), json!(route.profile_id)))
            .collect::<serde_json::Map<_, _>>(),
        "batches": planned.plan.batches.iter().map(|batch| json!({
            "profile_id": batch.profile_id,
            "artifacts": batch.paths(),
        })).collect::<Vec<_>>(),
    })
}

pub fn print_build_report(report: &BuildReport) {
    if report.is_success() {
        println!(
            "✅ Compiled {} contracts in {:.2?}",
            report.compiled.len(),
            report.duration
        );
    } else {
        println!("❌ Build incomplete");
    }

    for failure in &report.failures {
        println!("  ❌ {failure}");
    }
    for profile_id in &report.cancelled_batches {
        println!("  ⏹  batch {profile_id} cancelled");
    }
    for contract in &report.oversized {
        println!(
            "  ⚠️  {} is {} bytes (limit {})",
            contract.name,
            contract.deployed_size,
            crate::compilation::MAX_DEPLOYED_SIZE
        );
    }
}

pub fn build_json(report: &BuildReport) -> serde_json::Value {
    json!({
        "success": report.is_success(),
        "contracts": report.compiled.iter().map(|c| json!({
            "name": c.fully_qualified_name(),
            "profile_id": c.profile_id,
            "bytecode_hash": c.bytecode_hash,
            "deployed_size": c.deployed_size,
        })).collect::<Vec<_>>(),
        "failures": report.failures,
        "cancelled_batches": report.cancelled_batches,
        "oversized": report.oversized,
    })
}

pub fn print_run_summary(summary: &RunSummary) {
    print_build_report(&summary.build);
    println!();

    for run in &summary.networks {
        match &run.deployment {
            Ok(report) => {
                println!(
                    "🌐 {} ({} transactions, {:.2?})",
                    run.network_id, report.transactions, report.duration
                );
                for outcome in &report.outcomes {
                    let (marker, detail) = match outcome.action {
                        DeployAction::Deployed => (
                            "✅",
                            outcome
                                .record
                                .as_ref()
                                .map(|r| format!("deployed at {}", r.address))
                                .unwrap_or_default(),
                        ),
                        DeployAction::Unchanged => (
                            "➖",
                            outcome
                                .record
                                .as_ref()
                                .map(|r| format!("unchanged at {}", r.address))
                                .unwrap_or_default(),
                        ),
                        DeployAction::Failed => (
                            "❌",
                            outcome.error.clone().unwrap_or_else(|| "failed".to_string()),
                        ),
                        DeployAction::Cancelled => ("⏹ ", "cancelled".to_string()),
                    };
                    println!("  {marker} {}: {detail}", outcome.contract_name);
                }
            }
            Err(e) => println!("🌐 {}\n  ❌ {e}", run.network_id),
        }
    }

    if !summary.verifications.is_empty() {
        println!();
        println!("🔍 Verification:");
        for result in &summary.verifications {
            let marker = match result.status {
                VerificationStatus::Verified => "✅",
                VerificationStatus::Pending => "⏳",
                VerificationStatus::Failed => "❌",
            };
            match &result.message {
                Some(message) => println!(
                    "  {marker} {}/{}: {message}",
                    result.network_id, result.contract_name
                ),
                None => println!("  {marker} {}/{}", result.network_id, result.contract_name),
            }
        }
    }
}

pub fn run_json(summary: &RunSummary) -> serde_json::Value {
    json!({
        "run_id": summary.run_id.to_string(),
        "build": build_json(&summary.build),
        "networks": summary.networks.iter().map(|run| match &run.deployment {
            Ok(report) => json!({
                "network_id": run.network_id,
                "transactions": report.transactions,
                "outcomes": report.outcomes,
            }),
            Err(e) => json!({
                "network_id": run.network_id,
                "error": e.to_string(),
            }),
        }).collect::<Vec<_>>(),
        "verifications": summary.verifications,
    })
}
