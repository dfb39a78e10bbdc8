//! Human and machine readable run reports.

use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;

use crate::{
    graph::DeploymentPlan,
    orchestrator::{RunReport, StepStatus},
};

/// Table with one row per plan step: its status and address or error.
pub fn run_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["#", "Step", "Contract", "Status", "Address / Error"]);

    for (i, outcome) in report.outcomes.iter().enumerate() {
        let (status, detail) = match &outcome.status {
            StepStatus::Completed { address, .. } => ("deployed", address.to_string()),
            StepStatus::Failed { error } => ("FAILED", error.clone()),
            StepStatus::NotAttempted => ("not attempted", String::new()),
        };
        table.add_row(vec![
            (i + 1).to_string(),
            outcome.step.clone(),
            outcome.contract.clone(),
            status.to_string(),
            detail,
        ]);
    }

    table
}

/// Table describing an ordered plan without running it.
pub fn plan_table(plan: &DeploymentPlan) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["#", "Step", "Contract", "Arguments"]);

    for (i, step) in plan.iter().enumerate() {
        let args = step
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            (i + 1).to_string(),
            step.name.clone(),
            step.contract_name().to_string(),
            args,
        ]);
    }

    table
}

#[derive(Serialize)]
struct ReportFile<'a> {
    generated_at: u64,
    trellis_version: &'static str,
    #[serde(flatten)]
    report: &'a RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RunReport {
    /// Write the report as formatted JSON. The file is never read back.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = ReportFile {
            generated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            trellis_version: env!("CARGO_PKG_VERSION"),
            report: self,
            error: self.error.as_ref().map(|e| format!("{e:#}")),
        };

        let json = serde_json::to_string_pretty(&file).context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Run report saved");
        Ok(())
    }
}
