//! Output renderers and formatting helpers for CLI commands.

use std::path::Path;

use anyhow::anyhow;
use rulesctl_core::{ServerStatus, Version};
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};
use crate::harness::{RestoreOutcome, VerificationReport};

pub(crate) fn render_status(status: &ServerStatus, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(status)?,
        OutputFormat::Table => {
            println!("rules version: {}", status.rules_version);
            if let Some(source) = &status.rules_source {
                println!("rules source: {source}");
            }
            if let Some(result) = status.result {
                println!("result: {result}");
            }
            if let Some(version) = &status.version {
                match &status.release {
                    Some(release) => println!("server: {version} ({release})"),
                    None => println!("server: {version}"),
                }
            }
            if let Some(standalone) = status.standalone {
                println!("standalone: {standalone}");
            }
            if let Some(time) = &status.time_utc {
                println!("time (UTC): {time}");
            }
            if !status.manager_capabilities.is_empty() {
                println!("capabilities: {}", status.manager_capabilities.join(", "));
            }
            for (key, value) in &status.extra {
                println!("{key}: {}", format_extra_value(value));
            }
        }
    }
    Ok(())
}

/// Outcome of a command that changed the active rules.
pub(crate) fn render_rules_change(
    action: &str,
    marker: Option<Version>,
    status: &ServerStatus,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "action": action,
            "marker": marker.map(|version| version.to_string()),
            "rulesVersion": status.rules_version,
        }))?,
        OutputFormat::Table => {
            if marker.is_some() {
                println!("marker: {}", format_marker(marker));
            }
            println!("{action}: server now reports rules version {}", status.rules_version);
        }
    }
    Ok(())
}

pub(crate) fn render_local_version(
    path: &Path,
    marker: Option<Version>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "file": path.display().to_string(),
            "version": marker.map(|version| version.to_string()),
        }))?,
        OutputFormat::Table => match marker {
            Some(version) => println!("{version}"),
            None => println!("{} carries no version marker", path.display()),
        },
    }
    Ok(())
}

pub(crate) fn render_report(report: &VerificationReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("baseline version: {}", report.baseline_version);
            println!("synthetic version: {}", report.synthetic_version);
            for check in &report.passed {
                println!("  ok  {check}");
            }
            println!("restore: {}", format_restore(&report.restore));
        }
    }
    Ok(())
}

pub(crate) fn format_marker(marker: Option<Version>) -> String {
    marker.map_or_else(|| "<none>".to_string(), |version| version.to_string())
}

pub(crate) fn format_restore(outcome: &RestoreOutcome) -> String {
    match outcome {
        RestoreOutcome::Reuploaded => "original rules re-uploaded".to_string(),
        RestoreOutcome::Deleted => "custom rules cleared".to_string(),
        RestoreOutcome::Failed { detail } => format!("FAILED ({detail})"),
    }
}

fn format_extra_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}
