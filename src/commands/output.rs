//! @acp:module "Command Output"
//! @acp:summary "Shared reporting for annotate and remove commands"
//! @acp:domain cli
//! @acp:layer presentation

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::annotation::BatchResult;

/// How a command reports its outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

/// Spinner on stderr while producers and the scan run
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(template);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// @acp:summary "Print a batch outcome, with diffs under dry-run"
pub fn report(result: &BatchResult, action: &str, dry_run: bool, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if dry_run {
        for change in &result.changes {
            print!("{}", change.diff());
        }
    }

    for name in &result.succeeded {
        println!("{} {}", style("✓").green(), name);
    }
    for name in &result.skipped {
        println!("{} {} {}", style("→").dim(), name, style("(unchanged)").dim());
    }
    for failure in &result.failed {
        eprintln!(
            "{} {}: {}",
            style("✗").red(),
            failure.identifier,
            failure.message
        );
    }

    let verb = if dry_run {
        format!("Would have {}", action)
    } else {
        capitalize(action)
    };
    let marker = if result.has_failures() {
        style("⚠").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "\n{} {} {} of {} ({} files, {} skipped, {} failed)",
        marker,
        verb,
        result.succeeded.len(),
        result.total(),
        result.changes.len(),
        result.skipped.len(),
        result.failed.len()
    );
    if dry_run && !result.changes.is_empty() {
        println!("Run without {} to write changes", style("--dry-run").cyan());
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
