//! CLI output formatting

use crate::{
    core::{RunResult, RunStatus, StepOutcome, TestReport, Workflow},
    execution::ExecutionEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a step outcome for display
pub fn format_outcome(name: &str, outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Success => format!("{} {}", CHECK, style(name).green()),
        StepOutcome::ToleratedFailure(error) => format!(
            "{} {} ({}, continuing): {}",
            WARN,
            style(name).yellow(),
            error.kind(),
            style(error).dim()
        ),
        StepOutcome::FatalFailure(error) => format!(
            "{} {} ({}): {}",
            CROSS,
            style(name).red(),
            error.kind(),
            style(error).dim()
        ),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            trigger,
            total_steps,
        } => format!(
            "{} Starting run {} for {} on {} ({} steps)",
            ROCKET,
            style(&run_id.to_string()[..8]).dim(),
            style(trigger.event).bold(),
            style(&trigger.branch).cyan(),
            total_steps
        ),
        ExecutionEvent::StepStarted {
            index, total, name, ..
        } => format!(
            "{} [{}/{}] {}",
            SPINNER,
            index + 1,
            total,
            style(name).cyan()
        ),
        ExecutionEvent::StepFinished { name, outcome, .. } => format_outcome(name, outcome),
        ExecutionEvent::Warning { step, warning, .. } => format!(
            "{} {} ({}): {}",
            WARN,
            style(step).yellow(),
            warning.kind(),
            warning
        ),
        ExecutionEvent::RunFinished { run_id, status } => format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format aggregated test counts, one line per file
pub fn format_test_report(report: &TestReport) -> String {
    let mut lines = vec![format!("{} {}", INFO, style(report.summary()).bold())];
    for file in &report.files {
        let icon = if file.is_clean() { CHECK } else { CROSS };
        lines.push(format!(
            "  {}{} ({} passed, {} failed, {} errors)",
            icon, file.path, file.passed, file.failed, file.errors
        ));
    }
    lines.join("\n")
}

/// Final summary of a run
pub fn format_run_summary(result: &RunResult) -> String {
    let mut lines = Vec::new();

    let duration = result
        .duration()
        .to_std()
        .map(format_duration)
        .unwrap_or_else(|_| "0s".to_string());
    let headline = if result.is_success() {
        format!("{} Run {} in {}", CHECK, style("succeeded").green(), duration)
    } else {
        format!("{} Run {} in {}", CROSS, style("failed").red(), duration)
    };
    lines.push(headline);

    if let Some(step) = result.failed_step() {
        lines.push(format!("  Failed at: {}", style(&step.name).red()));
    }
    if !result.skipped_steps.is_empty() {
        lines.push(format!(
            "  Skipped: {}",
            style(result.skipped_steps.join(", ")).dim()
        ));
    }
    for step in result.tolerated_failures() {
        lines.push(format!("  Tolerated: {}", style(&step.name).yellow()));
    }
    for warning in &result.warnings {
        lines.push(format!("  Warning ({}): {}", warning.step, warning.warning));
    }

    lines.join("\n")
}

/// Summary of a validated workflow
pub fn format_workflow(workflow: &Workflow) -> String {
    let mut lines = vec![
        format!("  Name: {}", style(&workflow.name).bold()),
        format!("  Steps: {}", style(workflow.steps.len()).cyan()),
    ];

    if let Some(runs_on) = &workflow.runs_on {
        lines.push(format!("  Runs on: {}", runs_on));
    }
    for (kind, filter) in workflow.triggers.filters() {
        let branches: Vec<_> = filter.patterns().collect();
        let branches = if branches.is_empty() {
            "all branches".to_string()
        } else {
            branches.join(", ")
        };
        lines.push(format!("  On {}: {}", kind, branches));
    }
    for (index, step) in workflow.steps.iter().enumerate() {
        let tolerance = if step.continue_on_failure { " (continue on failure)" } else { "" };
        lines.push(format!(
            "    {}. {} [{}]{}",
            index + 1,
            step.name,
            step.action.kind(),
            style(tolerance).dim()
        ));
    }

    lines.join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
