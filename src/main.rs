use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use workflow_runner::{
    cli::{
        commands::{RunCommand, ValidateCommand},
        output::*,
        terminal_output::TerminalReporter,
        Cli, Command,
    },
    core::{config::WorkflowConfig, RunError, Workflow},
    execution::PipelineRunner,
    host::{HostConfig, ProcessHost},
};

/// Exit status for unreadable or invalid workflow files
const CONFIG_ERROR_EXIT: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let code = match &cli.command {
        Command::Run(cmd) => run_workflow(cmd).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
    };

    std::process::exit(code)
}

/// Load and validate a workflow, reporting problems on stderr
fn load_workflow(file: &str) -> Option<Workflow> {
    let loaded = WorkflowConfig::from_file(file)
        .and_then(|config| config.to_workflow().map_err(anyhow::Error::from));

    match loaded {
        Ok(workflow) => Some(workflow),
        Err(e) => {
            eprintln!("{} Invalid workflow {}:", CROSS, style(file).bold());
            for cause in e.chain() {
                eprintln!("  {}", style(cause).red());
            }
            None
        }
    }
}

async fn run_workflow(cmd: &RunCommand) -> Result<i32> {
    let Some(workflow) = load_workflow(&cmd.file) else {
        return Ok(CONFIG_ERROR_EXIT);
    };
    let event = cmd.trigger_event();

    if !workflow.should_run(&event) {
        if !cmd.json {
            println!(
                "{} {} is not triggered by {} on {}; no run created",
                INFO,
                style(&workflow.name).bold(),
                event.event,
                style(&event.branch).cyan()
            );
        }
        return Ok(0);
    }

    if !cmd.json {
        println!(
            "{} Loaded workflow: {} ({} steps)",
            INFO,
            style(&workflow.name).bold(),
            workflow.steps.len()
        );
    }

    let mut host_config = HostConfig::new();
    if let Some(secs) = cmd.command_timeout {
        host_config = host_config.with_command_timeout(secs);
    }

    let mut runner = PipelineRunner::new(ProcessHost::new(), host_config);

    if !cmd.env.is_empty() {
        let mut base: BTreeMap<String, String> = std::env::vars().collect();
        base.extend(cmd.env.iter().cloned());
        runner = runner.with_base_env(base);
    }
    if let Some(dir) = &cmd.workdir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create work directory {}", dir.display()))?;
        runner = runner.with_workspace_root(dir.clone());
    }
    if !cmd.json {
        let reporter = Arc::new(TerminalReporter::new(console::Term::stdout().is_term()));
        runner = runner.with_event_handler(move |event| reporter.on_event(event));
    }

    let result = match runner.dispatch(&workflow, &event).await {
        Ok(Some(result)) => result,
        Ok(None) => return Ok(0),
        Err(RunError::Config(e)) => {
            eprintln!("{} {}", CROSS, style(e).red());
            return Ok(CONFIG_ERROR_EXIT);
        }
        Err(e) => {
            error!("Run could not start: {}", e);
            return Err(e).context("Failed to start run");
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if let Some(report) = result.test_report() {
            println!("{}", format_test_report(report));
        }
        println!("\n{}", format_run_summary(&result));
    }

    Ok(result.exit_code())
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<i32> {
    if !cmd.json {
        println!("{} Validating workflow...", INFO);
    }

    let Some(workflow) = load_workflow(&cmd.file) else {
        return Ok(CONFIG_ERROR_EXIT);
    };

    if cmd.json {
        let triggers: BTreeMap<String, Vec<&str>> = workflow
            .triggers
            .filters()
            .map(|(kind, filter)| (kind.to_string(), filter.patterns().collect()))
            .collect();
        let data = serde_json::json!({
            "name": workflow.name,
            "runs_on": workflow.runs_on,
            "on": triggers,
            "env": workflow.env,
            "steps": workflow.steps,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Workflow is valid!", CHECK);
        println!("{}", format_workflow(&workflow));
    }

    Ok(0)
}
