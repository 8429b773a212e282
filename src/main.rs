use anyhow::{Context, Result};
use skillflow::cli::commands::{RunCommand, ValidateCommand};
use skillflow::cli::output::*;
use skillflow::cli::wiring::build_engine;
use skillflow::cli::{Cli, Command};
use skillflow::core::{EngineConfig, RawInput, StepRegistry};
use skillflow::execution::CancelHandle;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load engine config from {}", path))?,
        None => EngineConfig::default(),
    };

    match &cli.command {
        Command::Run(cmd) => run_case(cmd, &config).await?,
        Command::Validate(cmd) => validate_skills(cmd, &config)?,
    }

    Ok(())
}

fn skills_dir(flag: Option<&String>, config: &EngineConfig) -> PathBuf {
    flag.map(PathBuf::from)
        .unwrap_or_else(|| config.skills_dir.clone())
}

fn validate_skills(cmd: &ValidateCommand, config: &EngineConfig) -> Result<()> {
    let dir = skills_dir(cmd.skills.as_ref(), config);
    println!("{} Validating step definitions in {}...", INFO, dir.display());

    let registry = match StepRegistry::load_dir(&dir) {
        Ok(registry) => registry,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    };

    let registry = Arc::new(registry);
    if let Err(e) = build_engine(registry.clone(), config).build() {
        println!("{} Engine wiring is invalid:", CROSS);
        println!("  {}", style(e).red());
        std::process::exit(1);
    }

    println!("{} {} steps are valid", CHECK, style(registry.len()).cyan());
    for line in format_step_list(registry.steps()) {
        println!("  {}", line);
    }

    if cmd.json {
        let steps: Vec<_> = registry
            .steps()
            .iter()
            .map(|step| {
                serde_json::json!({
                    "identifier": step.identifier,
                    "order": step.order,
                    "version": step.version,
                    "condition": step.condition.as_ref().map(ToString::to_string),
                    "uses_tools": step.uses_tools,
                    "mandatory": step.mandatory,
                    "output_schema": step.output_schema.schema.to_shape(),
                })
            })
            .collect();
        println!("\n{}", serde_json::to_string_pretty(&serde_json::json!({ "steps": steps }))?);
    }

    Ok(())
}

async fn run_case(cmd: &RunCommand, config: &EngineConfig) -> Result<()> {
    let dir = skills_dir(cmd.skills.as_ref(), config);
    let registry = StepRegistry::load_dir(&dir)
        .with_context(|| format!("Failed to load step definitions from {}", dir.display()))?;
    println!(
        "{} Loaded {} steps from {}",
        INFO,
        style(registry.len()).cyan(),
        dir.display()
    );

    let mut raw_input = RawInput::new();
    for path in &cmd.input {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read input document {}", path))?;
        raw_input = raw_input.with_document(path.clone(), content);
    }

    let json = cmd.json;
    let engine = build_engine(Arc::new(registry), config);
    let engine = if json {
        engine
    } else {
        engine.on_event(|event| println!("{}", format_execution_event(event)))
    }
    .build()?;

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let result = engine.run_with_cancel(raw_input, &cancel).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        for line in format_run_result(&result) {
            println!("{}", line);
        }
    }

    if result.is_halted() {
        if let Some(halt) = &result.halted {
            error!("Run halted at {}: {}", halt.step, halt.detail);
        }
        std::process::exit(1);
    }

    Ok(())
}
