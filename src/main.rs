use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, DrawingArgs, MappingCommands};
use config::Config;
use floorproof::geometry::{ConvergenceEngine, GeometricClassifier};
use floorproof::host::InMemoryHost;
use floorproof::layers::LayerLifecycle;
use floorproof::llm::OpenAiClient;
use floorproof::orchestrator::{Orchestrator, RunOutcome};
use floorproof::plan::parse_plan;
use floorproof::tools::{ExecutionLog, StepStatus, ToolDispatcher};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("floorproof")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("floorproof.log");
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Components shared by every drawing command
struct Toolkit {
    lifecycle: Arc<LayerLifecycle>,
    engine: Arc<ConvergenceEngine>,
    dispatcher: ToolDispatcher,
}

impl Toolkit {
    fn new(config: &Config) -> Self {
        let lifecycle = Arc::new(LayerLifecycle::from_policy(config.layers.clone()));
        let engine = Arc::new(ConvergenceEngine::new(config.geometry.convergence.clone()));
        let dispatcher = ToolDispatcher::standard(
            lifecycle.clone(),
            engine.clone(),
            GeometricClassifier::new(config.geometry.classifier),
        );
        Self {
            lifecycle,
            engine,
            dispatcher,
        }
    }
}

fn open_drawing(args: &DrawingArgs) -> Result<InMemoryHost> {
    InMemoryHost::from_path(&args.drawing).context(format!("Failed to open drawing {}", args.drawing.display()))
}

fn save_drawing(host: &InMemoryHost, args: &DrawingArgs) -> Result<()> {
    if args.save {
        host.save(&args.drawing)
            .context(format!("Failed to save drawing {}", args.drawing.display()))?;
        println!("{} {}", "Saved:".green(), args.drawing.display());
    }
    Ok(())
}

fn print_log(log: &ExecutionLog) {
    if log.is_empty() {
        println!("  {}", log.render().as_str().dimmed());
    }
    for step in &log.steps {
        let line = step.to_string();
        let line = line.as_str();
        match step.status {
            StepStatus::Ok => println!("  {}", line),
            StepStatus::Message => println!("  {}", line.cyan()),
            StepStatus::Warning => println!("  {}", line.yellow()),
            StepStatus::Error => println!("  {}", line.red()),
        }
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { objective, drawing } => handle_run_command(objective, drawing, config).await,
        Commands::Exec { plan, drawing } => handle_exec_command(plan, drawing, config).await,
        Commands::Prepare { drawing } => handle_prepare_command(drawing, config).await,
        Commands::Mapping { command } => handle_mapping_command(command, config),
    }
}

async fn handle_run_command(objective: &str, args: &DrawingArgs, config: &Config) -> Result<()> {
    info!("Running objective {:?} against {}", objective, args.drawing.display());
    let host = open_drawing(args)?;
    let toolkit = Toolkit::new(config);
    let llm = OpenAiClient::new(config.llm.clone()).context("Failed to create language-model client")?;
    let orchestrator = Orchestrator::new(
        Arc::new(llm),
        toolkit.dispatcher,
        toolkit.lifecycle,
        config.orchestrator.clone(),
    );

    println!("{} {}", "Objective:".green(), objective);
    let report = orchestrator.run(&host, objective).await.context("Run failed")?;

    println!("{}\n{}", "Survey:".cyan(), report.survey);
    for attempt in &report.attempts {
        println!("{} {}", "Attempt".cyan(), attempt.attempt);
        print_log(&attempt.log);
        if let Some(verdict) = &attempt.verdict {
            let label = if verdict.success { "PASS".green() } else { "FAIL".red() };
            println!("  {} {}", label, verdict.feedback);
        }
    }
    println!("{} {}", "Tokens:".dimmed(), report.total_tokens);

    save_drawing(&host, args)?;
    match report.outcome {
        RunOutcome::Done => {
            println!("{}", "Drawing proofed".green());
            Ok(())
        }
        RunOutcome::Exhausted { reason } => bail!("Run exhausted: {}", reason),
    }
}

async fn handle_exec_command(plan_path: &Path, args: &DrawingArgs, config: &Config) -> Result<()> {
    info!("Executing plan {}", plan_path.display());
    let document = fs::read_to_string(plan_path).context(format!("Failed to read plan {}", plan_path.display()))?;
    let plan = parse_plan(&document)?;
    let host = open_drawing(args)?;
    let toolkit = Toolkit::new(config);

    let log = toolkit.dispatcher.execute_plan(&host, &plan).await?;
    print_log(&log);
    save_drawing(&host, args)
}

async fn handle_prepare_command(args: &DrawingArgs, config: &Config) -> Result<()> {
    let host = open_drawing(args)?;
    let toolkit = Toolkit::new(config);
    let shielded = toolkit.lifecycle.shielded_layers()?;

    let report = toolkit.engine.prepare_geometry(&host, &shielded).await?;
    println!("{} {}", "Prepared:".green(), report);
    save_drawing(&host, args)
}

fn handle_mapping_command(command: &MappingCommands, config: &Config) -> Result<()> {
    let lifecycle = LayerLifecycle::from_policy(config.layers.clone());
    match command {
        MappingCommands::Learn { source, target } => {
            let mapping = lifecycle.learn_mapping(source, target)?;
            println!(
                "{} {} -> {} ({} total)",
                "Learned:".green(),
                source,
                target,
                mapping.len()
            );
        }
        MappingCommands::Show => {
            let mapping = lifecycle.mapping()?;
            if mapping.is_empty() {
                println!("{}", "No layer mappings".yellow());
            }
            for (source, target) in mapping.iter() {
                println!("  {} -> {}", source, target.cyan());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
