//! Command-line interface
//!
//! `train` applies `--set path=value` overrides to the default recipe,
//! resolves it, and runs the loop; `info` prints the effective
//! configuration after overrides; `settings` shows the dataset grid.

mod logging;

pub use logging::LogLevel;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{deep_replace, parse_overrides, MetaConfig};
use crate::data::DataSource;
use crate::error::{Error, Result};
use crate::recipe::{dataset_grid, instruction_tuning_recipe};
use crate::resolve::unroll;
use crate::train::train_model;

/// Declarative fine-tuning orchestration
#[derive(Parser, Debug, Clone)]
#[command(name = "ajustar")]
#[command(version)]
#[command(about = "Declarative fine-tuning orchestration: overrides, resolution, training")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the fine-tuning loop
    Train(TrainArgs),

    /// Print the effective configuration after overrides
    Info(InfoArgs),

    /// Show the dataset-settings grid
    Settings(SettingsArgs),
}

/// Arguments for the train command
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Configuration override, `path=value` (repeatable)
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,

    /// Project root config paths are anchored at (default: current dir)
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Resolve the configuration but skip training
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the info command
#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// Configuration override, `path=value` (repeatable)
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

/// Arguments for the settings command
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Print every expanded setting instead of a summary
    #[arg(long)]
    pub full: bool,
}

/// Output format for the info command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// YAML document
    Yaml,
    /// Pretty-printed JSON
    Json,
}

/// Execute a parsed CLI invocation
pub fn run_command(cli: Cli) -> Result<()> {
    let level = LogLevel::from_flags(cli.verbose, cli.quiet);
    match cli.command {
        Command::Train(args) => run_train(&args, level),
        Command::Info(args) => run_info(&args),
        Command::Settings(args) => run_settings(&args),
    }
}

fn project_root(arg: Option<&PathBuf>) -> PathBuf {
    arg.cloned()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_train(args: &TrainArgs, level: LogLevel) -> Result<()> {
    let recipe = instruction_tuning_recipe();

    // overrides and resolution both happen before any side effect: a bad
    // path or failed constructor stops the run with nothing on disk
    let overrides = parse_overrides(&args.set)?;
    let tree = deep_replace(&recipe.train_loop, &overrides)?;

    let meta = MetaConfig::new(project_root(args.project_root.as_ref()), level == LogLevel::Verbose);
    let mut objects = unroll(&tree, &meta)?;
    let suite = recipe.evaluators.build(&meta)?;
    objects.tracking.evaluator = Some(recipe.evaluators.describe());

    level.detail(&format!(
        "resolved: {} training examples, model `{}`",
        objects.train_data.len(),
        objects.trainer.model().model_str()
    ));

    if args.dry_run {
        level.info("configuration resolved; dry run, not training");
        return Ok(());
    }

    let report = train_model(&objects, &suite)?;
    level.info(&format!(
        "finished: {} steps over {} epochs, final loss {:.4}, best eval loss {}",
        report.steps,
        report.epochs_completed,
        report.final_train_loss,
        report
            .best_eval_loss
            .map_or_else(|| "n/a".to_string(), |l| format!("{l:.4}")),
    ));
    level.info(&format!("final checkpoint: {}", report.final_checkpoint.display()));
    Ok(())
}

fn run_info(args: &InfoArgs) -> Result<()> {
    let recipe = instruction_tuning_recipe();
    let overrides = parse_overrides(&args.set)?;
    let tree = deep_replace(&recipe.train_loop, &overrides)?;

    let json = tree.to_json();
    match args.format {
        OutputFormat::Yaml => {
            let body =
                serde_yaml::to_string(&json).map_err(|e| Error::Io(e.to_string()))?;
            println!("{body}");
        }
        OutputFormat::Json => {
            let body =
                serde_json::to_string_pretty(&json).map_err(|e| Error::Io(e.to_string()))?;
            println!("{body}");
        }
    }
    Ok(())
}

fn run_settings(args: &SettingsArgs) -> Result<()> {
    let grid = dataset_grid();
    let settings = grid.expand();
    println!(
        "{} axes, {} settings",
        grid.axis_names().len(),
        settings.len()
    );
    for name in grid.axis_names() {
        println!("  {name}");
    }
    if args.full {
        for setting in &settings {
            println!("{}", setting.to_json());
        }
    }
    Ok(())
}
