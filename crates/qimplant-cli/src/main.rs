//! q-implant test harness
//!
//! Generates quantized tensor fixtures, runs the injection tool on them and
//! validates the quantization parameters it wrote.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use console::style;
use tracing::error;

use qimplant_cli::commands::{CasesCommand, GenerateCommand, RunCommand, ValidateCommand};
use qimplant_cli::config::{CliConfig, ConfigBuilder};
use qimplant_cli::exit::{self, EXIT_SUCCESS};
use qimplant_cli::logging::setup_logging;

/// q-implant regression test harness
#[derive(Parser)]
#[command(name = "qimplant-test")]
#[command(about = "Fixture generation and validation for the q-implant tool")]
#[command(long_about = r#"
Generates randomized quantized-tensor fixtures (qparam.json plus numbered
.npy arrays), runs the quantization-parameter injection tool on them, and
validates the parameters stored in its output container.

Examples:
  # Write fixtures for every built-in case
  qimplant-test generate --output-dir fixtures --seed 42

  # Run the tool on each case
  qimplant-test run --driver ./q-implant --input model.circle

  # Check a container against a manifest
  qimplant-test validate --container out.safetensors --manifest fixtures/Conv2D_000_Q8/qparam.json
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<String>,

    /// Fixture output directory
    #[arg(long, value_name = "DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// Random seed for fixture generation
    #[arg(long, value_name = "N", global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate fixture directories
    #[command(alias = "gen")]
    Generate(GenerateCommand),

    /// Validate an output container against a manifest
    Validate(ValidateCommand),

    /// Generate fixtures and invoke the tool under test on each case
    Run(RunCommand),

    /// List registered test cases
    Cases(CasesCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("{} {e:#}", style("error:").red().bold());
            exit::code_for(&e)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_configuration(&cli)?;
    setup_logging(&config.logging)?;

    match cli.command {
        Some(Commands::Generate(cmd)) => cmd.execute(&config),
        Some(Commands::Validate(cmd)) => cmd.execute(&config),
        Some(Commands::Run(cmd)) => cmd.execute(&config),
        Some(Commands::Cases(cmd)) => cmd.execute(&config),
        Some(Commands::Config { action: ConfigAction::Show }) => {
            print!("{}", config.to_toml()?);
            Ok(EXIT_SUCCESS)
        }
        None => {
            Cli::command().print_help()?;
            Ok(EXIT_SUCCESS)
        }
    }
}

/// File, then environment, then flags.
fn load_configuration(cli: &Cli) -> Result<CliConfig> {
    let builder = match &cli.config {
        Some(path) => ConfigBuilder::new().from_file(path)?,
        None => ConfigBuilder::new(),
    };
    builder
        .from_env()?
        .log_level(cli.log_level.clone())
        .log_format(cli.log_format.clone())
        .output_dir(cli.output_dir.clone())
        .seed(cli.seed)
        .build()
        .context("Failed to build configuration")
}
