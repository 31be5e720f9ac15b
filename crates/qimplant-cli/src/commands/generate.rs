//! `generate`: write fixture directories for the registered cases.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::style;
use qimplant_fixtures::{FixtureRunner, RunReport};
use tracing::info;

use crate::config::CliConfig;
use crate::exit::{EXIT_GENERATION_FAIL, EXIT_SUCCESS};

#[derive(Args, Debug)]
pub struct GenerateCommand {
    /// Additional TOML case file
    #[arg(long, value_name = "PATH")]
    pub cases_file: Option<PathBuf>,

    /// Only generate these cases (repeatable)
    #[arg(long = "case", value_name = "NAME")]
    pub cases: Vec<String>,
}

impl GenerateCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<i32> {
        let report = generate(config, self.cases_file.clone(), &self.cases)?;
        Ok(if report.all_succeeded() { EXIT_SUCCESS } else { EXIT_GENERATION_FAIL })
    }
}

/// Shared by `generate` and `run`: build the registry, write every case,
/// print one status line per case.
pub(crate) fn generate(
    config: &CliConfig,
    cases_file: Option<PathBuf>,
    selected: &[String],
) -> Result<RunReport> {
    let cases_file = cases_file.or_else(|| config.generate.cases_file.clone());
    let registry = super::build_registry(cases_file.as_deref(), selected)?;

    let mut runner = FixtureRunner::new(registry, &config.generate.output_dir, config.generate.seed);
    info!(seed = runner.seed(), "fixture seed");
    let report = runner.run();

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(path) => println!("{} {} {}", style("OK").green(), outcome.name, path.display()),
            Err(e) => println!("{} {} {e}", style("FAIL").red(), outcome.name),
        }
    }
    println!("seed {}", report.seed);
    Ok(report)
}
