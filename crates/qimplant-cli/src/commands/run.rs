//! `run`: generate fixtures and feed each case to the tool under test.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::style;
use tracing::{error, info};

use crate::config::CliConfig;
use crate::driver::{Driver, DriverError};
use crate::exit::{EXIT_DRIVER_FAIL, EXIT_GENERATION_FAIL, EXIT_SUCCESS};

/// File name the tool writes inside each case directory.
pub const OUTPUT_FILE_NAME: &str = "output.circle";

#[derive(Args, Debug)]
pub struct RunCommand {
    /// Injection tool executable
    #[arg(long, value_name = "PATH", env = "QIMPLANT_DRIVER")]
    pub driver: PathBuf,

    /// Input model passed to every invocation
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Additional TOML case file
    #[arg(long, value_name = "PATH")]
    pub cases_file: Option<PathBuf>,

    /// Only run these cases (repeatable)
    #[arg(long = "case", value_name = "NAME")]
    pub cases: Vec<String>,
}

impl RunCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<i32> {
        if !self.input.exists() {
            return Err(DriverError::MissingInput(self.input.clone()).into());
        }

        let report = super::generate::generate(config, self.cases_file.clone(), &self.cases)?;
        let driver = Driver::new(&self.driver);

        let mut driver_failures = 0usize;
        for (name, manifest) in report
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|path| (o.name.as_str(), path)))
        {
            let case_dir = manifest.parent().map(PathBuf::from).unwrap_or_default();
            let output = case_dir.join(OUTPUT_FILE_NAME);
            match driver.invoke(&self.input, manifest, &output) {
                Ok(()) => {
                    info!(case = name, "driver succeeded");
                    println!("{} {name} {}", style("PASS").green(), output.display());
                }
                Err(e) => {
                    error!(case = name, error = %e, "driver failed");
                    println!("{} {name} {e}", style("FAIL").red());
                    driver_failures += 1;
                }
            }
        }

        Ok(if !report.all_succeeded() {
            EXIT_GENERATION_FAIL
        } else if driver_failures > 0 {
            EXIT_DRIVER_FAIL
        } else {
            EXIT_SUCCESS
        })
    }
}
