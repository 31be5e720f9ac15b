//! `cases`: list registered test cases.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::style;

use crate::config::CliConfig;
use crate::exit::EXIT_SUCCESS;

#[derive(Args, Debug)]
pub struct CasesCommand {
    /// Additional TOML case file
    #[arg(long, value_name = "PATH")]
    pub cases_file: Option<PathBuf>,
}

impl CasesCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<i32> {
        let cases_file = self.cases_file.as_deref().or(config.generate.cases_file.as_deref());
        let registry = super::build_registry(cases_file, &[])?;
        for case in registry.iter() {
            println!("{} {}", style(case.name()).bold(), case.roles().join(" "));
        }
        Ok(EXIT_SUCCESS)
    }
}
