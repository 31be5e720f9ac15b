//! `validate`: compare an output container against a fixture manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use qimplant_validation::{Outcome, Ruleset, ValidationReport, Validator, load_policy, rules_builtin};

use crate::config::CliConfig;
use crate::exit::{EXIT_INTEGRITY, EXIT_MISMATCH, EXIT_SUCCESS};

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Container written by the tool under test
    #[arg(long, value_name = "PATH")]
    pub container: PathBuf,

    /// Manifest holding the expected values (qparam.json)
    #[arg(long, value_name = "PATH")]
    pub manifest: PathBuf,

    /// Directory the manifest's array paths are relative to [default: the manifest's directory]
    #[arg(long, value_name = "DIR")]
    pub array_dir: Option<PathBuf>,

    /// YAML tolerance policy
    #[arg(long, value_name = "PATH")]
    pub policy: Option<PathBuf>,

    /// Key of the ruleset inside the policy file
    #[arg(long, value_name = "KEY")]
    pub policy_key: Option<String>,
}

impl ValidateCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<i32> {
        let ruleset = select_rules(
            self.policy.as_deref().or(config.validate.policy.as_deref()),
            self.policy_key.as_deref().unwrap_or(&config.validate.policy_key),
        )?;
        let array_dir = match &self.array_dir {
            Some(dir) => dir.clone(),
            None => manifest_dir(&self.manifest),
        };
        let report = Validator::new(ruleset)
            .validate_paths(&self.container, &array_dir, &self.manifest)
            .with_context(|| format!("Failed to validate {}", self.container.display()))?;
        print_report(&report)
    }
}

pub(crate) fn select_rules(policy: Option<&Path>, key: &str) -> Result<Ruleset> {
    match policy {
        Some(path) => Ok(load_policy(path, key)?),
        None => Ok(rules_builtin()),
    }
}

pub(crate) fn manifest_dir(manifest: &Path) -> PathBuf {
    manifest.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Print diagnostics plus a verdict line; return the matching exit code.
pub(crate) fn print_report(report: &ValidationReport) -> Result<i32> {
    report.print_diagnostics(&mut std::io::stdout().lock())?;
    let (label, code) = match report.outcome() {
        Outcome::Passed => (style("PASSED").green(), EXIT_SUCCESS),
        Outcome::Mismatch => (style("FAILED").red(), EXIT_MISMATCH),
        Outcome::Integrity => (style("INTEGRITY").red().bold(), EXIT_INTEGRITY),
    };
    println!("{label} {}", report.summary());
    Ok(code)
}
