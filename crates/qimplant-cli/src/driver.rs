//! Boundary to the external quantization-parameter injection tool.
//!
//! The tool is invoked as `<program> <input> <qparam.json> <output>` and
//! succeeds only if it exits with status 0 and leaves `<output>` behind.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("input model {0} does not exist")]
    MissingInput(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed { program: PathBuf, status: String, stderr: String },

    #[error("{0} was not produced")]
    MissingOutput(PathBuf),
}

/// Handle on the tool under test.
#[derive(Debug, Clone)]
pub struct Driver {
    program: PathBuf,
}

impl Driver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the tool once and check both success conditions.
    pub fn invoke(&self, input: &Path, manifest: &Path, output: &Path) -> Result<(), DriverError> {
        if !input.exists() {
            return Err(DriverError::MissingInput(input.to_path_buf()));
        }
        debug!(
            program = %self.program.display(),
            input = %input.display(),
            manifest = %manifest.display(),
            output = %output.display(),
            "invoking driver"
        );
        let out = Command::new(&self.program)
            .arg(input)
            .arg(manifest)
            .arg(output)
            .output()
            .map_err(|source| DriverError::Spawn { program: self.program.clone(), source })?;

        if !out.status.success() {
            return Err(DriverError::Failed {
                program: self.program.clone(),
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        if !output.exists() {
            return Err(DriverError::MissingOutput(output.to_path_buf()));
        }
        info!(output = %output.display(), "driver produced output");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_checked_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let err = Driver::new("/nonexistent/tool")
            .invoke(&dir.path().join("in.circle"), &dir.path().join("q.json"), &dir.path().join("o"))
            .unwrap_err();
        assert!(matches!(err, DriverError::MissingInput(_)));
    }

    #[test]
    fn spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.circle");
        std::fs::write(&input, b"model").unwrap();
        let err = Driver::new(dir.path().join("no-such-tool"))
            .invoke(&input, &dir.path().join("q.json"), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Spawn { .. }));
    }

    #[test]
    fn zero_exit_without_output_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.circle");
        std::fs::write(&input, b"model").unwrap();
        let err = Driver::new("true")
            .invoke(&input, &dir.path().join("q.json"), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, DriverError::MissingOutput(_)));
    }

    #[test]
    fn nonzero_exit_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.circle");
        std::fs::write(&input, b"model").unwrap();
        let err = Driver::new("false")
            .invoke(&input, &dir.path().join("q.json"), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Failed { .. }));
    }
}
