//! Persists registry cases to disk in the layout the injection tool reads.
//!
//! ```text
//! <output_dir>/<case name>/
//!     qparam.json     manifest, written last
//!     0.npy 1.npy ... one file per numeric field, numbered per directory
//! ```
//!
//! A case directory without `qparam.json` is incomplete.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::array::NumericArray;
use crate::dtype::QuantDType;
use crate::error::{FixtureError, Result};
use crate::generator::FixtureGenerator;
use crate::manifest::{MANIFEST_FILE_NAME, Manifest, ManifestEntry, ManifestField, resolve};
use crate::npy::{NpyError, load_npy, save_npy};
use crate::registry::{FixtureSet, Generatable, TestRegistry};

/// Issues sequential array file names within one case directory.
#[derive(Debug)]
pub struct GeneratorSession {
    dir: PathBuf,
    next_index: usize,
}

impl GeneratorSession {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), next_index: 0 }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.next_index
    }

    /// Write `array` as the next `<index>.npy`; returns its manifest-relative name.
    pub fn save_array(&mut self, array: &NumericArray) -> Result<String> {
        let file_name = format!("{}.npy", self.next_index);
        let path = self.dir.join(&file_name);
        save_npy(&path, array).map_err(|e| match e {
            NpyError::Io(source) => FixtureError::write(&path, source),
            other => FixtureError::Array { path: path.clone(), source: other },
        })?;
        self.next_index += 1;
        debug!(path = %path.display(), shape = ?array.shape(), "wrote array");
        Ok(file_name)
    }

    /// Write every field of `set` and return the manifest describing them.
    pub fn persist(&mut self, set: &FixtureSet) -> Result<Manifest> {
        let mut manifest = Manifest::new();
        for (role, fixture) in set.iter() {
            let value = self.save_array(&fixture.value)?;
            let scale = self.save_array(&fixture.scale_array())?;
            let zerop = self.save_array(&fixture.zero_point_array())?;
            manifest.insert(
                role,
                ManifestEntry {
                    dtype: Some(fixture.dtype),
                    scale: Some(scale),
                    zerop: Some(zerop),
                    quantized_dimension: Some(fixture.quantized_dimension.manifest_value()),
                    value: Some(value),
                },
            );
        }
        Ok(manifest)
    }
}

/// Result of one case in a run.
#[derive(Debug)]
pub struct CaseOutcome {
    pub name: String,
    pub result: Result<PathBuf>,
}

impl CaseOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-case outcomes of [`FixtureRunner::run`], in registration order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub seed: u64,
    pub outcomes: Vec<CaseOutcome>,
}

impl RunReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(CaseOutcome::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// Manifest paths of the cases that completed.
    #[must_use]
    pub fn manifests(&self) -> Vec<&Path> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok().map(PathBuf::as_path)).collect()
    }
}

/// Drives every registered case through generation and persistence.
pub struct FixtureRunner {
    registry: TestRegistry,
    output_dir: PathBuf,
    generator: FixtureGenerator,
}

impl FixtureRunner {
    pub fn new(registry: TestRegistry, output_dir: impl Into<PathBuf>, seed: Option<u64>) -> Self {
        Self { registry, output_dir: output_dir.into(), generator: FixtureGenerator::new(seed) }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.generator.seed()
    }

    #[must_use]
    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    /// Generate and persist every case. A failing case is recorded and the
    /// run moves on to the next one.
    pub fn run(&mut self) -> RunReport {
        info!(
            cases = self.registry.len(),
            seed = self.generator.seed(),
            output_dir = %self.output_dir.display(),
            "generating fixtures"
        );
        let mut report = RunReport { seed: self.generator.seed(), outcomes: Vec::new() };
        for case in self.registry.iter() {
            let result = run_case(case, &self.output_dir, &mut self.generator);
            match &result {
                Ok(path) => info!(case = case.name(), manifest = %path.display(), "case written"),
                Err(e) => error!(case = case.name(), error = %e, "case failed"),
            }
            report.outcomes.push(CaseOutcome { name: case.name().to_string(), result });
        }
        report
    }
}

fn run_case(
    case: &dyn Generatable,
    output_dir: &Path,
    generator: &mut FixtureGenerator,
) -> Result<PathBuf> {
    let set = case.generate(generator)?;

    let dir = output_dir.join(case.name());
    fs::create_dir_all(&dir).map_err(|e| FixtureError::write(&dir, e))?;

    // A reused directory must not look complete while it is being rewritten
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    if manifest_path.exists() {
        fs::remove_file(&manifest_path).map_err(|e| FixtureError::write(&manifest_path, e))?;
    }

    let mut session = GeneratorSession::new(&dir);
    let manifest = session.persist(&set)?;
    manifest.save(&manifest_path)?;
    Ok(manifest_path)
}

/// A tensor read back through its manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTensor {
    pub dtype: Option<QuantDType>,
    pub quantized_dimension: Option<u32>,
    pub value: Option<NumericArray>,
    pub scale: Option<NumericArray>,
    pub zero_point: Option<NumericArray>,
}

/// Reload a case directory written by [`FixtureRunner`].
pub fn load_fixture_set(case_dir: &Path) -> Result<Vec<(String, PersistedTensor)>> {
    let manifest = Manifest::load(&case_dir.join(MANIFEST_FILE_NAME))?;
    let mut tensors = Vec::with_capacity(manifest.len());
    for (name, entry) in manifest.iter() {
        let load = |field: ManifestField| -> Result<Option<NumericArray>> {
            entry
                .path(field)
                .map(|rel| {
                    let path = resolve(case_dir, rel);
                    load_npy(&path).map_err(|source| FixtureError::Array { path, source })
                })
                .transpose()
        };
        tensors.push((
            name.to_string(),
            PersistedTensor {
                dtype: entry.dtype,
                quantized_dimension: entry.quantized_dimension,
                value: load(ManifestField::Value)?,
                scale: load(ManifestField::Scale)?,
                zero_point: load(ManifestField::ZeroPoint)?,
            },
        ));
    }
    Ok(tensors)
}
