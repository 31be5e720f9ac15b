// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compares a container against the expected arrays named by a manifest.

use std::io;
use std::path::Path;

use qimplant_fixtures::manifest::resolve;
use qimplant_fixtures::{Manifest, ManifestEntry, load_npy};
use tracing::{debug, error, info, warn};

use crate::compare::compare_arrays;
use crate::container::{Container, dataset_for};
use crate::error::{IntegrityError, Result, ValidationError};
use crate::rules::Ruleset;
use crate::session::{Mismatch, ValidationReport, ValidationSession};

/// Validation engine holding the tolerance rules to apply.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    ruleset: Ruleset,
}

impl Validator {
    #[must_use]
    pub fn new(ruleset: Ruleset) -> Self {
        Self { ruleset }
    }

    #[must_use]
    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    /// Open the container and manifest, then check every node.
    ///
    /// Failing to open either input is an immediate error; problems with
    /// individual fields are collected into the report.
    pub fn validate_paths(
        &self,
        container_path: &Path,
        array_dir: &Path,
        manifest_path: &Path,
    ) -> Result<ValidationReport> {
        let container = Container::open(container_path)?;
        let manifest = Manifest::load(manifest_path)?;
        Ok(self.validate_container(&container, array_dir, &manifest))
    }

    /// Exhaustive scan: every node, every declared field, no early exit.
    pub fn validate_container(
        &self,
        container: &Container,
        array_dir: &Path,
        manifest: &Manifest,
    ) -> ValidationReport {
        info!(ruleset = %self.ruleset.name, nodes = container.node_count(), "validating container");
        let mut session = ValidationSession::new();

        for node in container.nodes() {
            match manifest.get(node) {
                None => {
                    debug!(node, "no manifest entry, skipping");
                    session.record_skip(node);
                }
                Some(entry) => self.check_node(&mut session, container, array_dir, node, entry),
            }
        }

        for (node, _) in manifest.iter().filter(|(n, _)| !container.contains_node(n)) {
            warn!(node, "manifest node not present in container");
        }

        let report = session.finish();
        info!(summary = %report.summary(), "validation finished");
        report
    }

    fn check_node(
        &self,
        session: &mut ValidationSession,
        container: &Container,
        array_dir: &Path,
        node: &str,
        entry: &ManifestEntry,
    ) {
        for (field, rel) in entry.fields() {
            let dataset = dataset_for(field);
            let actual = match container.dataset(node, dataset) {
                Ok(Some(actual)) => actual,
                Ok(None) => {
                    let e = IntegrityError::MissingDataset { node: node.to_string(), field, dataset };
                    error!(error = %e, "integrity failure");
                    session.record_integrity(e);
                    continue;
                }
                Err(message) => {
                    let e =
                        IntegrityError::UnreadableDataset { node: node.to_string(), dataset, message };
                    error!(error = %e, "integrity failure");
                    session.record_integrity(e);
                    continue;
                }
            };

            let path = resolve(array_dir, rel);
            let expected = match load_npy(&path) {
                Ok(expected) => expected,
                Err(err) => {
                    let e = IntegrityError::ExpectedArray {
                        node: node.to_string(),
                        field,
                        path,
                        message: err.to_string(),
                    };
                    error!(error = %e, "integrity failure");
                    session.record_integrity(e);
                    continue;
                }
            };

            let dtype = actual.kind();
            let tolerance = self.ruleset.tolerance(field, dtype);
            let comparison = compare_arrays(actual, &expected, tolerance);
            if comparison.is_match() {
                debug!(node, %field, %dtype, "field matches");
                session.record_match();
            } else {
                let mismatch = Mismatch {
                    node: node.to_string(),
                    field,
                    dtype,
                    tolerance,
                    comparison,
                    actual: actual.clone(),
                    expected,
                };
                error!(node, %field, mismatched = comparison.mismatched, "value mismatch");
                session.record_mismatch(mismatch);
            }
        }
    }
}

/// Validate with the built-in rules, printing one diagnostic line per
/// problem to stdout.
///
/// Returns `Ok(true)` when every declared field matched, `Ok(false)` on
/// numeric mismatches only, and [`ValidationError::Integrity`] when any
/// field could not be compared at all.
pub fn validate(container_path: &Path, array_dir: &Path, manifest_path: &Path) -> Result<bool> {
    let report = Validator::default().validate_paths(container_path, array_dir, manifest_path)?;
    report.print_diagnostics(&mut io::stdout().lock())?;
    into_verdict(report)
}

/// Map a finished report onto the boolean contract of [`validate`].
pub fn into_verdict(report: ValidationReport) -> Result<bool> {
    if report.integrity_errors.is_empty() {
        Ok(report.mismatches.is_empty())
    } else {
        Err(ValidationError::Integrity { errors: report.integrity_errors })
    }
}
