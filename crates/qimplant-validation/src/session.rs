// SPDX-License-Identifier: MIT OR Apache-2.0
//! Accumulated state of one validation pass.

use std::fmt;
use std::io::{self, Write};

use qimplant_fixtures::{ElementKind, ManifestField, NumericArray};

use crate::compare::Comparison;
use crate::error::IntegrityError;
use crate::rules::Tolerance;

/// A field whose stored values disagree with the expected array.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub node: String,
    pub field: ManifestField,
    pub dtype: ElementKind,
    pub tolerance: Tolerance,
    pub comparison: Comparison,
    pub actual: NumericArray,
    pub expected: NumericArray,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MISMATCH node '{}' field '{}' ({}, {}): ", self.node, self.field, self.dtype, self.tolerance)?;
        if self.comparison.length_mismatch {
            write!(f, "element count {} vs {}", self.actual.len(), self.expected.len())?;
        } else {
            write!(
                f,
                "{}/{} elements differ, first at {}, max |diff| {}",
                self.comparison.mismatched,
                self.comparison.compared,
                self.comparison.first_mismatch.unwrap_or(0),
                self.comparison.max_abs_diff
            )?;
        }
        write!(f, "; actual {} expected {}", self.actual, self.expected)
    }
}

/// Overall classification of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// Only numeric disagreements.
    Mismatch,
    /// At least one structural failure, regardless of mismatches.
    Integrity,
}

/// Collects per-field results while the validator walks a container.
#[derive(Debug, Default)]
pub struct ValidationSession {
    checked: usize,
    skipped: Vec<String>,
    mismatches: Vec<Mismatch>,
    integrity_errors: Vec<IntegrityError>,
}

impl ValidationSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_match(&mut self) {
        self.checked += 1;
    }

    pub fn record_skip(&mut self, node: impl Into<String>) {
        self.skipped.push(node.into());
    }

    pub fn record_mismatch(&mut self, mismatch: Mismatch) {
        self.checked += 1;
        self.mismatches.push(mismatch);
    }

    pub fn record_integrity(&mut self, error: IntegrityError) {
        self.integrity_errors.push(error);
    }

    #[must_use]
    pub fn finish(self) -> ValidationReport {
        ValidationReport {
            checked: self.checked,
            skipped: self.skipped,
            mismatches: self.mismatches,
            integrity_errors: self.integrity_errors,
        }
    }
}

/// Final result of a validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Fields compared numerically, matching or not.
    pub checked: usize,
    /// Container nodes with no manifest entry.
    pub skipped: Vec<String>,
    pub mismatches: Vec<Mismatch>,
    pub integrity_errors: Vec<IntegrityError>,
}

impl ValidationReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome() == Outcome::Passed
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if !self.integrity_errors.is_empty() {
            Outcome::Integrity
        } else if !self.mismatches.is_empty() {
            Outcome::Mismatch
        } else {
            Outcome::Passed
        }
    }

    /// One line per mismatch and per integrity error.
    pub fn print_diagnostics<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for m in &self.mismatches {
            writeln!(out, "{m}")?;
        }
        for e in &self.integrity_errors {
            writeln!(out, "INTEGRITY {e}")?;
        }
        Ok(())
    }

    /// Single-line totals.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} checked, {} mismatched, {} integrity error(s), {} node(s) skipped",
            self.checked,
            self.mismatches.len(),
            self.integrity_errors.len(),
            self.skipped.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qimplant_fixtures::{ArrayData, QuantDType};

    fn mismatch() -> Mismatch {
        Mismatch {
            node: "conv_1".into(),
            field: ManifestField::ZeroPoint,
            dtype: ElementKind::Int(QuantDType::I64),
            tolerance: Tolerance::new(1.0, 0.0),
            comparison: Comparison {
                compared: 1,
                mismatched: 1,
                first_mismatch: Some(0),
                max_abs_diff: 3.0,
                length_mismatch: false,
            },
            actual: NumericArray::vector(ArrayData::I64(vec![5])),
            expected: NumericArray::vector(ArrayData::I64(vec![2])),
        }
    }

    #[test]
    fn outcome_prefers_integrity() {
        let mut s = ValidationSession::new();
        s.record_mismatch(mismatch());
        assert_eq!(s.finish().outcome(), Outcome::Mismatch);

        let mut s = ValidationSession::new();
        s.record_mismatch(mismatch());
        s.record_integrity(IntegrityError::MissingDataset {
            node: "conv_1".into(),
            field: ManifestField::Value,
            dataset: "weights",
        });
        let report = s.finish();
        assert_eq!(report.outcome(), Outcome::Integrity);
        assert!(!report.passed());
    }

    #[test]
    fn skips_alone_still_pass() {
        let mut s = ValidationSession::new();
        s.record_skip("pad_1");
        s.record_match();
        let report = s.finish();
        assert!(report.passed());
        assert_eq!(report.skipped, vec!["pad_1"]);
        assert_eq!(report.checked, 1);
    }

    #[test]
    fn diagnostics_name_node_field_and_values() {
        let mut s = ValidationSession::new();
        s.record_mismatch(mismatch());
        let mut out = Vec::new();
        s.finish().print_diagnostics(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("conv_1"));
        assert!(text.contains("zerop"));
        assert!(text.contains("actual [5]"));
        assert!(text.contains("expected [2]"));
    }
}
