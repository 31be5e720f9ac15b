// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for container access and validation.

use std::io;
use std::path::PathBuf;

use qimplant_fixtures::{FixtureError, ManifestField};
use thiserror::Error;

/// Failures opening, decoding, or writing a container file.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to read container {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write container {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid container: {0}")]
    Format(String),

    #[error("dataset '{key}' has unsupported dtype {dtype}")]
    UnsupportedDType { key: String, dtype: String },

    #[error("dataset '{key}' byte length does not match shape {shape:?}")]
    Truncated { key: String, shape: Vec<usize> },
}

/// A structural problem with one manifest-declared comparison.
///
/// Never a numeric disagreement: those are [`crate::Mismatch`]es.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("node '{node}': manifest declares '{field}' but the container has no '{dataset}' dataset")]
    MissingDataset { node: String, field: ManifestField, dataset: &'static str },

    #[error("node '{node}': dataset '{dataset}' is unreadable: {message}")]
    UnreadableDataset { node: String, dataset: &'static str, message: String },

    #[error("node '{node}': expected '{field}' array {path} could not be loaded: {message}")]
    ExpectedArray { node: String, field: ManifestField, path: PathBuf, message: String },
}

impl IntegrityError {
    /// Node the error belongs to.
    #[must_use]
    pub fn node(&self) -> &str {
        match self {
            Self::MissingDataset { node, .. }
            | Self::UnreadableDataset { node, .. }
            | Self::ExpectedArray { node, .. } => node,
        }
    }
}

/// Errors returned by validation entry points.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Manifest(#[from] FixtureError),

    #[error("{} integrity error(s) while validating", .errors.len())]
    Integrity { errors: Vec<IntegrityError> },

    #[error("invalid policy {path}: {message}")]
    Policy { path: PathBuf, message: String },

    #[error("failed to write diagnostics: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ValidationError>;
