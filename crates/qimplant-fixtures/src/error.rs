//! Error types for fixture generation and persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::npy::NpyError;

/// Errors produced while generating or persisting fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("unsupported dtype: {0}")]
    UnsupportedDType(String),

    #[error(
        "scale shape {scale:?} ({scale_groups} groups) and zero-point shape {zerop:?} ({zerop_groups} groups) disagree"
    )]
    GroupCountMismatch {
        scale: Vec<usize>,
        zerop: Vec<usize>,
        scale_groups: usize,
        zerop_groups: usize,
    },

    #[error("scale shape {0:?} declares no quantization groups")]
    EmptyGroups(Vec<usize>),

    #[error("shape {shape:?} exceeds {limit} elements")]
    ShapeTooLarge { shape: Vec<usize>, limit: usize },

    #[error("value shape {0:?} has a zero-sized dimension")]
    EmptyValue(Vec<usize>),

    #[error("quantized dimension {axis} is out of range for value shape {shape:?}")]
    AxisOutOfRange { axis: usize, shape: Vec<usize> },

    #[error("quantized dimension {axis} has extent {extent} but {groups} quantization groups were declared")]
    AxisExtentMismatch { axis: usize, extent: usize, groups: usize },

    #[error("per-tensor quantization needs exactly one group, got {0}")]
    PerTensorGroups(usize),

    #[error("duplicate tensor role '{role}' in case '{case}'")]
    DuplicateRole { case: String, role: String },

    #[error("duplicate test case name: {0}")]
    DuplicateCase(String),

    #[error("unknown test case: {0}")]
    UnknownCase(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("array file {path}: {source}")]
    Array {
        path: PathBuf,
        #[source]
        source: NpyError,
    },

    #[error("invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("invalid test case name '{0}': must be a single path component")]
    InvalidCaseName(String),

    #[error("invalid case file {path}: {message}")]
    CaseFile { path: PathBuf, message: String },
}

impl FixtureError {
    /// True for errors raised before any data was produced (bad dtype or shapes).
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDType(_)
                | Self::GroupCountMismatch { .. }
                | Self::EmptyGroups(_)
                | Self::EmptyValue(_)
                | Self::ShapeTooLarge { .. }
                | Self::AxisOutOfRange { .. }
                | Self::AxisExtentMismatch { .. }
                | Self::PerTensorGroups(_)
                | Self::DuplicateRole { .. }
                | Self::DuplicateCase(_)
                | Self::UnknownCase(_)
                | Self::InvalidCaseName(_)
                | Self::CaseFile { .. }
        )
    }

    /// True for filesystem failures while persisting a case.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write { path: path.into(), source }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, FixtureError>;
