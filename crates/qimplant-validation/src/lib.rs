// SPDX-License-Identifier: MIT OR Apache-2.0
//! Validation of quantization parameters written by the q-implant tool.
//!
//! The validator walks every node of an output container, looks the node up
//! in a `qparam.json` manifest, and compares each declared field against its
//! expected `.npy` array under field- and dtype-specific tolerances.
//!
//! - nodes without a manifest entry are skipped
//! - numeric disagreements become [`Mismatch`]es and the scan continues
//! - fields that cannot be compared at all become [`IntegrityError`]s
//!
//! # Quick start
//!
//! ```rust
//! use qimplant_fixtures::{ElementKind, ManifestField, QuantDType};
//! use qimplant_validation::rules::{Tolerance, rules_builtin};
//!
//! let rules = rules_builtin();
//! let tol = rules.tolerance(ManifestField::Value, ElementKind::Int(QuantDType::I64));
//! assert_eq!(tol, Tolerance::new(5.0, 0.0));
//! assert!(tol.allows_int(15, 10));
//! ```

pub mod compare;
pub mod container;
pub mod error;
pub mod rules;
pub mod session;
pub mod validator;

pub use compare::{Comparison, compare_arrays};
pub use container::{
    Container, ContainerBuilder, SCALE_DATASET, WEIGHTS_DATASET, ZERO_POINT_DATASET, dataset_for,
};
pub use error::{ContainerError, IntegrityError, Result, ValidationError};
pub use rules::{Ruleset, Tolerance, ToleranceRule, load_policy, rules_builtin};
pub use session::{Mismatch, Outcome, ValidationReport, ValidationSession};
pub use validator::{Validator, into_verdict, validate};
