//! Quantized tensor fixtures for q-implant regression tests.
//!
//! The crate covers the producing half of the harness:
//! - [`generator`] draws random tensors that conform to a declared
//!   quantization scheme (dtype, per-group scale/zero-point, quantized axis)
//! - [`registry`] and [`cases`] hold the named test cases
//! - [`runner`] persists each case as `qparam.json` plus numbered `.npy` files
//!
//! # Quick start
//!
//! ```rust
//! use qimplant_fixtures::{FixtureGenerator, QuantDType, QuantizedDimension, TensorRequest};
//!
//! let mut generator = FixtureGenerator::new(Some(7));
//! let request = TensorRequest::new(QuantDType::U8, [2], [2], QuantizedDimension::Axis(0))
//!     .with_value_shape([2, 3]);
//! let fixture = generator.generate(&request).unwrap();
//! assert_eq!(fixture.scale.len(), 2);
//! assert_eq!(fixture.value.shape(), &[2, 3]);
//! ```

pub mod array;
pub mod cases;
pub mod dtype;
pub mod error;
pub mod generator;
pub mod manifest;
pub mod npy;
pub mod registry;
pub mod runner;

pub use array::{ArrayData, ElementKind, NumericArray, element_count};
pub use cases::{builtin_cases, builtin_registry};
pub use dtype::QuantDType;
pub use error::{FixtureError, Result};
pub use generator::{FixtureGenerator, QuantizedDimension, QuantizedTensorFixture, TensorRequest};
pub use manifest::{MANIFEST_FILE_NAME, Manifest, ManifestEntry, ManifestField};
pub use npy::{NpyError, load_npy, save_npy};
pub use registry::{DeclaredCase, FixtureSet, Generatable, TestRegistry, load_case_file};
pub use runner::{
    CaseOutcome, FixtureRunner, GeneratorSession, PersistedTensor, RunReport, load_fixture_set,
};
