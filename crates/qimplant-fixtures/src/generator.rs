//! Randomized quantized-tensor fixture generation.
//!
//! A [`TensorRequest`] declares the quantization scheme (dtype, group shapes,
//! quantized axis, value shape). [`FixtureGenerator`] validates it and fills
//! a [`QuantizedTensorFixture`] with random content that conforms to it.
//! Only shape and dtype conformance is a contract; values differ per seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::array::{ArrayData, NumericArray, element_count};
use crate::dtype::QuantDType;
use crate::error::{FixtureError, Result};

/// Lower bound for generated scales; dequantization stays well-defined.
pub const MIN_SCALE: f32 = 1e-6;

/// Upper bound (exclusive) for generated scales.
pub const MAX_SCALE: f32 = 1.0;

/// Value shape used when a request does not declare one.
pub const DEFAULT_VALUE_SHAPE: [usize; 1] = [1];

/// Largest element count accepted for any requested shape.
pub const MAX_FIXTURE_ELEMENTS: usize = 1 << 24;

fn bounded_count(shape: &[usize]) -> Result<usize> {
    element_count(shape)
        .filter(|&n| n <= MAX_FIXTURE_ELEMENTS)
        .ok_or_else(|| FixtureError::ShapeTooLarge { shape: shape.to_vec(), limit: MAX_FIXTURE_ELEMENTS })
}

/// Axis along which scale/zero-point groups vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuantizedDimensionRepr", into = "QuantizedDimensionRepr")]
pub enum QuantizedDimension {
    /// One group for the whole tensor.
    PerTensor,
    /// Per-channel groups along this axis of the value shape.
    Axis(usize),
}

impl QuantizedDimension {
    /// Unsigned form written to `qparam.json`.
    ///
    /// `PerTensor` maps to `0`: with a single group the axis carries no
    /// information, and the injection tool only accepts unsigned values.
    #[must_use]
    pub const fn manifest_value(self) -> u32 {
        match self {
            Self::PerTensor => 0,
            Self::Axis(a) => a as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum QuantizedDimensionRepr {
    Axis(usize),
    Named(String),
}

impl TryFrom<QuantizedDimensionRepr> for QuantizedDimension {
    type Error = String;

    fn try_from(value: QuantizedDimensionRepr) -> std::result::Result<Self, Self::Error> {
        match value {
            QuantizedDimensionRepr::Axis(a) => Ok(Self::Axis(a)),
            QuantizedDimensionRepr::Named(s) => match s.as_str() {
                "per_tensor" | "per-tensor" => Ok(Self::PerTensor),
                other => Err(format!("invalid quantized_dimension '{other}'")),
            },
        }
    }
}

impl From<QuantizedDimension> for QuantizedDimensionRepr {
    fn from(value: QuantizedDimension) -> Self {
        match value {
            QuantizedDimension::PerTensor => Self::Named("per_tensor".into()),
            QuantizedDimension::Axis(a) => Self::Axis(a),
        }
    }
}

/// Declared quantization shape of one tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorRequest {
    pub dtype: QuantDType,
    pub scale_shape: Vec<usize>,
    pub zerop_shape: Vec<usize>,
    pub quantized_dimension: QuantizedDimension,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_shape: Option<Vec<usize>>,
}

impl TensorRequest {
    pub fn new(
        dtype: QuantDType,
        scale_shape: impl Into<Vec<usize>>,
        zerop_shape: impl Into<Vec<usize>>,
        quantized_dimension: QuantizedDimension,
    ) -> Self {
        Self {
            dtype,
            scale_shape: scale_shape.into(),
            zerop_shape: zerop_shape.into(),
            quantized_dimension,
            value_shape: None,
        }
    }

    #[must_use]
    pub fn with_value_shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.value_shape = Some(shape.into());
        self
    }

    /// Value shape after applying the default.
    #[must_use]
    pub fn resolved_value_shape(&self) -> Vec<usize> {
        self.value_shape.clone().unwrap_or_else(|| DEFAULT_VALUE_SHAPE.to_vec())
    }

    /// Check the request and return its quantization group count.
    pub fn validate(&self) -> Result<usize> {
        let scale_groups = bounded_count(&self.scale_shape)?;
        let zerop_groups = bounded_count(&self.zerop_shape)?;
        if scale_groups != zerop_groups {
            return Err(FixtureError::GroupCountMismatch {
                scale: self.scale_shape.clone(),
                zerop: self.zerop_shape.clone(),
                scale_groups,
                zerop_groups,
            });
        }
        if scale_groups == 0 {
            return Err(FixtureError::EmptyGroups(self.scale_shape.clone()));
        }

        let value_shape = self.resolved_value_shape();
        if value_shape.contains(&0) {
            return Err(FixtureError::EmptyValue(value_shape));
        }
        bounded_count(&value_shape)?;

        match self.quantized_dimension {
            QuantizedDimension::PerTensor if scale_groups != 1 => {
                Err(FixtureError::PerTensorGroups(scale_groups))
            }
            QuantizedDimension::PerTensor => Ok(scale_groups),
            QuantizedDimension::Axis(axis) => {
                let extent = *value_shape
                    .get(axis)
                    .ok_or(FixtureError::AxisOutOfRange { axis, shape: value_shape.clone() })?;
                if extent != scale_groups {
                    return Err(FixtureError::AxisExtentMismatch {
                        axis,
                        extent,
                        groups: scale_groups,
                    });
                }
                Ok(scale_groups)
            }
        }
    }
}

/// One tensor's quantized storage format. Immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedTensorFixture {
    pub dtype: QuantDType,
    pub scale: Vec<f32>,
    pub zero_point: Vec<i64>,
    pub quantized_dimension: QuantizedDimension,
    pub value: NumericArray,
}

impl QuantizedTensorFixture {
    /// Number of quantization groups.
    #[must_use]
    pub fn groups(&self) -> usize {
        self.scale.len()
    }

    /// Scale as the 1-D `float32` array persisted to disk.
    #[must_use]
    pub fn scale_array(&self) -> NumericArray {
        NumericArray::vector(ArrayData::F32(self.scale.clone()))
    }

    /// Zero point as the 1-D `int64` array persisted to disk.
    #[must_use]
    pub fn zero_point_array(&self) -> NumericArray {
        NumericArray::vector(ArrayData::I64(self.zero_point.clone()))
    }
}

/// Source of random fixtures.
///
/// Seeded generators replay the same stream; unseeded ones pick a fresh seed
/// and report it through [`FixtureGenerator::seed`].
#[derive(Debug, Clone)]
pub struct FixtureGenerator {
    rng: ChaCha8Rng,
    seed: u64,
}

impl FixtureGenerator {
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        Self { rng: ChaCha8Rng::seed_from_u64(seed), seed }
    }

    /// Seed this generator was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate one fixture for `request`.
    ///
    /// Validation happens before any random draw, so a configuration error
    /// leaves the generator's stream untouched.
    pub fn generate(&mut self, request: &TensorRequest) -> Result<QuantizedTensorFixture> {
        let groups = request.validate()?;
        let value_shape = request.resolved_value_shape();
        let count = bounded_count(&value_shape)?;

        let scale: Vec<f32> =
            (0..groups).map(|_| self.rng.random_range(MIN_SCALE..MAX_SCALE)).collect();

        let lo = request.dtype.min_value().max(i128::from(i64::MIN)) as i64;
        let hi = request.dtype.max_value().min(i128::from(i64::MAX)) as i64;
        let zero_point: Vec<i64> = (0..groups).map(|_| self.rng.random_range(lo..=hi)).collect();

        let data = random_values(&mut self.rng, request.dtype, count);
        let value = NumericArray::new(value_shape.clone(), data).ok_or(FixtureError::EmptyValue(
            value_shape,
        ))?;

        debug!(
            dtype = %request.dtype,
            groups,
            value_shape = ?value.shape(),
            "generated quantized tensor fixture"
        );

        Ok(QuantizedTensorFixture {
            dtype: request.dtype,
            scale,
            zero_point,
            quantized_dimension: request.quantized_dimension,
            value,
        })
    }

    /// String-dtype entry point mirroring the original helper's argument order.
    pub fn tensor(
        &mut self,
        dtype: &str,
        scale_shape: &[usize],
        zerop_shape: &[usize],
        quantized_dimension: QuantizedDimension,
        value_shape: Option<&[usize]>,
    ) -> Result<QuantizedTensorFixture> {
        let mut request =
            TensorRequest::new(dtype.parse()?, scale_shape, zerop_shape, quantized_dimension);
        request.value_shape = value_shape.map(<[usize]>::to_vec);
        self.generate(&request)
    }
}

impl Default for FixtureGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Uniform draws over the dtype's full range, one per element.
fn random_values<R: Rng + ?Sized>(rng: &mut R, dtype: QuantDType, n: usize) -> ArrayData {
    match dtype {
        QuantDType::U8 => ArrayData::U8((0..n).map(|_| rng.random()).collect()),
        QuantDType::I8 => ArrayData::I8((0..n).map(|_| rng.random()).collect()),
        QuantDType::U16 => ArrayData::U16((0..n).map(|_| rng.random()).collect()),
        QuantDType::I16 => ArrayData::I16((0..n).map(|_| rng.random()).collect()),
        QuantDType::U32 => ArrayData::U32((0..n).map(|_| rng.random()).collect()),
        QuantDType::I32 => ArrayData::I32((0..n).map(|_| rng.random()).collect()),
        QuantDType::U64 => ArrayData::U64((0..n).map(|_| rng.random()).collect()),
        QuantDType::I64 => ArrayData::I64((0..n).map(|_| rng.random()).collect()),
    }
}
