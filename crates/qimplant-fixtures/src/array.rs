//! Shaped numeric arrays shared by `.npy` files and container datasets.

use std::fmt;

use crate::dtype::QuantDType;

/// Element kind of a [`NumericArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Int(QuantDType),
    F32,
    F64,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(d) => write!(f, "{d}"),
            Self::F32 => f.write_str("float32"),
            Self::F64 => f.write_str("float64"),
        }
    }
}

impl std::str::FromStr for ElementKind {
    type Err = crate::error::FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float32" | "f32" => Ok(Self::F32),
            "float64" | "f64" => Ok(Self::F64),
            _ => s.parse().map(Self::Int),
        }
    }
}

/// Typed element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::U8($v) => $body,
            ArrayData::I8($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
        }
    };
}

impl ArrayData {
    #[must_use]
    pub fn len(&self) -> usize {
        for_each_variant!(self, v => v.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::U8(_) => ElementKind::Int(QuantDType::U8),
            Self::I8(_) => ElementKind::Int(QuantDType::I8),
            Self::U16(_) => ElementKind::Int(QuantDType::U16),
            Self::I16(_) => ElementKind::Int(QuantDType::I16),
            Self::U32(_) => ElementKind::Int(QuantDType::U32),
            Self::I32(_) => ElementKind::Int(QuantDType::I32),
            Self::U64(_) => ElementKind::Int(QuantDType::U64),
            Self::I64(_) => ElementKind::Int(QuantDType::I64),
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
        }
    }

    /// Element-wise widening for exact integer arithmetic; `None` for float data.
    #[must_use]
    pub fn to_i128(&self) -> Option<Vec<i128>> {
        match self {
            Self::U8(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::I8(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::U16(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::I16(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::U32(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::I32(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::U64(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::I64(v) => Some(v.iter().map(|&x| i128::from(x)).collect()),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    /// Lossy conversion to `f64` for tolerance checks and display.
    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Self::U8(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::I8(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::U16(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::I16(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::U32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::U64(v) => v.iter().map(|&x| x as f64).collect(),
            Self::I64(v) => v.iter().map(|&x| x as f64).collect(),
            Self::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::F64(v) => v.clone(),
        }
    }

    /// Borrowed little-endian byte image.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        for_each_variant!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Decode a little-endian byte image of `len` elements.
    ///
    /// Returns `None` when `bytes` is not exactly `len` elements long. The
    /// input may be unaligned.
    #[must_use]
    pub fn from_le_bytes(kind: ElementKind, bytes: &[u8], len: usize) -> Option<Self> {
        let width = match kind {
            ElementKind::Int(d) => d.element_size(),
            ElementKind::F32 => 4,
            ElementKind::F64 => 8,
        };
        if bytes.len() != len.checked_mul(width)? {
            return None;
        }
        Some(match kind {
            ElementKind::Int(QuantDType::U8) => Self::U8(bytes.to_vec()),
            ElementKind::Int(QuantDType::I8) => Self::I8(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::Int(QuantDType::U16) => Self::U16(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::Int(QuantDType::I16) => Self::I16(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::Int(QuantDType::U32) => Self::U32(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::Int(QuantDType::I32) => Self::I32(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::Int(QuantDType::U64) => Self::U64(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::Int(QuantDType::I64) => Self::I64(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::F32 => Self::F32(bytemuck::pod_collect_to_vec(bytes)),
            ElementKind::F64 => Self::F64(bytemuck::pod_collect_to_vec(bytes)),
        })
    }
}

/// Number of elements in `shape`, or `None` if the product overflows `usize`.
#[must_use]
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// A C-ordered array with an explicit shape.
///
/// An empty shape denotes a 0-d scalar holding one element.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NumericArray {
    /// Build an array, returning `None` if `shape` does not match the element count.
    #[must_use]
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Option<Self> {
        (element_count(&shape)? == data.len()).then_some(Self { shape, data })
    }

    /// 1-D array over `data`.
    #[must_use]
    pub fn vector(data: ArrayData) -> Self {
        Self { shape: vec![data.len()], data }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> ArrayData {
        self.data
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.data.kind()
    }

    /// Integer dtype of the elements, `None` for float arrays.
    #[must_use]
    pub fn quant_dtype(&self) -> Option<QuantDType> {
        match self.kind() {
            ElementKind::Int(d) => Some(d),
            ElementKind::F32 | ElementKind::F64 => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for NumericArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SHOWN: usize = 8;
        let values = self.data.to_f64();
        f.write_str("[")?;
        for (i, v) in values.iter().take(SHOWN).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        if values.len() > SHOWN {
            write!(f, ", ... ({} elements)", values.len())?;
        }
        write!(f, "] {} {:?}", self.kind(), self.shape)
    }
}
