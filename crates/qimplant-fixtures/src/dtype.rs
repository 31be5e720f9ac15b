//! Integer element kinds a quantized tensor can be stored as.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FixtureError;

/// Storage dtype of a quantized tensor.
///
/// Manifest spelling follows NumPy names (`uint8`, `int32`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuantDType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl QuantDType {
    /// Every supported dtype, narrowest first.
    pub const ALL: [QuantDType; 8] = [
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
    ];

    /// NumPy-style name used in manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::U64 => "uint64",
            Self::I64 => "int64",
        }
    }

    /// Size of a single element in bytes.
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::U64 | Self::I64 => 8,
        }
    }

    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// True for `int64`/`uint64`, which get the wider value tolerance.
    #[must_use]
    pub const fn is_64bit(self) -> bool {
        matches!(self, Self::U64 | Self::I64)
    }

    /// Smallest representable value.
    #[must_use]
    pub const fn min_value(self) -> i128 {
        match self {
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => 0,
            Self::I8 => i8::MIN as i128,
            Self::I16 => i16::MIN as i128,
            Self::I32 => i32::MIN as i128,
            Self::I64 => i64::MIN as i128,
        }
    }

    /// Largest representable value.
    #[must_use]
    pub const fn max_value(self) -> i128 {
        match self {
            Self::U8 => u8::MAX as i128,
            Self::I8 => i8::MAX as i128,
            Self::U16 => u16::MAX as i128,
            Self::I16 => i16::MAX as i128,
            Self::U32 => u32::MAX as i128,
            Self::I32 => i32::MAX as i128,
            Self::U64 => u64::MAX as i128,
            Self::I64 => i64::MAX as i128,
        }
    }

    /// Whether `v` fits in this dtype.
    #[must_use]
    pub const fn contains(self, v: i128) -> bool {
        v >= self.min_value() && v <= self.max_value()
    }
}

impl fmt::Display for QuantDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuantDType {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uint8" | "u8" => Ok(Self::U8),
            "int8" | "i8" => Ok(Self::I8),
            "uint16" | "u16" => Ok(Self::U16),
            "int16" | "i16" => Ok(Self::I16),
            "uint32" | "u32" => Ok(Self::U32),
            "int32" | "i32" => Ok(Self::I32),
            "uint64" | "u64" => Ok(Self::U64),
            "int64" | "i64" => Ok(Self::I64),
            _ => Err(FixtureError::UnsupportedDType(s.to_string())),
        }
    }
}

impl TryFrom<String> for QuantDType {
    type Error = FixtureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuantDType> for String {
    fn from(value: QuantDType) -> Self {
        value.as_str().to_string()
    }
}
