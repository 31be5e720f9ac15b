//! NumPy `.npy` reader/writer for fixture arrays.
//!
//! Layout: `\x93NUMPY` | major(1) | minor(1) | header_len (u16 LE for v1, u32 LE for v2)
//! | python dict header | little-endian C-order data.

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::array::{ArrayData, ElementKind, NumericArray, element_count};
use crate::dtype::QuantDType;

const NUMPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Errors from decoding or encoding `.npy` data.
#[derive(Debug, Error)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not an npy file (bad magic {0:?})")]
    InvalidMagic(Vec<u8>),

    #[error("unsupported npy version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("invalid npy header: {0}")]
    InvalidHeader(String),

    #[error("unsupported dtype descriptor '{0}'")]
    UnsupportedDescr(String),

    #[error("fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("header too large for npy v1.0 ({0} bytes)")]
    HeaderTooLarge(usize),
}

impl ElementKind {
    /// NumPy dtype descriptor (little-endian).
    #[must_use]
    pub const fn numpy_descr(self) -> &'static str {
        match self {
            Self::Int(QuantDType::U8) => "|u1",
            Self::Int(QuantDType::I8) => "|i1",
            Self::Int(QuantDType::U16) => "<u2",
            Self::Int(QuantDType::I16) => "<i2",
            Self::Int(QuantDType::U32) => "<u4",
            Self::Int(QuantDType::I32) => "<i4",
            Self::Int(QuantDType::U64) => "<u8",
            Self::Int(QuantDType::I64) => "<i8",
            Self::F32 => "<f4",
            Self::F64 => "<f8",
        }
    }

    /// Parse a NumPy descriptor. Single-byte kinds accept either `|` or `<`.
    #[must_use]
    pub fn from_numpy_descr(s: &str) -> Option<Self> {
        match s {
            "|u1" | "<u1" => Some(Self::Int(QuantDType::U8)),
            "|i1" | "<i1" => Some(Self::Int(QuantDType::I8)),
            "<u2" => Some(Self::Int(QuantDType::U16)),
            "<i2" => Some(Self::Int(QuantDType::I16)),
            "<u4" => Some(Self::Int(QuantDType::U32)),
            "<i4" => Some(Self::Int(QuantDType::I32)),
            "<u8" => Some(Self::Int(QuantDType::U64)),
            "<i8" => Some(Self::Int(QuantDType::I64)),
            "<f4" => Some(Self::F32),
            "<f8" => Some(Self::F64),
            _ => None,
        }
    }
}

/// Serialize `array` as `.npy` v1.0.
pub fn write_npy<W: Write>(writer: &mut W, array: &NumericArray) -> Result<(), NpyError> {
    let shape_str = match array.shape() {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let dims: Vec<String> = dims.iter().map(ToString::to_string).collect();
            format!("({})", dims.join(", "))
        }
    };
    let descr = array.kind().numpy_descr();
    let header_dict =
        format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape_str}, }}");

    // Pad so the data section starts on a 64-byte boundary
    let prefix_len = NUMPY_MAGIC.len() + 2 + 2;
    let unpadded = prefix_len + header_dict.len() + 1;
    let padding = (64 - (unpadded % 64)) % 64;
    let padded_header = format!("{header_dict}{}\n", " ".repeat(padding));
    let header_len = u16::try_from(padded_header.len())
        .map_err(|_| NpyError::HeaderTooLarge(padded_header.len()))?;

    writer.write_all(NUMPY_MAGIC)?;
    writer.write_all(&[1u8, 0u8])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(padded_header.as_bytes())?;
    writer.write_all(array.data().as_bytes())?;
    Ok(())
}

/// Deserialize an `.npy` stream.
pub fn read_npy<R: Read>(reader: &mut R) -> Result<NumericArray, NpyError> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != NUMPY_MAGIC {
        return Err(NpyError::InvalidMagic(magic.to_vec()));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            usize::from(u16::from_le_bytes(buf))
        }
        2 | 3 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            u32::from_le_bytes(buf) as usize
        }
        major => return Err(NpyError::UnsupportedVersion { major, minor: version[1] }),
    };

    let mut header_bytes = vec![0u8; header_len];
    reader.read_exact(&mut header_bytes)?;
    let header = std::str::from_utf8(&header_bytes)
        .map_err(|e| NpyError::InvalidHeader(format!("invalid header UTF-8: {e}")))?
        .trim();

    let kind = parse_descr(header)?;
    if parse_fortran_order(header)? {
        return Err(NpyError::FortranOrder);
    }
    let shape = parse_shape(header)?;

    let overflow = || NpyError::InvalidHeader(format!("shape {shape:?} overflows"));
    let len = element_count(&shape).ok_or_else(overflow)?;
    let byte_len = len.checked_mul(array_width(kind)).ok_or_else(overflow)?;
    // Sized by what the stream holds, not by the header's claim.
    let mut bytes = Vec::new();
    reader.by_ref().take(byte_len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != byte_len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    let data = ArrayData::from_le_bytes(kind, &bytes, len)
        .ok_or_else(|| NpyError::InvalidHeader("data length does not match shape".into()))?;
    NumericArray::new(shape, data)
        .ok_or_else(|| NpyError::InvalidHeader("data length does not match shape".into()))
}

/// Write `array` to `path`.
pub fn save_npy(path: &Path, array: &NumericArray) -> Result<(), NpyError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    write_npy(&mut writer, array)?;
    writer.flush()?;
    Ok(())
}

/// Read an array from `path`.
pub fn load_npy(path: &Path) -> Result<NumericArray, NpyError> {
    let mut reader = BufReader::new(fs::File::open(path)?);
    read_npy(&mut reader)
}

fn array_width(kind: ElementKind) -> usize {
    match kind {
        ElementKind::Int(d) => d.element_size(),
        ElementKind::F32 => 4,
        ElementKind::F64 => 8,
    }
}

/// Value text following `'key':` in the header dict.
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let needle = format!("'{key}'");
    let start = header
        .find(&needle)
        .ok_or_else(|| NpyError::InvalidHeader(format!("missing {key}")))?;
    let after = &header[start + needle.len()..];
    let colon = after
        .find(':')
        .ok_or_else(|| NpyError::InvalidHeader(format!("bad {key} format")))?;
    Ok(after[colon + 1..].trim_start())
}

fn parse_descr(header: &str) -> Result<ElementKind, NpyError> {
    let value = header_value(header, "descr")?;
    let quote = value
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| NpyError::InvalidHeader("descr is not a string".into()))?;
    let rest = &value[1..];
    let end = rest
        .find(quote)
        .ok_or_else(|| NpyError::InvalidHeader("unterminated descr".into()))?;
    let descr = &rest[..end];
    ElementKind::from_numpy_descr(descr).ok_or_else(|| NpyError::UnsupportedDescr(descr.into()))
}

fn parse_fortran_order(header: &str) -> Result<bool, NpyError> {
    let value = header_value(header, "fortran_order")?;
    if value.starts_with("True") {
        Ok(true)
    } else if value.starts_with("False") {
        Ok(false)
    } else {
        Err(NpyError::InvalidHeader("fortran_order is not a bool".into()))
    }
}

fn parse_shape(header: &str) -> Result<Vec<usize>, NpyError> {
    let value = header_value(header, "shape")?;
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.find(')').map(|end| &v[..end]))
        .ok_or_else(|| NpyError::InvalidHeader("bad shape format".into()))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            // NumPy on some platforms writes `3L`
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|e| NpyError::InvalidHeader(format!("bad shape dim '{s}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(array: &NumericArray) -> Vec<u8> {
        let mut buf = Vec::new();
        write_npy(&mut buf, array).unwrap();
        buf
    }

    #[test]
    fn header_is_64_byte_aligned() {
        let arr = NumericArray::vector(ArrayData::F32(vec![0.5, 0.25]));
        let bytes = encode(&arr);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(bytes.len(), 10 + header_len + 8);
    }

    #[test]
    fn writes_numpy_compatible_header_text() {
        let arr = NumericArray::new(vec![1, 1, 1, 2], ArrayData::U8(vec![3, 4])).unwrap();
        let bytes = encode(&arr);
        let text = String::from_utf8_lossy(&bytes[10..]);
        assert!(text.starts_with(
            "{'descr': '|u1', 'fortran_order': False, 'shape': (1, 1, 1, 2), }"
        ));
    }

    #[test]
    fn scalar_shape_roundtrip() {
        let arr = NumericArray::new(vec![], ArrayData::I64(vec![-9])).unwrap();
        let back = read_npy(&mut Cursor::new(encode(&arr))).unwrap();
        assert_eq!(back, arr);
    }

    #[test]
    fn reads_v2_header_with_double_quoted_descr() {
        let header = "{'descr': \"<i4\", 'fortran_order': False, 'shape': (2,)}";
        let mut buf = Vec::new();
        buf.extend_from_slice(NUMPY_MAGIC);
        buf.extend_from_slice(&[2, 0]);
        buf.extend_from_slice(&(header.len() as u32).to_le_bytes());
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(&7i32.to_le_bytes());
        buf.extend_from_slice(&(-7i32).to_le_bytes());
        let arr = read_npy(&mut Cursor::new(buf)).unwrap();
        assert_eq!(arr.data(), &ArrayData::I32(vec![7, -7]));
    }

    #[test]
    fn rejects_fortran_order() {
        let mut bytes = encode(&NumericArray::vector(ArrayData::U8(vec![1])));
        let pos = bytes.windows(5).position(|w| w == b"False").unwrap();
        bytes.splice(pos..pos + 5, b"True ".iter().copied());
        let err = read_npy(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, NpyError::FortranOrder));
    }

    #[test]
    fn rejects_big_endian() {
        let mut bytes = encode(&NumericArray::vector(ArrayData::I32(vec![1])));
        let pos = bytes.windows(3).position(|w| w == b"<i4").unwrap();
        bytes[pos] = b'>';
        let err = read_npy(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, NpyError::UnsupportedDescr(d) if d == ">i4"));
    }

    #[test]
    fn rejects_truncated_data() {
        let mut bytes = encode(&NumericArray::vector(ArrayData::F64(vec![1.0, 2.0])));
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(read_npy(&mut Cursor::new(bytes)), Err(NpyError::Io(_))));
    }

    #[test]
    fn rejects_bad_magic() {
        let err = read_npy(&mut Cursor::new(b"PK\x03\x04zzzzzzzz".to_vec())).unwrap_err();
        assert!(matches!(err, NpyError::InvalidMagic(_)));
    }

    fn header_only(shape: &str) -> Vec<u8> {
        let header = format!("{{'descr': '|u1', 'fortran_order': False, 'shape': {shape}, }}\n");
        let mut buf = Vec::new();
        buf.extend_from_slice(NUMPY_MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
        buf.extend_from_slice(header.as_bytes());
        buf
    }

    #[test]
    fn rejects_overflowing_shape() {
        let bytes = header_only("(4294967296, 4294967296)");
        let err = read_npy(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, NpyError::InvalidHeader(m) if m.contains("overflows")));
    }

    #[test]
    fn huge_shape_without_data_is_truncated_not_allocated() {
        let mut bytes = header_only("(1099511627776,)");
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(read_npy(&mut Cursor::new(bytes)), Err(NpyError::Io(_))));
    }
}
