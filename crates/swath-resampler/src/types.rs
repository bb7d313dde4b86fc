//! Storage types and the numeric variant used for source and output data.
//!
//! Source scans arrive in one of eight fixed-width numeric kinds. Rather
//! than keeping one array per kind, values travel as a [`TypedBuffer`]
//! and are read and written through a single `f64` contract.

use std::fmt;
use std::str::FromStr;

use bytemuck::Pod;
use num_traits::{Bounded, NumCast, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, Result};

/// Numeric storage kind of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl StorageType {
    /// All storage types, narrowest integers first.
    pub const ALL: [StorageType; 8] = [
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Float32,
        Self::Float64,
    ];

    /// Size of one value in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Representable range as `(low, high)`.
    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::Int8 => (i8::MIN as f64, i8::MAX as f64),
            Self::UInt8 => (0.0, u8::MAX as f64),
            Self::Int16 => (i16::MIN as f64, i16::MAX as f64),
            Self::UInt16 => (0.0, u16::MAX as f64),
            Self::Int32 => (i32::MIN as f64, i32::MAX as f64),
            Self::UInt32 => (0.0, u32::MAX as f64),
            Self::Float32 => (f32::MIN as f64, f32::MAX as f64),
            Self::Float64 => (f64::MIN, f64::MAX),
        }
    }

    /// Whether values are floating point.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Clamp to range and, for integer kinds, round half away from zero.
    pub fn saturate(&self, value: f64) -> f64 {
        let (low, high) = self.range();
        let value = if self.is_float() { value } else { value.round() };
        value.clamp(low, high)
    }
}

impl FromStr for StorageType {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "int8" | "i8" => Ok(Self::Int8),
            "uint8" | "u8" | "byte" => Ok(Self::UInt8),
            "int16" | "i16" => Ok(Self::Int16),
            "uint16" | "u16" => Ok(Self::UInt16),
            "int32" | "i32" => Ok(Self::Int32),
            "uint32" | "u32" => Ok(Self::UInt32),
            "float32" | "f32" | "float" => Ok(Self::Float32),
            "float64" | "f64" | "double" => Ok(Self::Float64),
            other => Err(ResampleError::InvalidStorageType(other.to_string())),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A primitive that can back a [`TypedBuffer`].
pub trait Sample: Pod + NumCast + Bounded + Zero {
    const STORAGE: StorageType;
}

impl Sample for i8 {
    const STORAGE: StorageType = StorageType::Int8;
}
impl Sample for u8 {
    const STORAGE: StorageType = StorageType::UInt8;
}
impl Sample for i16 {
    const STORAGE: StorageType = StorageType::Int16;
}
impl Sample for u16 {
    const STORAGE: StorageType = StorageType::UInt16;
}
impl Sample for i32 {
    const STORAGE: StorageType = StorageType::Int32;
}
impl Sample for u32 {
    const STORAGE: StorageType = StorageType::UInt32;
}
impl Sample for f32 {
    const STORAGE: StorageType = StorageType::Float32;
}
impl Sample for f64 {
    const STORAGE: StorageType = StorageType::Float64;
}

fn from_f64<T: Sample>(value: f64) -> T {
    let value = T::STORAGE.saturate(value);
    <T as NumCast>::from(value).unwrap_or_else(T::zero)
}

fn collect_from_f64<T: Sample>(values: &[f64]) -> Vec<T> {
    values.iter().map(|&v| from_f64::<T>(v)).collect()
}

/// Tagged union over the eight storage kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! with_values {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            TypedBuffer::Int8($v) => $body,
            TypedBuffer::UInt8($v) => $body,
            TypedBuffer::Int16($v) => $body,
            TypedBuffer::UInt16($v) => $body,
            TypedBuffer::Int32($v) => $body,
            TypedBuffer::UInt32($v) => $body,
            TypedBuffer::Float32($v) => $body,
            TypedBuffer::Float64($v) => $body,
        }
    };
}

impl TypedBuffer {
    /// Build a buffer of `storage` values from `f64`s, saturating each.
    pub fn from_f64(storage: StorageType, values: &[f64]) -> Self {
        match storage {
            StorageType::Int8 => Self::Int8(collect_from_f64(values)),
            StorageType::UInt8 => Self::UInt8(collect_from_f64(values)),
            StorageType::Int16 => Self::Int16(collect_from_f64(values)),
            StorageType::UInt16 => Self::UInt16(collect_from_f64(values)),
            StorageType::Int32 => Self::Int32(collect_from_f64(values)),
            StorageType::UInt32 => Self::UInt32(collect_from_f64(values)),
            StorageType::Float32 => Self::Float32(collect_from_f64(values)),
            StorageType::Float64 => Self::Float64(values.to_vec()),
        }
    }

    /// Reinterpret native-endian bytes as `storage` values.
    pub fn from_bytes(storage: StorageType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % storage.size_bytes() != 0 {
            return Err(ResampleError::shape(
                "TypedBuffer::from_bytes",
                format!("{} bytes is not a multiple of {} size", bytes.len(), storage),
            ));
        }
        Ok(match storage {
            StorageType::Int8 => Self::Int8(bytemuck::pod_collect_to_vec(bytes)),
            StorageType::UInt8 => Self::UInt8(bytes.to_vec()),
            StorageType::Int16 => Self::Int16(bytemuck::pod_collect_to_vec(bytes)),
            StorageType::UInt16 => Self::UInt16(bytemuck::pod_collect_to_vec(bytes)),
            StorageType::Int32 => Self::Int32(bytemuck::pod_collect_to_vec(bytes)),
            StorageType::UInt32 => Self::UInt32(bytemuck::pod_collect_to_vec(bytes)),
            StorageType::Float32 => Self::Float32(bytemuck::pod_collect_to_vec(bytes)),
            StorageType::Float64 => Self::Float64(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    /// Storage kind of this buffer.
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::Int8(_) => StorageType::Int8,
            Self::UInt8(_) => StorageType::UInt8,
            Self::Int16(_) => StorageType::Int16,
            Self::UInt16(_) => StorageType::UInt16,
            Self::Int32(_) => StorageType::Int32,
            Self::UInt32(_) => StorageType::UInt32,
            Self::Float32(_) => StorageType::Float32,
            Self::Float64(_) => StorageType::Float64,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    /// Whether the buffer holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index` as `f64`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<f64> {
        with_values!(self, v => v.get(index).and_then(|x| x.to_f64()))
    }

    /// All values as `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_values!(self, v => v.iter().map(|x| x.to_f64().unwrap_or(f64::NAN)).collect())
    }

    /// Native-endian byte view.
    pub fn as_bytes(&self) -> &[u8] {
        with_values!(self, v => bytemuck::cast_slice(v.as_slice()))
    }
}

/// Linear conversion from the accumulation (source) type to the output type.
///
/// Identity when the two types match or either is floating point;
/// otherwise `out = out_low + slope * in` with
/// `slope = out_range / in_range`. The source side is anchored at zero,
/// so signed sources map their negative half below `out_low` and clamp. Results are rounded to nearest for
/// integer outputs and clamped to the output range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMap {
    source: StorageType,
    output: StorageType,
    slope: f64,
    output_low: f64,
    identity: bool,
}

impl RangeMap {
    pub fn new(source: StorageType, output: StorageType) -> Self {
        let (source_low, source_high) = source.range();
        let (output_low, output_high) = output.range();
        let identity = source == output || source.is_float() || output.is_float();
        let slope = if identity {
            1.0
        } else {
            (output_high - output_low) / (source_high - source_low)
        };
        Self {
            source,
            output,
            slope,
            output_low,
            identity,
        }
    }

    pub fn source(&self) -> StorageType {
        self.source
    }

    pub fn output(&self) -> StorageType {
        self.output
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Convert one accumulated value into output units.
    pub fn convert(&self, value: f64) -> f64 {
        let mapped = if self.identity {
            value
        } else {
            self.output_low + self.slope * value
        };
        self.output.saturate(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!("int16".parse::<StorageType>().unwrap(), StorageType::Int16);
        assert_eq!("BYTE".parse::<StorageType>().unwrap(), StorageType::UInt8);
        assert_eq!("f64".parse::<StorageType>().unwrap(), StorageType::Float64);
        assert!("complex64".parse::<StorageType>().is_err());
    }

    #[test]
    fn test_saturate_rounds_and_clamps() {
        assert_eq!(StorageType::UInt8.saturate(254.6), 255.0);
        assert_eq!(StorageType::UInt8.saturate(300.0), 255.0);
        assert_eq!(StorageType::UInt8.saturate(-3.0), 0.0);
        assert_eq!(StorageType::Int16.saturate(-2.5), -3.0);
        assert_eq!(StorageType::Float32.saturate(1.25), 1.25);
    }

    #[test]
    fn test_typed_buffer_bytes() {
        let buf = TypedBuffer::from_f64(StorageType::Int16, &[1.0, -2.0, 40000.0]);
        assert_eq!(buf, TypedBuffer::Int16(vec![1, -2, i16::MAX]));
        assert_eq!(buf.as_bytes().len(), 6);

        let back = TypedBuffer::from_bytes(StorageType::Int16, buf.as_bytes()).unwrap();
        assert_eq!(back, buf);
        assert_eq!(back.get(1), Some(-2.0));
        assert_eq!(back.get(3), None);
    }

    #[test]
    fn test_from_bytes_rejects_partial_values() {
        assert!(TypedBuffer::from_bytes(StorageType::Float32, &[0u8; 6]).is_err());
    }

    #[test]
    fn test_range_map_identity() {
        let map = RangeMap::new(StorageType::Int16, StorageType::Int16);
        assert!(map.is_identity());
        assert_eq!(map.convert(123.4), 123.0);

        let map = RangeMap::new(StorageType::Float32, StorageType::UInt8);
        assert!(map.is_identity());
        assert_eq!(map.convert(12.6), 13.0);
        assert_eq!(map.convert(1.0e6), 255.0);
    }

    #[test]
    fn test_range_map_integer_remap() {
        let map = RangeMap::new(StorageType::UInt8, StorageType::UInt16);
        assert!(!map.is_identity());
        assert_eq!(map.convert(0.0), 0.0);
        assert_eq!(map.convert(255.0), 65535.0);
        assert_eq!(map.convert(1.0), 257.0);

        let map = RangeMap::new(StorageType::Int16, StorageType::UInt8);
        assert_eq!(map.convert(0.0), 0.0);
        // 1000 * 255 / 65535 = 3.89
        assert_eq!(map.convert(1000.0), 4.0);
        assert_eq!(map.convert(-32768.0), 0.0);
        assert_eq!(map.convert(32767.0), 127.0);

        let map = RangeMap::new(StorageType::UInt8, StorageType::Int8);
        assert_eq!(map.convert(0.0), -128.0);
        assert_eq!(map.convert(255.0), 127.0);
    }

    #[test]
    fn test_range_map_output_always_representable() {
        for &src in StorageType::ALL.iter() {
            for &dst in StorageType::ALL.iter() {
                let map = RangeMap::new(src, dst);
                let (low, high) = dst.range();
                for value in [-1.0e12, -1.0, 0.0, 0.49, 1.0e12] {
                    let out = map.convert(value);
                    assert!(out >= low && out <= high, "{} -> {}: {} out of range", src, dst, out);
                }
            }
        }
    }
}
