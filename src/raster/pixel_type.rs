//! Pixel sample types
//!
//! Maps the TIFF (BitsPerSample, SampleFormat) pair onto the eight sample
//! types the engine decodes, and converts samples to and from `f64`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::io::byte_order::ByteOrderHandler;
use crate::tiff::constants::sample_format;
use crate::tiff::errors::{TiffError, TiffResult};

/// Sample type of a raster band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    #[serde(rename = "Byte")]
    U8,
    #[serde(rename = "Int8")]
    I8,
    #[serde(rename = "UInt16")]
    U16,
    #[serde(rename = "Int16")]
    I16,
    #[serde(rename = "UInt32")]
    U32,
    #[serde(rename = "Int32")]
    I32,
    #[serde(rename = "Float32")]
    F32,
    #[serde(rename = "Float64")]
    F64,
}

impl PixelType {
    /// Resolve the sample type from BitsPerSample and SampleFormat
    ///
    /// A missing SampleFormat means unsigned integer. Complex, void and
    /// odd bit depths are rejected.
    pub fn from_tiff(bits: u16, format: u16) -> TiffResult<Self> {
        let unsupported = |reason: &str| TiffError::UnsupportedSampleLayout {
            bits,
            sample_format: format,
            reason: reason.to_string(),
        };

        match (format, bits) {
            (sample_format::UNSIGNED, 8) => Ok(PixelType::U8),
            (sample_format::UNSIGNED, 16) => Ok(PixelType::U16),
            (sample_format::UNSIGNED, 32) => Ok(PixelType::U32),
            (sample_format::SIGNED, 8) => Ok(PixelType::I8),
            (sample_format::SIGNED, 16) => Ok(PixelType::I16),
            (sample_format::SIGNED, 32) => Ok(PixelType::I32),
            (sample_format::IEEEFP, 32) => Ok(PixelType::F32),
            (sample_format::IEEEFP, 64) => Ok(PixelType::F64),
            (sample_format::UNSIGNED, _) | (sample_format::SIGNED, _) if bits == 64 =>
                Err(unsupported("64-bit integer samples")),
            (sample_format::UNSIGNED, _) | (sample_format::SIGNED, _) | (sample_format::IEEEFP, _) =>
                Err(unsupported("bit depth is not byte aligned or not supported for this format")),
            (sample_format::COMPLEX_INT, _) | (sample_format::COMPLEX_IEEEFP, _) =>
                Err(unsupported("complex samples")),
            _ => Err(unsupported("unknown sample format")),
        }
    }

    /// GDAL-style type name
    pub fn name(&self) -> &'static str {
        match self {
            PixelType::U8 => "Byte",
            PixelType::I8 => "Int8",
            PixelType::U16 => "UInt16",
            PixelType::I16 => "Int16",
            PixelType::U32 => "UInt32",
            PixelType::I32 => "Int32",
            PixelType::F32 => "Float32",
            PixelType::F64 => "Float64",
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            PixelType::U8 | PixelType::I8 => 1,
            PixelType::U16 | PixelType::I16 => 2,
            PixelType::U32 | PixelType::I32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    pub fn bits(&self) -> u16 {
        self.bytes() as u16 * 8
    }

    /// TIFF SampleFormat code
    pub fn sample_format(&self) -> u16 {
        if self.is_float() {
            sample_format::IEEEFP
        } else if self.is_signed() {
            sample_format::SIGNED
        } else {
            sample_format::UNSIGNED
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PixelType::F32 | PixelType::F64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, PixelType::I8 | PixelType::I16 | PixelType::I32)
    }

    /// Smallest representable value
    pub fn min_value(&self) -> f64 {
        match self {
            PixelType::U8 | PixelType::U16 | PixelType::U32 => 0.0,
            PixelType::I8 => i8::MIN as f64,
            PixelType::I16 => i16::MIN as f64,
            PixelType::I32 => i32::MIN as f64,
            PixelType::F32 => f32::MIN as f64,
            PixelType::F64 => f64::MIN,
        }
    }

    /// Largest representable value
    pub fn max_value(&self) -> f64 {
        match self {
            PixelType::U8 => u8::MAX as f64,
            PixelType::U16 => u16::MAX as f64,
            PixelType::U32 => u32::MAX as f64,
            PixelType::I8 => i8::MAX as f64,
            PixelType::I16 => i16::MAX as f64,
            PixelType::I32 => i32::MAX as f64,
            PixelType::F32 => f32::MAX as f64,
            PixelType::F64 => f64::MAX,
        }
    }

    /// Whether `value` can be stored exactly in this type
    pub fn can_represent(&self, value: f64) -> bool {
        if value.is_nan() || value.is_infinite() {
            return self.is_float();
        }
        if value < self.min_value() || value > self.max_value() {
            return false;
        }
        self.is_float() || value.fract() == 0.0
    }

    /// The "no valid data" sentinel of the type
    ///
    /// NaN for floats, the minimum for signed and the maximum for unsigned
    /// integers.
    pub fn sentinel(&self) -> f64 {
        if self.is_float() {
            f64::NAN
        } else if self.is_signed() {
            self.min_value()
        } else {
            self.max_value()
        }
    }

    /// Decode one sample stored in the file's byte order
    pub fn decode(&self, bytes: &[u8], handler: &dyn ByteOrderHandler) -> f64 {
        match self {
            PixelType::U8 => bytes[0] as f64,
            PixelType::I8 => bytes[0] as i8 as f64,
            PixelType::U16 => handler.u16_from(bytes) as f64,
            PixelType::I16 => handler.u16_from(bytes) as i16 as f64,
            PixelType::U32 => handler.u32_from(bytes) as f64,
            PixelType::I32 => handler.u32_from(bytes) as i32 as f64,
            PixelType::F32 => f32::from_bits(handler.u32_from(bytes)) as f64,
            PixelType::F64 => f64::from_bits(handler.u64_from(bytes)),
        }
    }

    /// Encode one sample in little-endian order, rounding and saturating
    /// integers to the type's range
    pub fn encode_le(&self, value: f64, out: &mut Vec<u8>) {
        let int = |v: f64, min: f64, max: f64| -> f64 {
            if v.is_nan() { 0.0 } else { v.round().clamp(min, max) }
        };
        match self {
            PixelType::U8 => out.push(int(value, 0.0, 255.0) as u8),
            PixelType::I8 => out.push(int(value, -128.0, 127.0) as i8 as u8),
            PixelType::U16 => out.extend_from_slice(&(int(value, 0.0, 65535.0) as u16).to_le_bytes()),
            PixelType::I16 => out.extend_from_slice(&(int(value, -32768.0, 32767.0) as i16).to_le_bytes()),
            PixelType::U32 => out.extend_from_slice(&(int(value, 0.0, u32::MAX as f64) as u32).to_le_bytes()),
            PixelType::I32 => out.extend_from_slice(
                &(int(value, i32::MIN as f64, i32::MAX as f64) as i32).to_le_bytes()),
            PixelType::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            PixelType::F64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::byte_order::{BigEndianHandler, LittleEndianHandler};

    #[test]
    fn test_layout_mapping() {
        assert_eq!(PixelType::from_tiff(16, sample_format::SIGNED).unwrap(), PixelType::I16);
        assert_eq!(PixelType::from_tiff(64, sample_format::IEEEFP).unwrap(), PixelType::F64);
        assert!(PixelType::from_tiff(12, sample_format::UNSIGNED).is_err());
        assert!(PixelType::from_tiff(64, sample_format::UNSIGNED).is_err());
        assert!(PixelType::from_tiff(32, sample_format::COMPLEX_INT).is_err());
    }

    #[test]
    fn test_decode_respects_byte_order() {
        assert_eq!(PixelType::I16.decode(&[0xFF, 0xFE], &BigEndianHandler), -2.0);
        assert_eq!(PixelType::U16.decode(&[0x01, 0x02], &LittleEndianHandler), 513.0);
        let bytes = 1.5f32.to_be_bytes();
        assert_eq!(PixelType::F32.decode(&bytes, &BigEndianHandler), 1.5);
    }

    #[test]
    fn test_encode_saturates_integers() {
        let mut out = Vec::new();
        PixelType::U8.encode_le(300.4, &mut out);
        PixelType::I16.encode_le(-12.6, &mut out);
        assert_eq!(out, vec![255, 0xF3, 0xFF]);
    }

    #[test]
    fn test_representability_and_sentinel() {
        assert!(!PixelType::U8.can_represent(-9999.0));
        assert!(PixelType::I16.can_represent(-9999.0));
        assert!(!PixelType::U16.can_represent(f64::NAN));
        assert!(PixelType::F32.sentinel().is_nan());
        assert_eq!(PixelType::U16.sentinel(), 65535.0);
        assert_eq!(PixelType::I8.sentinel(), -128.0);
    }
}
