//! TIFF tag utilities
//!
//! Utilities for decoding TIFF tag payloads and naming tags, field types
//! and code values.

use crate::io::byte_order::ByteOrderHandler;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{field_type_size, IFDEntry};
use crate::tiff::constants::{field_types, tags, compression, photometric};

/// Decodes the first value stored inline in an entry's value field
///
/// # Arguments
/// * `entry` - The IFD entry whose payload fits in the value field
/// * `handler` - The byte order handler of the file
///
/// # Returns
/// The first value widened to u64 (0 for an empty payload)
pub fn first_inline_value(entry: &IFDEntry, handler: &dyn ByteOrderHandler) -> u64 {
    if entry.count == 0 {
        return 0;
    }

    let bytes = &entry.value_bytes;
    match entry.field_type {
        field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED | field_types::ASCII => bytes[0] as u64,
        field_types::SHORT | field_types::SSHORT => handler.u16_from(bytes) as u64,
        field_types::LONG | field_types::SLONG | field_types::FLOAT => handler.u32_from(bytes) as u64,
        _ => handler.u64_from(bytes),
    }
}

/// Decodes an integer tag payload into u64 values
///
/// # Arguments
/// * `bytes` - Raw payload in file byte order
/// * `field_type` - TIFF field type of the payload
/// * `handler` - The byte order handler
///
/// # Returns
/// The decoded values, or an error for non-integer field types
pub fn decode_u64_values(bytes: &[u8], field_type: u16, handler: &dyn ByteOrderHandler) -> TiffResult<Vec<u64>> {
    let size = field_type_size(field_type);
    let values = bytes.chunks_exact(size).map(|chunk| match field_type {
        field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED => Ok(chunk[0] as u64),
        field_types::SHORT | field_types::SSHORT => Ok(handler.u16_from(chunk) as u64),
        field_types::LONG | field_types::SLONG => Ok(handler.u32_from(chunk) as u64),
        field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => Ok(handler.u64_from(chunk)),
        other => Err(TiffError::UnsupportedFieldType(other)),
    });

    values.collect()
}

/// Decodes a numeric tag payload into f64 values
///
/// Signed types keep their sign; rationals are divided out.
pub fn decode_f64_values(bytes: &[u8], field_type: u16, handler: &dyn ByteOrderHandler) -> TiffResult<Vec<f64>> {
    let size = field_type_size(field_type);
    let values = bytes.chunks_exact(size).map(|chunk| match field_type {
        field_types::BYTE | field_types::UNDEFINED => Ok(chunk[0] as f64),
        field_types::SBYTE => Ok(chunk[0] as i8 as f64),
        field_types::SHORT => Ok(handler.u16_from(chunk) as f64),
        field_types::SSHORT => Ok(handler.u16_from(chunk) as i16 as f64),
        field_types::LONG => Ok(handler.u32_from(chunk) as f64),
        field_types::SLONG => Ok(handler.u32_from(chunk) as i32 as f64),
        field_types::LONG8 | field_types::IFD8 => Ok(handler.u64_from(chunk) as f64),
        field_types::SLONG8 => Ok(handler.u64_from(chunk) as i64 as f64),
        field_types::FLOAT => Ok(f32::from_bits(handler.u32_from(chunk)) as f64),
        field_types::DOUBLE => Ok(f64::from_bits(handler.u64_from(chunk))),
        field_types::RATIONAL => {
            let (num, den) = (handler.u32_from(chunk), handler.u32_from(&chunk[4..]));
            Ok(if den == 0 { 0.0 } else { num as f64 / den as f64 })
        }
        field_types::SRATIONAL => {
            let (num, den) = (handler.u32_from(chunk) as i32, handler.u32_from(&chunk[4..]) as i32);
            Ok(if den == 0 { 0.0 } else { num as f64 / den as f64 })
        }
        other => Err(TiffError::UnsupportedFieldType(other)),
    });

    values.collect()
}

/// Get the name of a TIFF tag
///
/// Returns a human-readable name for a tag based on its numeric ID.
/// If the tag is not recognized, returns "Unknown".
///
/// # Arguments
/// * `tag` - The tag ID to look up
///
/// # Returns
/// A string representing the tag name
pub fn get_tag_name(tag: u16) -> &'static str {
    match tag {
        // Basic image structure tags
        tags::NEW_SUBFILE_TYPE => "NewSubfileType",
        tags::IMAGE_WIDTH => "ImageWidth",
        tags::IMAGE_LENGTH => "ImageLength",
        tags::BITS_PER_SAMPLE => "BitsPerSample",
        tags::COMPRESSION => "Compression",
        tags::PHOTOMETRIC_INTERPRETATION => "PhotometricInterpretation",
        tags::SAMPLES_PER_PIXEL => "SamplesPerPixel",
        tags::ROWS_PER_STRIP => "RowsPerStrip",
        tags::STRIP_OFFSETS => "StripOffsets",
        tags::STRIP_BYTE_COUNTS => "StripByteCounts",
        tags::MIN_SAMPLE_VALUE => "MinSampleValue",
        tags::MAX_SAMPLE_VALUE => "MaxSampleValue",
        tags::PLANAR_CONFIGURATION => "PlanarConfiguration",
        tags::COLOR_MAP => "ColorMap",
        tags::EXTRA_SAMPLES => "ExtraSamples",
        tags::SAMPLE_FORMAT => "SampleFormat",
        tags::PREDICTOR => "Predictor",

        // Descriptive tags
        tags::DOCUMENT_NAME => "DocumentName",
        tags::IMAGE_DESCRIPTION => "ImageDescription",
        tags::MAKE => "Make",
        tags::MODEL => "Model",
        tags::RESOLUTION_UNIT => "ResolutionUnit",
        tags::X_RESOLUTION => "XResolution",
        tags::Y_RESOLUTION => "YResolution",
        tags::SOFTWARE => "Software",
        tags::DATE_TIME => "DateTime",
        tags::ARTIST => "Artist",
        tags::HOST_COMPUTER => "HostComputer",
        tags::COPYRIGHT => "Copyright",

        // Tiling tags
        tags::TILE_OFFSETS => "TileOffsets",
        tags::TILE_BYTE_COUNTS => "TileByteCounts",
        tags::TILE_WIDTH => "TileWidth",
        tags::TILE_LENGTH => "TileLength",

        // GeoTIFF tags
        tags::MODEL_PIXEL_SCALE_TAG => "ModelPixelScale",
        tags::MODEL_TIEPOINT_TAG => "ModelTiepoint",
        tags::GEO_KEY_DIRECTORY_TAG => "GeoKeyDirectory",
        tags::GEO_DOUBLE_PARAMS_TAG => "GeoDoubleParams",
        tags::GEO_ASCII_PARAMS_TAG => "GeoAsciiParams",
        tags::MODEL_TRANSFORMATION_TAG => "ModelTransformation",

        // GDAL specific tags
        tags::GDAL_METADATA => "GDALMetadata",
        tags::GDAL_NODATA => "GDALNoData",

        _ => "Unknown",
    }
}

/// Get the name of a TIFF field type
pub fn get_field_type_name(field_type: u16) -> &'static str {
    match field_type {
        field_types::BYTE => "BYTE",
        field_types::ASCII => "ASCII",
        field_types::SHORT => "SHORT",
        field_types::LONG => "LONG",
        field_types::RATIONAL => "RATIONAL",
        field_types::SBYTE => "SBYTE",
        field_types::UNDEFINED => "UNDEFINED",
        field_types::SSHORT => "SSHORT",
        field_types::SLONG => "SLONG",
        field_types::SRATIONAL => "SRATIONAL",
        field_types::FLOAT => "FLOAT",
        field_types::DOUBLE => "DOUBLE",
        field_types::LONG8 => "LONG8",
        field_types::SLONG8 => "SLONG8",
        field_types::IFD8 => "IFD8",
        _ => "Unknown",
    }
}

/// Get the name of a compression method
pub fn get_compression_name(compression_code: u64) -> &'static str {
    match compression_code as u16 {
        compression::NONE => "None",
        compression::CCITT_RLE => "CCITT RLE",
        compression::CCITT_FAX3 => "CCITT Group 3 Fax",
        compression::CCITT_FAX4 => "CCITT Group 4 Fax",
        compression::LZW => "LZW",
        compression::JPEG_OLD => "Old JPEG",
        compression::JPEG => "JPEG",
        compression::DEFLATE | compression::DEFLATE_OLD => "Deflate",
        compression::ZSTD => "ZSTD",
        compression::PACKBITS => "PackBits",
        _ => "Unknown",
    }
}

/// Get the name of a photometric interpretation method
pub fn get_photometric_name(photometric_code: u64) -> &'static str {
    match photometric_code as u16 {
        photometric::WHITE_IS_ZERO => "WhiteIsZero",
        photometric::BLACK_IS_ZERO => "BlackIsZero",
        photometric::RGB => "RGB",
        photometric::PALETTE => "Palette",
        photometric::TRANSPARENCY_MASK => "TransparencyMask",
        photometric::CMYK => "CMYK",
        photometric::YCBCR => "YCbCr",
        photometric::CIELAB => "CIELAB",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::byte_order::{BigEndianHandler, LittleEndianHandler};

    #[test]
    fn test_inline_short_respects_big_endian() {
        let entry = IFDEntry::new(tags::COMPRESSION, field_types::SHORT, 1, 0, [0x00, 0x08, 0, 0, 0, 0, 0, 0]);
        assert_eq!(first_inline_value(&entry, &BigEndianHandler), 8);
        assert_eq!(first_inline_value(&entry, &LittleEndianHandler), 0x0800);
    }

    #[test]
    fn test_decode_shorts_and_doubles() {
        let shorts = [1u8, 0, 2, 0, 3, 0];
        let values = decode_u64_values(&shorts, field_types::SHORT, &LittleEndianHandler).unwrap();
        assert_eq!(values, vec![1, 2, 3]);

        let doubles = 30.5f64.to_le_bytes();
        let values = decode_f64_values(&doubles, field_types::DOUBLE, &LittleEndianHandler).unwrap();
        assert_eq!(values, vec![30.5]);
    }

    #[test]
    fn test_decode_rejects_float_as_integer() {
        let bytes = 1.0f32.to_le_bytes();
        assert!(decode_u64_values(&bytes, field_types::FLOAT, &LittleEndianHandler).is_err());
    }
}
