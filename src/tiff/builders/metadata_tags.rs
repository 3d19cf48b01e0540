//! Metadata tag strategies
//!
//! This module handles GDAL-specific extension tags: GDAL_NODATA, an ASCII
//! tag holding the no-data value, and GDAL_METADATA, an XML document with
//! dataset and per-band items such as band descriptions.

use crate::tiff::ifd::IFD;
use crate::tiff::constants::tags;
use crate::tiff::errors::TiffResult;
use crate::utils::tiff_utils::{self, ExternalData};
use crate::utils::xml_utils::{self, GdalMetadataItem};
use log::{debug, info};

/// Handles metadata tags in TIFF files
pub struct MetadataBuilder;

impl MetadataBuilder {
    /// Add a GDAL NoData tag to an IFD
    ///
    /// GDAL stores a single value for all bands as NUL-terminated text.
    pub fn add_nodata_tag(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        nodata_value: f64,
        is_big_tiff: bool,
    ) {
        let text = format_nodata(nodata_value);
        info!("Adding GDAL NoData tag: {}", text);
        tiff_utils::add_ascii(ifd, external_data, ifd_index, tags::GDAL_NODATA, &text, is_big_tiff);
    }

    /// Add a GDAL metadata tag built from the given items
    pub fn add_gdal_metadata_tag(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        items: &[GdalMetadataItem],
        is_big_tiff: bool,
    ) -> TiffResult<()> {
        if items.is_empty() {
            debug!("No GDAL metadata items, skipping tag");
            return Ok(());
        }

        let xml = xml_utils::write_gdal_metadata(items)?;
        info!("Adding GDAL metadata tag with {} item(s)", items.len());
        tiff_utils::add_ascii(ifd, external_data, ifd_index, tags::GDAL_METADATA, &xml, is_big_tiff);
        Ok(())
    }

    /// Add a free-text ASCII tag such as Software or ImageDescription
    pub fn add_text_tag(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        tag: u16,
        text: &str,
        is_big_tiff: bool,
    ) {
        debug!("Adding text tag {}: {}", tag, text);
        tiff_utils::add_ascii(ifd, external_data, ifd_index, tag, text, is_big_tiff);
    }
}

/// Format a nodata value the way GDAL writes it
///
/// Integral values are written without a fractional part; NaN as `nan`.
pub fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Parse a GDAL_NODATA string
pub fn parse_nodata(text: &str) -> Option<f64> {
    let trimmed = text.trim().trim_end_matches('\0');
    match trimmed.to_ascii_lowercase().as_str() {
        "" => None,
        "nan" | "-nan" => Some(f64::NAN),
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodata_formatting() {
        assert_eq!(format_nodata(-9999.0), "-9999");
        assert_eq!(format_nodata(0.5), "0.5");
        assert_eq!(format_nodata(f64::NAN), "nan");
    }

    #[test]
    fn test_nodata_parsing() {
        assert_eq!(parse_nodata("-9999\0"), Some(-9999.0));
        assert!(parse_nodata("NaN").map(|v| v.is_nan()).unwrap_or(false));
        assert_eq!(parse_nodata("  "), None);
        assert_eq!(parse_nodata("abc"), None);
    }

    #[test]
    fn test_nodata_tag_is_ascii() {
        let mut ifd = IFD::new(0, 0);
        let mut external = ExternalData::new();
        MetadataBuilder::add_nodata_tag(&mut ifd, &mut external, 0, -9999.0, false);

        let entry = ifd.get_entry(tags::GDAL_NODATA).unwrap();
        assert_eq!(entry.count, 6);
        assert_eq!(external[&(0, tags::GDAL_NODATA)], b"-9999\0".to_vec());
    }
}
