//! Structural extraction
//!
//! File system facts and the container structure of the raster: TIFF
//! variant, byte order, block layout, compression and the descriptive
//! TIFF tags.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::io::byte_order::ByteOrder;
use crate::raster::dataset::{DRIVER_LONG_NAME, DRIVER_NAME};
use crate::raster::RasterHandle;
use crate::tiff::constants::tags;
use crate::utils::tag_utils::get_photometric_name;
use crate::utils::tiff_code_translators::{planar_config_code_to_name, predictor_code_to_name,
                                          sample_format_code_to_name};

/// The raster file on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub file_size_mb: f64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub driver_short_name: String,
    pub driver_long_name: String,
}

/// Container structure of the main image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralInfo {
    /// `TIFF` or `BigTIFF`
    pub tiff_variant: String,
    pub byte_order: String,
    /// `strip` or `tile`
    pub block_layout: String,
    pub block_width: usize,
    pub block_height: usize,
    pub blocks_across: usize,
    pub blocks_down: usize,
    pub block_count: usize,
    pub compression: String,
    pub compression_code: u64,
    pub predictor: String,
    pub interleave: String,
    pub planar_configuration: String,
    pub photometric: Option<String>,
    pub sample_format: String,
    pub bits_per_sample: u16,
    pub ifd_count: usize,
    pub overview_count: usize,
    pub mask_count: usize,
    /// TIFF DateTime tag as written
    pub date_time: Option<String>,
    /// TIFF DateTime parsed as `YYYY:MM:DD HH:MM:SS`
    pub date_time_parsed: Option<NaiveDateTime>,
    pub software: Option<String>,
    pub image_description: Option<String>,
}

/// Size facts of the whole raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    /// Pixels over all bands
    pub total_pixels: u64,
    /// Size of the decoded pixels of all bands
    pub uncompressed_size_bytes: u64,
    pub uncompressed_size_gb: f64,
    /// Width over height
    pub aspect_ratio: f64,
}

impl FileSummary {
    pub fn new(width: usize, height: usize, bands: usize, bytes_per_sample: usize) -> Self {
        let total_pixels = width as u64 * height as u64 * bands as u64;
        let uncompressed_size_bytes = total_pixels * bytes_per_sample as u64;
        FileSummary {
            total_pixels,
            uncompressed_size_bytes,
            uncompressed_size_gb: uncompressed_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
            aspect_ratio: if height == 0 { 0.0 } else { width as f64 / height as f64 },
        }
    }
}

/// Structural part of the extraction result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralReport {
    pub file: FileInfo,
    pub structure: StructuralInfo,
    pub summary: FileSummary,
}

pub struct StructuralExtractor;

impl StructuralExtractor {
    pub fn extract(handle: &mut RasterHandle) -> StructuralReport {
        let path = handle.path().to_path_buf();
        let size = handle.dataset().file_size_bytes;
        let times = handle.file_times().clone();

        let file = FileInfo {
            file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            file_path: path.display().to_string(),
            file_size_bytes: size,
            file_size_mb: size as f64 / (1024.0 * 1024.0),
            created: times.created,
            modified: times.modified,
            accessed: times.accessed,
            driver_short_name: DRIVER_NAME.to_string(),
            driver_long_name: DRIVER_LONG_NAME.to_string(),
        };

        let date_time = handle.ascii_tag(tags::DATE_TIME);
        let software = handle.ascii_tag(tags::SOFTWARE);
        let image_description = handle.ascii_tag(tags::IMAGE_DESCRIPTION);

        let tiff = handle.tiff();
        let layout = handle.layout();
        let structure = StructuralInfo {
            tiff_variant: tiff.variant_name().to_string(),
            byte_order: match tiff.byte_order {
                ByteOrder::LittleEndian => "little_endian",
                ByteOrder::BigEndian => "big_endian",
            }.to_string(),
            block_layout: if layout.tiled { "tile" } else { "strip" }.to_string(),
            block_width: layout.block_width,
            block_height: layout.block_height,
            blocks_across: layout.blocks_across,
            blocks_down: layout.blocks_down,
            block_count: layout.block_count(),
            compression: handle.compression_name().to_string(),
            compression_code: layout.compression,
            predictor: predictor_code_to_name(layout.predictor as u64).to_string(),
            interleave: layout.interleave().to_string(),
            planar_configuration: planar_config_code_to_name(if layout.planar { 2 } else { 1 }).to_string(),
            photometric: layout.photometric.map(|p| get_photometric_name(p as u64).to_string()),
            sample_format: sample_format_code_to_name(layout.pixel_type.sample_format() as u64).to_string(),
            bits_per_sample: layout.pixel_type.bits(),
            ifd_count: tiff.ifd_count(),
            overview_count: tiff.overviews().len(),
            mask_count: tiff.mask_count(),
            date_time_parsed: date_time.as_deref().and_then(parse_tiff_datetime),
            date_time,
            software,
            image_description,
        };

        debug!("Structure of {}: {} {} {} blocks, {}", file.file_name, structure.tiff_variant,
               structure.block_count, structure.block_layout, structure.compression);
        let summary = FileSummary::new(layout.width, layout.height, layout.bands, layout.pixel_type.bytes());
        StructuralReport { file, structure, summary }
    }
}

/// Parse the `YYYY:MM:DD HH:MM:SS` format of the TIFF DateTime tag
pub fn parse_tiff_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim().trim_end_matches('\0'), "%Y:%m:%d %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiff_datetime() {
        let parsed = parse_tiff_datetime("2023:07:14 09:30:00").unwrap();
        assert_eq!(parsed.to_string(), "2023-07-14 09:30:00");
        assert!(parse_tiff_datetime("yesterday").is_none());
    }

    #[test]
    fn test_file_summary() {
        let summary = FileSummary::new(400, 200, 3, 2);
        assert_eq!(summary.total_pixels, 240_000);
        assert_eq!(summary.uncompressed_size_bytes, 480_000);
        assert_eq!(summary.aspect_ratio, 2.0);
        assert!(summary.uncompressed_size_gb > 0.0 && summary.uncompressed_size_gb < 0.001);
    }
}
