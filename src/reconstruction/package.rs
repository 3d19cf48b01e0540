//! Reconstruction package
//!
//! A compact JSON document holding a stratified pixel sample and everything
//! needed to rebuild an approximation of the source raster.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Interpolation;
use crate::errors::{EngineResult, ExtractionError};
use crate::extractor::nodata::NoDataValue;
use crate::extractor::roles::BandRole;
use crate::raster::PixelType;

/// Current package layout
pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
}

/// Range and mean of a band with valid pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// One sampled pixel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelSample {
    /// Geo x of the pixel centre (pixel x when not georeferenced)
    pub x: f64,
    /// Geo y of the pixel centre (pixel y when not georeferenced)
    pub y: f64,
    pub col: usize,
    pub row: usize,
    /// Value per band, None where the band is invalid
    pub band_values: Vec<Option<f64>>,
}

/// Cell of the stratification grid, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSize {
    pub width: usize,
    pub height: usize,
}

/// The file a package was taken from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub original_filename: String,
    pub original_size_bytes: u64,
    pub driver: String,
}

/// Uncompressed footprint of one band and its tile grid at the output block size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandStorage {
    pub estimated_size_bytes: u64,
    pub tiles_x: usize,
    pub tiles_y: usize,
}

impl BandStorage {
    pub fn new(width: usize, height: usize, pixel_type: PixelType, block_size: u32) -> Self {
        let block = (block_size as usize).max(1);
        BandStorage {
            estimated_size_bytes: (width * height * pixel_type.bytes()) as u64,
            tiles_x: width.div_ceil(block),
            tiles_y: height.div_ceil(block),
        }
    }
}

/// Output options of the rebuilt raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationOptions {
    pub compress: String,
    pub tiled: bool,
    pub block_size: u32,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionPackage {
    pub format_version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub original_dimensions: Dimensions,
    pub geotransform: Option<[f64; 6]>,
    pub projection_wkt: Option<String>,
    pub epsg: Option<u32>,
    pub pixel_type: PixelType,
    pub nodata_values: Vec<Option<NoDataValue>>,
    pub band_roles: Vec<BandRole>,
    pub band_summaries: Vec<Option<BandSummary>>,
    pub band_storage: Vec<BandStorage>,
    pub pixel_samples: Vec<PixelSample>,
    pub sample_fraction: f64,
    pub grid_cell_size: CellSize,
    pub seed: u64,
    pub source_file: SourceFile,
    pub creation_options: CreationOptions,
}

impl ReconstructionPackage {
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a package
    pub fn from_json(text: &str) -> EngineResult<Self> {
        let package: ReconstructionPackage = serde_json::from_str(text)
            .map_err(|e| ExtractionError::InvalidPackage(format!("malformed package: {}", e)))?;
        package.validate()?;
        Ok(package)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        fs::write(path, self.to_json()?)?;
        info!("Saved reconstruction package with {} samples to {}", self.pixel_samples.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path)?;
        let package = Self::from_json(&text)?;
        debug!("Loaded package of run {} ({} samples)", package.run_id, package.pixel_samples.len());
        Ok(package)
    }

    /// Effective NoData of band `band` (0-based)
    pub fn nodata(&self, band: usize) -> Option<f64> {
        self.nodata_values.get(band).copied().flatten().map(|v| v.0)
    }

    /// Check internal consistency
    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |msg: String| Err(ExtractionError::InvalidPackage(msg));
        let dims = self.original_dimensions;

        if self.format_version != FORMAT_VERSION {
            return invalid(format!("unsupported format version {}", self.format_version));
        }
        if dims.width == 0 || dims.height == 0 || dims.bands == 0 {
            return invalid(format!("empty dimensions {}x{}x{}", dims.width, dims.height, dims.bands));
        }
        for (what, len) in [
            ("nodata_values", self.nodata_values.len()),
            ("band_roles", self.band_roles.len()),
            ("band_summaries", self.band_summaries.len()),
            ("band_storage", self.band_storage.len()),
        ] {
            if len != dims.bands {
                return invalid(format!("{} has {} entries for {} bands", what, len, dims.bands));
            }
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return invalid(format!("sample_fraction {} outside (0, 1]", self.sample_fraction));
        }
        if self.grid_cell_size.width == 0 || self.grid_cell_size.height == 0 {
            return invalid(format!("grid cell {}x{} must be positive",
                                   self.grid_cell_size.width, self.grid_cell_size.height));
        }
        for (band, summary) in self.band_summaries.iter().enumerate() {
            if let Some(s) = summary {
                if !(s.min.is_finite() && s.max.is_finite() && s.min <= s.max) {
                    return invalid(format!("band {} summary range [{}, {}] is invalid", band + 1, s.min, s.max));
                }
            }
        }
        if let Some(gt) = self.geotransform {
            if gt.iter().any(|c| !c.is_finite()) {
                return invalid("geotransform has non-finite coefficients".to_string());
            }
        }
        for (i, sample) in self.pixel_samples.iter().enumerate() {
            if sample.col >= dims.width || sample.row >= dims.height {
                return invalid(format!("sample {} at ({}, {}) lies outside the raster", i, sample.col, sample.row));
            }
            if sample.band_values.len() != dims.bands {
                return invalid(format!("sample {} has {} band values for {} bands",
                                       i, sample.band_values.len(), dims.bands));
            }
            if sample.band_values.iter().flatten().any(|v| !v.is_finite()) {
                return invalid(format!("sample {} holds a non-finite value", i));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn package(width: usize, height: usize, samples: Vec<PixelSample>) -> ReconstructionPackage {
        ReconstructionPackage {
            format_version: FORMAT_VERSION,
            run_id: "test".to_string(),
            created_at: Utc::now(),
            original_dimensions: Dimensions { width, height, bands: 1 },
            geotransform: Some([500000.0, 10.0, 0.0, 4100000.0, 0.0, -10.0]),
            projection_wkt: None,
            epsg: Some(32633),
            pixel_type: PixelType::F32,
            nodata_values: vec![Some(NoDataValue(-9999.0))],
            band_roles: vec![BandRole::Unknown],
            band_summaries: vec![Some(BandSummary { min: 0.0, max: 10.0, mean: 5.0 })],
            band_storage: vec![BandStorage::new(width, height, PixelType::F32, 256)],
            pixel_samples: samples,
            sample_fraction: 0.25,
            grid_cell_size: CellSize { width: 2, height: 2 },
            seed: 42,
            source_file: SourceFile {
                original_filename: "test.tif".to_string(),
                original_size_bytes: 1024,
                driver: "GTiff".to_string(),
            },
            creation_options: CreationOptions {
                compress: "deflate".to_string(),
                tiled: false,
                block_size: 256,
                interpolation: Interpolation::Idw,
            },
        }
    }

    fn sample(col: usize, row: usize, value: f64) -> PixelSample {
        PixelSample { x: col as f64, y: row as f64, col, row, band_values: vec![Some(value)] }
    }

    #[test]
    fn test_json_keeps_package() {
        let original = package(4, 4, vec![sample(1, 1, 3.0), sample(3, 2, 7.0)]);
        let parsed = ReconstructionPackage::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.nodata(0), Some(-9999.0));
    }

    #[test]
    fn test_band_storage_estimate() {
        let storage = BandStorage::new(600, 300, PixelType::U16, 256);
        assert_eq!(storage.estimated_size_bytes, 360_000);
        assert_eq!((storage.tiles_x, storage.tiles_y), (3, 2));
    }

    #[test]
    fn test_validation_errors() {
        let outside = package(4, 4, vec![sample(4, 0, 1.0)]);
        assert!(matches!(outside.validate(), Err(ExtractionError::InvalidPackage(_))));

        let mut roles = package(4, 4, Vec::new());
        roles.band_roles.clear();
        assert!(roles.validate().is_err());

        let mut flat = package(4, 4, Vec::new());
        flat.grid_cell_size.height = 0;
        assert!(flat.validate().is_err());

        assert!(matches!(ReconstructionPackage::from_json("{\"run_id\": 3}"),
                         Err(ExtractionError::InvalidPackage(_))));
    }
}
