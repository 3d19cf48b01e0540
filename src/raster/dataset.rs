//! Immutable dataset snapshot

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::pixel_type::PixelType;

/// Driver short name reported for every raster the engine opens
pub const DRIVER_NAME: &str = "GTiff";
/// Driver long name
pub const DRIVER_LONG_NAME: &str = "GeoTIFF";

/// Core description of an opened raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterDataset {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub pixel_type: PixelType,
    /// `[origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h]`
    pub geotransform: Option<[f64; 6]>,
    pub projection_wkt: Option<String>,
    pub driver_name: String,
    pub file_size_bytes: u64,
    /// File creation time, or modification time where the platform has none
    pub created_at: Option<DateTime<Utc>>,
}

impl RasterDataset {
    /// Pixels per band
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_georeferenced(&self) -> bool {
        self.geotransform.is_some()
    }
}
