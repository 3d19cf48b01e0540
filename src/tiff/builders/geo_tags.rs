//! GeoTIFF tag strategies
//!
//! This module handles the specialized tags that turn a regular TIFF into a
//! GeoTIFF: the model placement (pixel scale and tiepoint, or a full
//! transformation matrix for rotated grids) and the GeoKey directory that
//! names the coordinate reference system.

use crate::tiff::ifd::IFD;
use crate::tiff::constants::{tags, geo_keys, model_type, raster_type, units};
use crate::utils::tiff_utils::{self, ExternalData};
use log::{debug, info};

/// Coordinate reference system description written into the GeoKeys
#[derive(Debug, Clone, Default)]
pub struct GeoKeySpec {
    /// EPSG code of the CRS, if known
    pub epsg: Option<u32>,
    /// Whether the CRS is geographic (lat/lon) rather than projected
    pub geographic: bool,
    /// Free-text citation
    pub citation: Option<String>,
}

/// Handles GeoTIFF tags and transformations
pub struct GeoTagsBuilder;

impl GeoTagsBuilder {
    /// Add the model placement tags for an affine geotransform
    ///
    /// `geotransform` follows the usual six-term convention
    /// `[origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h]`. North-up
    /// grids are written as ModelPixelScale + ModelTiepoint; rotated ones as
    /// a ModelTransformation matrix.
    pub fn add_geotransform(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        geotransform: &[f64; 6],
        is_big_tiff: bool,
    ) {
        let [origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h] = *geotransform;

        if row_rot == 0.0 && col_rot == 0.0 {
            info!("Adding pixel scale ({}, {}) and tiepoint ({}, {})", pixel_w, -pixel_h, origin_x, origin_y);
            tiff_utils::add_doubles(ifd, external_data, ifd_index, tags::MODEL_PIXEL_SCALE_TAG,
                                    &[pixel_w, -pixel_h, 0.0], is_big_tiff);
            tiff_utils::add_doubles(ifd, external_data, ifd_index, tags::MODEL_TIEPOINT_TAG,
                                    &[0.0, 0.0, 0.0, origin_x, origin_y, 0.0], is_big_tiff);
        } else {
            info!("Adding model transformation for rotated grid");
            let matrix = [
                pixel_w, row_rot, 0.0, origin_x,
                col_rot, pixel_h, 0.0, origin_y,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            tiff_utils::add_doubles(ifd, external_data, ifd_index, tags::MODEL_TRANSFORMATION_TAG,
                                    &matrix, is_big_tiff);
        }
    }

    /// Add the GeoKey directory (and ASCII params for the citation)
    pub fn add_geokeys(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        spec: &GeoKeySpec,
        is_big_tiff: bool,
    ) {
        // (key id, location, count, value) sorted by key id
        let mut keys: Vec<[u16; 4]> = Vec::new();

        let model = if spec.geographic { model_type::GEOGRAPHIC } else { model_type::PROJECTED };
        keys.push([geo_keys::MODEL_TYPE, 0, 1, model]);
        keys.push([geo_keys::RASTER_TYPE, 0, 1, raster_type::PIXEL_IS_AREA]);

        let mut ascii_params = String::new();
        if let Some(citation) = spec.citation.as_deref().filter(|c| !c.is_empty()) {
            let text = format!("{}|", citation);
            keys.push([geo_keys::CITATION, tags::GEO_ASCII_PARAMS_TAG, text.len() as u16, 0]);
            ascii_params.push_str(&text);
        }

        // Codes above u16 range cannot be expressed as a GeoKey
        let code = spec.epsg
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(crate::tiff::constants::USER_DEFINED);

        if spec.geographic {
            keys.push([geo_keys::GEOGRAPHIC_TYPE, 0, 1, code]);
            keys.push([geo_keys::GEOG_ANGULAR_UNITS, 0, 1, units::ANGULAR_DEGREE]);
        } else {
            keys.push([geo_keys::PROJECTED_CS_TYPE, 0, 1, code]);
            keys.push([geo_keys::PROJ_LINEAR_UNITS, 0, 1, units::LINEAR_METER]);
        }
        keys.sort_by_key(|k| k[0]);

        debug!("Writing {} GeoKeys (EPSG {:?})", keys.len(), spec.epsg);

        let mut directory = vec![1u16, 1, 0, keys.len() as u16];
        for key in &keys {
            directory.extend_from_slice(key);
        }
        tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::GEO_KEY_DIRECTORY_TAG,
                               &directory, is_big_tiff);

        if !ascii_params.is_empty() {
            tiff_utils::add_ascii(ifd, external_data, ifd_index, tags::GEO_ASCII_PARAMS_TAG,
                                  &ascii_params, is_big_tiff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_north_up_uses_scale_and_tiepoint() {
        let mut ifd = IFD::new(0, 0);
        let mut external = ExternalData::new();
        GeoTagsBuilder::add_geotransform(&mut ifd, &mut external, 0,
                                         &[500000.0, 30.0, 0.0, 4000000.0, 0.0, -30.0], false);

        assert!(ifd.has_tag(tags::MODEL_PIXEL_SCALE_TAG));
        assert!(ifd.has_tag(tags::MODEL_TIEPOINT_TAG));
        assert!(!ifd.has_tag(tags::MODEL_TRANSFORMATION_TAG));

        let scale = &external[&(0, tags::MODEL_PIXEL_SCALE_TAG)];
        assert_eq!(f64::from_le_bytes(scale[8..16].try_into().unwrap()), 30.0);
    }

    #[test]
    fn test_geokeys_are_sorted_and_carry_epsg() {
        let mut ifd = IFD::new(0, 0);
        let mut external = ExternalData::new();
        let spec = GeoKeySpec { epsg: Some(32633), geographic: false, citation: Some("UTM 33N".into()) };
        GeoTagsBuilder::add_geokeys(&mut ifd, &mut external, 0, &spec, false);

        let raw = &external[&(0, tags::GEO_KEY_DIRECTORY_TAG)];
        let shorts: Vec<u16> = raw.chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        assert_eq!(shorts[3], 5);
        let ids: Vec<u16> = shorts[4..].chunks(4).map(|k| k[0]).collect();
        assert_eq!(ids, vec![1024, 1025, 1026, 3072, 3076]);
        assert_eq!(shorts[4 + 3 * 4 + 3], 32633);
        assert!(ifd.has_tag(tags::GEO_ASCII_PARAMS_TAG));
    }
}
