//! GeoTIFF Metadata and GeoKey parsing functionality
//!
//! This module reads the georeferencing tags of an IFD (pixel scale,
//! tiepoints, transformation matrix) and the GeoKey directory with every
//! key value resolved, and turns them into a 6-parameter affine
//! geotransform.

use std::collections::BTreeMap;
use log::{debug, warn};

use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{geo_keys, raster_type, tags, USER_DEFINED};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geotags::{get_key_name, GeoKeyEntry};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;

/// A resolved GeoKey value
#[derive(Debug, Clone, PartialEq)]
pub enum GeoKeyValue {
    /// Value stored directly in the key entry
    Short(u16),
    /// Values stored in the GeoKeyDirectory itself
    Shorts(Vec<u16>),
    /// Values stored in GeoDoubleParams
    Doubles(Vec<f64>),
    /// Value stored in GeoAsciiParams
    Ascii(String),
}

impl GeoKeyValue {
    /// Renders the value the way it is reported in metadata
    pub fn to_display_string(&self) -> String {
        match self {
            GeoKeyValue::Short(v) => v.to_string(),
            GeoKeyValue::Shorts(vs) => vs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","),
            GeoKeyValue::Doubles(vs) => vs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","),
            GeoKeyValue::Ascii(s) => s.clone(),
        }
    }
}

/// A parsed GeoKey directory with every value resolved
#[derive(Debug, Clone, Default)]
pub struct GeoKeyDirectory {
    /// KeyDirectoryVersion
    pub version: u16,
    /// KeyRevision.MinorRevision
    pub revision: (u16, u16),
    /// Raw key entries in file order
    pub entries: Vec<GeoKeyEntry>,
    /// Resolved values keyed by GeoKey ID
    pub values: BTreeMap<u16, GeoKeyValue>,
}

impl GeoKeyDirectory {
    /// A short-valued key, ignoring the "user defined" marker
    pub fn short(&self, key: u16) -> Option<u16> {
        match self.values.get(&key) {
            Some(GeoKeyValue::Short(v)) if *v != 0 && *v != USER_DEFINED => Some(*v),
            _ => None,
        }
    }

    /// An ASCII-valued key, trimmed of the GeoTIFF '|' terminator
    pub fn ascii(&self, key: u16) -> Option<&str> {
        match self.values.get(&key) {
            Some(GeoKeyValue::Ascii(s)) => Some(s.trim_end_matches('|').trim()),
            _ => None,
        }
    }

    /// A double-valued key (first value)
    pub fn double(&self, key: u16) -> Option<f64> {
        match self.values.get(&key) {
            Some(GeoKeyValue::Doubles(vs)) => vs.first().copied(),
            _ => None,
        }
    }

    /// Key name/value pairs for metadata reporting
    pub fn named_values(&self) -> BTreeMap<String, String> {
        self.values.iter()
            .map(|(id, value)| (get_key_name(*id), value.to_display_string()))
            .collect()
    }
}

/// Georeferencing tags of one IFD
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    /// ModelPixelScale (sx, sy, sz)
    pub pixel_scale: Option<Vec<f64>>,
    /// ModelTiepoint values (i, j, k, x, y, z, ...)
    pub tiepoints: Vec<f64>,
    /// ModelTransformation 4x4 matrix, row-major
    pub transformation: Option<Vec<f64>>,
    /// GeoKey directory, when present
    pub key_directory: Option<GeoKeyDirectory>,
}

impl GeoInfo {
    /// Whether the raster is declared PixelIsPoint
    pub fn is_pixel_is_point(&self) -> bool {
        self.key_directory.as_ref()
            .and_then(|dir| dir.short(geo_keys::RASTER_TYPE))
            == Some(raster_type::PIXEL_IS_POINT)
    }

    /// The GDAL-style affine geotransform
    ///
    /// `[origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h]`, derived
    /// from ModelTransformation when present, otherwise from the first
    /// tiepoint plus ModelPixelScale. PixelIsPoint rasters are shifted by
    /// half a pixel so the origin is the outer corner.
    pub fn geotransform(&self) -> Option<[f64; 6]> {
        let mut gt = if let Some(m) = self.transformation.as_ref().filter(|m| m.len() >= 16) {
            [m[3], m[0], m[1], m[7], m[4], m[5]]
        } else {
            let scale = self.pixel_scale.as_ref().filter(|s| s.len() >= 2)?;
            if self.tiepoints.len() < 6 {
                return None;
            }
            let (i, j, x, y) = (self.tiepoints[0], self.tiepoints[1], self.tiepoints[3], self.tiepoints[4]);
            [x - i * scale[0], scale[0], 0.0, y + j * scale[1], 0.0, -scale[1]]
        };

        if gt[1] == 0.0 && gt[2] == 0.0 {
            return None;
        }

        if self.is_pixel_is_point() {
            gt[0] -= 0.5 * gt[1] + 0.5 * gt[2];
            gt[3] -= 0.5 * gt[4] + 0.5 * gt[5];
        }

        Some(gt)
    }

    /// EPSG code declared by the GeoKeys (projected first, then geographic)
    pub fn epsg_code(&self) -> Option<u32> {
        let dir = self.key_directory.as_ref()?;
        dir.short(geo_keys::PROJECTED_CS_TYPE)
            .or_else(|| dir.short(geo_keys::GEOGRAPHIC_TYPE))
            .map(|code| code as u32)
    }

    /// Whether any georeferencing information is present
    pub fn is_georeferenced(&self) -> bool {
        self.geotransform().is_some() || self.epsg_code().is_some()
    }
}

/// Parser for GeoTIFF geographic metadata
pub struct GeoKeyParser;

impl GeoKeyParser {
    /// Reads all georeferencing tags from an IFD
    ///
    /// Missing tags are simply absent from the result; only malformed
    /// payloads are reported as errors.
    pub fn read_geo_info(reader: &TiffReader, stream: &mut dyn SeekableReader, ifd: &IFD) -> TiffResult<GeoInfo> {
        let mut info = GeoInfo::default();

        if ifd.has_tag(tags::MODEL_PIXEL_SCALE_TAG) {
            info.pixel_scale = Some(reader.read_tag_f64s(stream, ifd, tags::MODEL_PIXEL_SCALE_TAG)?);
        }
        if ifd.has_tag(tags::MODEL_TIEPOINT_TAG) {
            info.tiepoints = reader.read_tag_f64s(stream, ifd, tags::MODEL_TIEPOINT_TAG)?;
        }
        if ifd.has_tag(tags::MODEL_TRANSFORMATION_TAG) {
            info.transformation = Some(reader.read_tag_f64s(stream, ifd, tags::MODEL_TRANSFORMATION_TAG)?);
        }

        info.key_directory = match Self::parse_geo_key_directory(reader, stream, ifd) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Ignoring malformed GeoKey directory: {}", e);
                None
            }
        };

        debug!("GeoInfo: scale={:?}, tiepoints={}, transformation={}, keys={}",
               info.pixel_scale, info.tiepoints.len(), info.transformation.is_some(),
               info.key_directory.as_ref().map(|d| d.entries.len()).unwrap_or(0));

        Ok(info)
    }

    /// Parse the GeoKey directory from an IFD
    ///
    /// GeoKeys are stored as a header of four shorts (version, revision,
    /// minor revision, key count) followed by four shorts per key. Values
    /// live inline, in the directory, in GeoDoubleParams or in
    /// GeoAsciiParams depending on each key's tag location.
    ///
    /// # Returns
    /// The resolved directory, or None when the IFD has no GeoKeys
    pub fn parse_geo_key_directory(
        reader: &TiffReader,
        stream: &mut dyn SeekableReader,
        ifd: &IFD,
    ) -> TiffResult<Option<GeoKeyDirectory>> {
        if !ifd.has_tag(tags::GEO_KEY_DIRECTORY_TAG) {
            return Ok(None);
        }

        let shorts: Vec<u16> = reader.read_tag_values(stream, ifd, tags::GEO_KEY_DIRECTORY_TAG)?
            .into_iter()
            .map(|v| v as u16)
            .collect();

        if shorts.len() < 4 {
            return Err(TiffError::GenericError("Invalid GeoKey directory header".to_string()));
        }

        let num_keys = shorts[3] as usize;
        if shorts.len() < 4 + num_keys * 4 {
            return Err(TiffError::GenericError(format!(
                "GeoKey directory declares {} keys but holds {} values", num_keys, shorts.len())));
        }

        let doubles = if ifd.has_tag(tags::GEO_DOUBLE_PARAMS_TAG) {
            reader.read_tag_f64s(stream, ifd, tags::GEO_DOUBLE_PARAMS_TAG)?
        } else {
            Vec::new()
        };
        let ascii = if ifd.has_tag(tags::GEO_ASCII_PARAMS_TAG) {
            reader.read_tag_ascii(stream, ifd, tags::GEO_ASCII_PARAMS_TAG)?
        } else {
            String::new()
        };

        let mut dir = GeoKeyDirectory {
            version: shorts[0],
            revision: (shorts[1], shorts[2]),
            ..Default::default()
        };

        for chunk in shorts[4..4 + num_keys * 4].chunks_exact(4) {
            let entry = GeoKeyEntry::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            debug!("GeoKey: id={} ({}), location={}, count={}, offset={}",
                   entry.key_id, entry.get_name(), entry.tiff_tag_location, entry.count, entry.value_offset);

            match Self::resolve_value(&entry, &shorts, &doubles, &ascii) {
                Some(value) => {
                    dir.values.insert(entry.key_id, value);
                }
                None => warn!("Could not resolve GeoKey {} ({})", entry.key_id, entry.get_name()),
            }
            dir.entries.push(entry);
        }

        Ok(Some(dir))
    }

    /// Resolves a key's value from wherever its tag location points
    fn resolve_value(entry: &GeoKeyEntry, shorts: &[u16], doubles: &[f64], ascii: &str) -> Option<GeoKeyValue> {
        let start = entry.value_offset as usize;
        let count = entry.count as usize;

        match entry.tiff_tag_location {
            0 => Some(GeoKeyValue::Short(entry.value_offset)),
            tags::GEO_KEY_DIRECTORY_TAG => shorts.get(start..start + count)
                .map(|vs| GeoKeyValue::Shorts(vs.to_vec())),
            tags::GEO_DOUBLE_PARAMS_TAG => doubles.get(start..start + count)
                .map(|vs| GeoKeyValue::Doubles(vs.to_vec())),
            tags::GEO_ASCII_PARAMS_TAG => ascii.get(start..(start + count).min(ascii.len()))
                .map(|s| GeoKeyValue::Ascii(s.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with(raster: u16) -> GeoInfo {
        let mut dir = GeoKeyDirectory::default();
        dir.values.insert(geo_keys::RASTER_TYPE, GeoKeyValue::Short(raster));
        dir.values.insert(geo_keys::PROJECTED_CS_TYPE, GeoKeyValue::Short(32633));
        GeoInfo {
            pixel_scale: Some(vec![30.0, 30.0, 0.0]),
            tiepoints: vec![0.0, 0.0, 0.0, 500000.0, 4000000.0, 0.0],
            transformation: None,
            key_directory: Some(dir),
        }
    }

    #[test]
    fn test_geotransform_from_tiepoint_and_scale() {
        let gt = info_with(raster_type::PIXEL_IS_AREA).geotransform().unwrap();
        assert_eq!(gt, [500000.0, 30.0, 0.0, 4000000.0, 0.0, -30.0]);
    }

    #[test]
    fn test_pixel_is_point_shifts_half_pixel() {
        let gt = info_with(raster_type::PIXEL_IS_POINT).geotransform().unwrap();
        assert_eq!(gt[0], 499985.0);
        assert_eq!(gt[3], 4000015.0);
    }

    #[test]
    fn test_epsg_prefers_projected() {
        assert_eq!(info_with(1).epsg_code(), Some(32633));
    }

    #[test]
    fn test_ascii_key_trims_terminator() {
        let entry = GeoKeyEntry::new(geo_keys::CITATION, tags::GEO_ASCII_PARAMS_TAG, 6, 0);
        let value = GeoKeyParser::resolve_value(&entry, &[], &[], "UTM33|").unwrap();
        let mut dir = GeoKeyDirectory::default();
        dir.values.insert(geo_keys::CITATION, value);
        assert_eq!(dir.ascii(geo_keys::CITATION), Some("UTM33"));
    }
}
