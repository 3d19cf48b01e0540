//! GeoTIFF tag definitions and utilities
//!
//! Names for GeoTIFF tags, GeoKeys and the EPSG/GeoTIFF code tables, loaded
//! once from the bundled `geotiff_tags.toml`.

use std::collections::HashMap;
use lazy_static::lazy_static;
use log::warn;
use crate::tiff::constants::tags;
use crate::tiff::errors::{TiffError, TiffResult};

lazy_static! {
    static ref GEOTIFF_DEFINITIONS: GeoTiffDefinitions = {
        let content = include_str!("../../geotiff_tags.toml");
        GeoTiffDefinitions::parse(content).unwrap_or_else(|e| {
            warn!("Failed to parse GeoTIFF tag definitions: {}", e);
            GeoTiffDefinitions::default()
        })
    };
}

/// Code tables that can be looked up by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTable {
    ModelType,
    RasterType,
    LinearUnit,
    AngularUnit,
    GeographicCs,
    GeodeticDatum,
    Ellipsoid,
    ProjectedCs,
    Projection,
    CoordTransform,
}

impl CodeTable {
    fn toml_key(&self) -> &'static str {
        match self {
            CodeTable::ModelType => "model_type_codes",
            CodeTable::RasterType => "raster_type_codes",
            CodeTable::LinearUnit => "linear_unit_codes",
            CodeTable::AngularUnit => "angular_unit_codes",
            CodeTable::GeographicCs => "geographic_cs_codes",
            CodeTable::GeodeticDatum => "geodetic_datum_codes",
            CodeTable::Ellipsoid => "ellipsoid_codes",
            CodeTable::ProjectedCs => "projected_cs_codes",
            CodeTable::Projection => "projection_codes",
            CodeTable::CoordTransform => "coord_transformation_codes",
        }
    }

    const ALL: [CodeTable; 10] = [
        CodeTable::ModelType,
        CodeTable::RasterType,
        CodeTable::LinearUnit,
        CodeTable::AngularUnit,
        CodeTable::GeographicCs,
        CodeTable::GeodeticDatum,
        CodeTable::Ellipsoid,
        CodeTable::ProjectedCs,
        CodeTable::Projection,
        CodeTable::CoordTransform,
    ];
}

/// Container for GeoTIFF tag and key definitions
#[derive(Debug, Default)]
pub struct GeoTiffDefinitions {
    /// Maps tag IDs to tag names
    pub tag_names: HashMap<u16, String>,
    /// Maps GeoKey IDs to key names
    pub key_names: HashMap<u16, String>,
    /// Code tables keyed by their TOML table name
    code_tables: HashMap<&'static str, HashMap<u16, String>>,
}

impl GeoTiffDefinitions {
    /// Parse GeoTIFF definitions from a TOML string
    pub fn parse(content: &str) -> TiffResult<Self> {
        let toml_value: toml::Value = content.parse()
            .map_err(|e| TiffError::GenericError(format!("Failed to parse TOML: {}", e)))?;

        let mut defs = GeoTiffDefinitions::default();
        Self::parse_code_table(&toml_value, "tag_ids", &mut defs.tag_names);
        Self::parse_code_table(&toml_value, "key_ids", &mut defs.key_names);

        for table in CodeTable::ALL {
            let mut names = HashMap::new();
            Self::parse_code_table(&toml_value, table.toml_key(), &mut names);
            defs.code_tables.insert(table.toml_key(), names);
        }

        Ok(defs)
    }

    /// Helper to parse code tables from TOML
    fn parse_code_table(toml_value: &toml::Value, table_name: &str, target: &mut HashMap<u16, String>) {
        if let Some(table) = toml_value.get(table_name).and_then(|v| v.as_table()) {
            for (k, v) in table {
                if let (Ok(id), Some(name)) = (k.parse::<u16>(), v.as_str()) {
                    target.insert(id, name.to_string());
                }
            }
        }
    }

    /// Get a tag name by ID
    pub fn get_tag_name(&self, tag_id: u16) -> String {
        self.tag_names.get(&tag_id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown-{}", tag_id))
    }

    /// Get a GeoKey name by ID
    pub fn get_key_name(&self, key_id: u16) -> String {
        self.key_names.get(&key_id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown-{}", key_id))
    }

    /// Look up a code in one of the code tables
    pub fn lookup(&self, table: CodeTable, code: u16) -> Option<&str> {
        self.code_tables.get(table.toml_key())
            .and_then(|names| names.get(&code))
            .map(|s| s.as_str())
    }

    /// Human-readable name of an EPSG coordinate system code
    pub fn get_crs_name(&self, code: u32) -> Option<String> {
        let known = match code {
            3857 => Some("WGS 84 / Pseudo-Mercator".to_string()),
            4326 => Some("WGS 84".to_string()),
            3395 => Some("WGS 84 / World Mercator".to_string()),
            32601..=32660 => Some(format!("WGS 84 / UTM zone {}N", code - 32600)),
            32701..=32760 => Some(format!("WGS 84 / UTM zone {}S", code - 32700)),
            26901..=26923 => Some(format!("NAD83 / UTM zone {}N", code - 26900)),
            26701..=26722 => Some(format!("NAD27 / UTM zone {}N", code - 26700)),
            25828..=25838 => Some(format!("ETRS89 / UTM zone {}N", code - 25800)),
            _ => None,
        };

        known.or_else(|| {
            let code = u16::try_from(code).ok()?;
            self.lookup(CodeTable::ProjectedCs, code)
                .or_else(|| self.lookup(CodeTable::GeographicCs, code))
                .map(|s| s.to_string())
        })
    }
}

/// Represents a GeoKey entry in a GeoKey directory
#[derive(Debug, Clone)]
pub struct GeoKeyEntry {
    pub key_id: u16,
    pub tiff_tag_location: u16,
    pub count: u16,
    pub value_offset: u16,
}

impl GeoKeyEntry {
    /// Create a new GeoKey entry
    pub fn new(key_id: u16, tiff_tag_location: u16, count: u16, value_offset: u16) -> Self {
        GeoKeyEntry {
            key_id,
            tiff_tag_location,
            count,
            value_offset,
        }
    }

    /// Get the name of this key
    pub fn get_name(&self) -> String {
        get_key_name(self.key_id)
    }
}

/// Check if a tag is a GeoTIFF tag
pub fn is_geotiff_tag(tag: u16) -> bool {
    matches!(tag,
        tags::MODEL_PIXEL_SCALE_TAG |
        tags::MODEL_TRANSFORMATION_TAG |
        tags::MODEL_TIEPOINT_TAG |
        tags::GEO_KEY_DIRECTORY_TAG |
        tags::GEO_DOUBLE_PARAMS_TAG |
        tags::GEO_ASCII_PARAMS_TAG)
}

/// Get a tag name from the GeoTIFF definitions
pub fn get_tag_name(tag: u16) -> String {
    GEOTIFF_DEFINITIONS.get_tag_name(tag)
}

/// Get a GeoKey name
pub fn get_key_name(key: u16) -> String {
    GEOTIFF_DEFINITIONS.get_key_name(key)
}

/// Get a code name, falling back to the numeric code
pub fn get_code_name(table: CodeTable, code: u16) -> String {
    GEOTIFF_DEFINITIONS.lookup(table, code)
        .map(|s| s.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Get a coordinate system name for an EPSG code
pub fn get_crs_name(code: u32) -> Option<String> {
    GEOTIFF_DEFINITIONS.get_crs_name(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_definitions_load() {
        assert_eq!(get_key_name(1024), "GTModelTypeGeoKey");
        assert_eq!(get_code_name(CodeTable::LinearUnit, 9001), "Linear_Meter");
        assert_eq!(get_code_name(CodeTable::LinearUnit, 1), "1");
    }

    #[test]
    fn test_crs_names() {
        assert_eq!(get_crs_name(32633).as_deref(), Some("WGS 84 / UTM zone 33N"));
        assert_eq!(get_crs_name(4326).as_deref(), Some("WGS 84"));
    }
}
