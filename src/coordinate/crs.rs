//! Coordinate Reference System handling
//!
//! Identifies the coordinate system declared by a raster's GeoKeys and
//! renders it in the representations reported by the spatial extractor:
//! OGC WKT, PROJ string, name, authority and units.

use log::debug;
use serde::Serialize;

use crate::tiff::constants::{geo_keys, model_type, units};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geo_key_parser::GeoInfo;
use crate::tiff::geotags::{get_code_name, get_crs_name, CodeTable};

const WGS84_GEOGCS: &str = concat!(
    "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,",
    "AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],",
    "PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],",
    "UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]]"
);

const METRE_UNIT: &str = "UNIT[\"metre\",1,AUTHORITY[\"EPSG\",\"9001\"]]";

/// Identifier for common coordinate systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    /// WGS 84 (EPSG:4326)
    WGS84,
    /// Web Mercator (EPSG:3857)
    WebMercator,
    /// UTM zone on WGS 84 (EPSG:326xx north, 327xx south)
    UTM(u8, bool),
    /// Other EPSG code
    Other(u32),
}

impl CoordinateSystem {
    /// Get the EPSG code for this coordinate system
    pub fn epsg_code(&self) -> u32 {
        match self {
            CoordinateSystem::WGS84 => 4326,
            CoordinateSystem::WebMercator => 3857,
            CoordinateSystem::UTM(zone, is_northern) => {
                if *is_northern {
                    32600 + *zone as u32
                } else {
                    32700 + *zone as u32
                }
            },
            CoordinateSystem::Other(code) => *code,
        }
    }

    /// Get a description of this coordinate system
    pub fn description(&self) -> String {
        match self {
            CoordinateSystem::WGS84 => "WGS 84 (EPSG:4326)".to_string(),
            CoordinateSystem::WebMercator => "Web Mercator (EPSG:3857)".to_string(),
            CoordinateSystem::UTM(zone, is_northern) => {
                format!("UTM Zone {}{} (EPSG:{})", zone, if *is_northern { "N" } else { "S" }, self.epsg_code())
            },
            CoordinateSystem::Other(code) => format!("EPSG:{}", code),
        }
    }

    /// Whether coordinates are longitude/latitude
    ///
    /// EPSG codes 4000-4999 are geographic systems.
    pub fn is_geographic(&self) -> bool {
        match self {
            CoordinateSystem::WGS84 => true,
            CoordinateSystem::WebMercator | CoordinateSystem::UTM(..) => false,
            CoordinateSystem::Other(code) => (4000..5000).contains(code),
        }
    }

    /// Whether the system can be converted to WGS 84 without a projection library
    pub fn converts_to_wgs84(&self) -> bool {
        !matches!(self, CoordinateSystem::Other(_))
    }

    /// Central meridian of a UTM zone in degrees
    pub fn central_meridian(zone: u8) -> f64 {
        (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// OGC WKT 1 definition
    ///
    /// Full definitions for the WGS 84 family, a named stub with the EPSG
    /// authority for anything else.
    pub fn to_wkt(&self, name: Option<&str>) -> String {
        match self {
            CoordinateSystem::WGS84 => format!("{},AXIS[\"Latitude\",NORTH],AXIS[\"Longitude\",EAST],AUTHORITY[\"EPSG\",\"4326\"]]", WGS84_GEOGCS),
            CoordinateSystem::WebMercator => format!(
                "PROJCS[\"WGS 84 / Pseudo-Mercator\",{}],PROJECTION[\"Mercator_1SP\"],\
                 PARAMETER[\"central_meridian\",0],PARAMETER[\"scale_factor\",1],\
                 PARAMETER[\"false_easting\",0],PARAMETER[\"false_northing\",0],{},\
                 AXIS[\"Easting\",EAST],AXIS[\"Northing\",NORTH],AUTHORITY[\"EPSG\",\"3857\"]]",
                WGS84_GEOGCS, METRE_UNIT),
            CoordinateSystem::UTM(zone, is_northern) => format!(
                "PROJCS[\"WGS 84 / UTM zone {}{}\",{},AUTHORITY[\"EPSG\",\"4326\"]],\
                 PROJECTION[\"Transverse_Mercator\"],PARAMETER[\"latitude_of_origin\",0],\
                 PARAMETER[\"central_meridian\",{}],PARAMETER[\"scale_factor\",0.9996],\
                 PARAMETER[\"false_easting\",500000],PARAMETER[\"false_northing\",{}],{},\
                 AXIS[\"Easting\",EAST],AXIS[\"Northing\",NORTH],AUTHORITY[\"EPSG\",\"{}\"]]",
                zone, if *is_northern { "N" } else { "S" }, WGS84_GEOGCS,
                Self::central_meridian(*zone), if *is_northern { 0 } else { 10_000_000 },
                METRE_UNIT, self.epsg_code()),
            CoordinateSystem::Other(code) => {
                let fallback = format!("EPSG:{}", code);
                let name = name.unwrap_or(&fallback);
                if self.is_geographic() {
                    format!("GEOGCS[\"{}\",AUTHORITY[\"EPSG\",\"{}\"]]", name, code)
                } else {
                    format!("PROJCS[\"{}\",AUTHORITY[\"EPSG\",\"{}\"]]", name, code)
                }
            }
        }
    }

    /// PROJ string, for the systems that have a well-known one
    pub fn to_proj4(&self) -> Option<String> {
        match self {
            CoordinateSystem::WGS84 => Some("+proj=longlat +datum=WGS84 +no_defs".to_string()),
            CoordinateSystem::WebMercator => Some(
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"
                    .to_string()),
            CoordinateSystem::UTM(zone, is_northern) => Some(format!(
                "+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs",
                zone, if *is_northern { "" } else { " +south" })),
            CoordinateSystem::Other(_) => None,
        }
    }
}

/// Factory for creating coordinate systems
pub struct CoordinateSystemFactory;

impl CoordinateSystemFactory {
    /// Create a coordinate system from an EPSG code
    pub fn from_epsg(epsg: u32) -> CoordinateSystem {
        match epsg {
            4326 => CoordinateSystem::WGS84,
            3857 | 900913 => CoordinateSystem::WebMercator,
            32601..=32660 => CoordinateSystem::UTM((epsg - 32600) as u8, true),
            32701..=32760 => CoordinateSystem::UTM((epsg - 32700) as u8, false),
            _ => CoordinateSystem::Other(epsg),
        }
    }

    /// Parse a coordinate system from a string (e.g. "EPSG:4326")
    pub fn from_string(crs_str: &str) -> TiffResult<CoordinateSystem> {
        let crs_str = crs_str.trim().to_uppercase();
        let code = crs_str.strip_prefix("EPSG:").unwrap_or(&crs_str);

        code.parse::<u32>()
            .map(Self::from_epsg)
            .map_err(|_| TiffError::GenericError(format!("Unsupported CRS format: {}", crs_str)))
    }
}

/// The coordinate reference system of a raster in every reported form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsDescription {
    pub epsg: Option<u32>,
    pub name: Option<String>,
    pub authority: Option<String>,
    pub wkt: Option<String>,
    pub proj4: Option<String>,
    pub is_geographic: bool,
    pub is_projected: bool,
    pub linear_units: Option<String>,
    pub angular_units: Option<String>,
}

impl CrsDescription {
    /// Describe the CRS declared by the GeoKeys
    ///
    /// # Returns
    /// None when the raster declares neither an EPSG code nor a citation
    pub fn from_geo_info(geo: &GeoInfo) -> Option<Self> {
        let dir = geo.key_directory.as_ref()?;
        let epsg = geo.epsg_code();
        let citation = [geo_keys::PROJ_CITATION, geo_keys::CITATION, geo_keys::GEOG_CITATION].iter()
            .find_map(|&key| dir.ascii(key))
            .map(|c| c.trim_end_matches('|').to_string())
            .filter(|c| !c.is_empty());

        if epsg.is_none() && citation.is_none() {
            return None;
        }

        let system = epsg.map(CoordinateSystemFactory::from_epsg);
        let is_geographic = match dir.short(geo_keys::MODEL_TYPE) {
            Some(model_type::GEOGRAPHIC) => true,
            Some(model_type::PROJECTED) => false,
            _ => system.map(|s| s.is_geographic()).unwrap_or(false),
        };

        let name = epsg.and_then(get_crs_name).or_else(|| citation.clone());
        let wkt = match system {
            Some(system) => system.to_wkt(name.as_deref()),
            None => format!("LOCAL_CS[\"{}\"]", name.as_deref().unwrap_or("unknown")),
        };

        let linear_units = dir.short(geo_keys::PROJ_LINEAR_UNITS)
            .or_else(|| dir.short(geo_keys::GEOG_LINEAR_UNITS))
            .map(linear_unit_name)
            .or_else(|| (!is_geographic).then(|| "metre".to_string()));
        let angular_units = dir.short(geo_keys::GEOG_ANGULAR_UNITS)
            .map(angular_unit_name)
            .or_else(|| Some("degree".to_string()));

        let description = CrsDescription {
            epsg,
            name,
            authority: epsg.map(|_| "EPSG".to_string()),
            wkt: Some(wkt),
            proj4: system.and_then(|s| s.to_proj4()),
            is_geographic,
            is_projected: !is_geographic,
            linear_units,
            angular_units,
        };
        debug!("CRS: {:?} ({:?})", description.name, description.epsg);
        Some(description)
    }
}

/// Unit name for a GeoTIFF linear unit code
pub fn linear_unit_name(code: u16) -> String {
    match code {
        units::LINEAR_METER => "metre".to_string(),
        units::LINEAR_FOOT => "foot".to_string(),
        units::LINEAR_FOOT_US_SURVEY => "US survey foot".to_string(),
        other => get_code_name(CodeTable::LinearUnit, other),
    }
}

/// Unit name for a GeoTIFF angular unit code
pub fn angular_unit_name(code: u16) -> String {
    match code {
        units::ANGULAR_DEGREE => "degree".to_string(),
        units::ANGULAR_RADIAN => "radian".to_string(),
        other => get_code_name(CodeTable::AngularUnit, other),
    }
}
