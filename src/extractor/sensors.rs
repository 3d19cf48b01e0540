//! Sensor recognition
//!
//! Sensors are recognised from keywords anywhere in the metadata (names
//! or values). A recognised sensor contributes capability information, a
//! list of typical bands and, for Landsat and Sentinel-2, a band role
//! table used when no band carries its own description.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::roles::BandRole;

/// Sensor families the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    Landsat,
    Sentinel,
    Modis,
    Spot,
    Aster,
    Worldview,
    Rapideye,
    Planetscope,
    /// Solar radiation products
    Custom,
}

lazy_static! {
    /// Keyword patterns in detection priority order
    static ref SENSOR_PATTERNS: Vec<(Sensor, Regex)> = vec![
        (Sensor::Landsat, Regex::new(r"(?i)\b(landsat|oli|tirs|etm\+?|tm)\b").unwrap()),
        (Sensor::Sentinel, Regex::new(r"(?i)\b(sentinel|msi|s2a|s2b)\b").unwrap()),
        (Sensor::Modis, Regex::new(r"(?i)\b(modis|terra|aqua)\b").unwrap()),
        (Sensor::Spot, Regex::new(r"(?i)\b(spot|hrvir)\b").unwrap()),
        (Sensor::Aster, Regex::new(r"(?i)\baster\b").unwrap()),
        (Sensor::Worldview, Regex::new(r"(?i)\b(worldview|quickbird|geoeye)\b").unwrap()),
        (Sensor::Rapideye, Regex::new(r"(?i)\brapideye\b").unwrap()),
        (Sensor::Planetscope, Regex::new(r"(?i)\bplanetscope\b").unwrap()),
        (Sensor::Custom, Regex::new(r"(?i)\b(solar|radiation|dsr|direct|diffuse)\b").unwrap()),
    ];
}

/// Published characteristics of a sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_resolution: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectral_bands: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revisit_time: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swath_width: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<&'static str>,
    pub applications: &'static [&'static str],
}

impl Sensor {
    /// First sensor whose keywords occur in any of `texts`
    ///
    /// Underscores separate words, so `LANDSAT_8` matches `landsat`.
    pub fn detect(texts: &[&str]) -> Option<Sensor> {
        let texts: Vec<String> = texts.iter().map(|t| t.replace('_', " ")).collect();
        SENSOR_PATTERNS.iter()
            .find(|(_, pattern)| texts.iter().any(|text| pattern.is_match(text)))
            .map(|(sensor, _)| *sensor)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sensor::Landsat => "landsat",
            Sensor::Sentinel => "sentinel",
            Sensor::Modis => "modis",
            Sensor::Spot => "spot",
            Sensor::Aster => "aster",
            Sensor::Worldview => "worldview",
            Sensor::Rapideye => "rapideye",
            Sensor::Planetscope => "planetscope",
            Sensor::Custom => "custom",
        }
    }

    pub fn capabilities(&self) -> Option<SensorCapabilities> {
        let caps = match self {
            Sensor::Landsat => SensorCapabilities {
                spatial_resolution: Some("15-100m"),
                spectral_bands: Some("11 bands"),
                revisit_time: Some("16 days"),
                swath_width: Some("185km"),
                data_type: None,
                applications: &["land cover", "agriculture", "forestry", "urban planning"],
            },
            Sensor::Sentinel => SensorCapabilities {
                spatial_resolution: Some("10-60m"),
                spectral_bands: Some("13 bands"),
                revisit_time: Some("5 days"),
                swath_width: Some("290km"),
                data_type: None,
                applications: &["vegetation monitoring", "water quality", "land change"],
            },
            Sensor::Modis => SensorCapabilities {
                spatial_resolution: Some("250-1000m"),
                spectral_bands: Some("36 bands"),
                revisit_time: Some("1-2 days"),
                swath_width: Some("2330km"),
                data_type: None,
                applications: &["climate monitoring", "fire detection", "ocean color"],
            },
            Sensor::Custom => SensorCapabilities {
                spatial_resolution: None,
                spectral_bands: None,
                revisit_time: None,
                swath_width: None,
                data_type: Some("solar radiation"),
                applications: &["solar energy", "agriculture", "climate"],
            },
            _ => return None,
        };
        Some(caps)
    }

    pub fn typical_bands(&self) -> &'static [&'static str] {
        match self {
            Sensor::Landsat => &["Coastal", "Blue", "Green", "Red", "NIR", "SWIR1", "SWIR2", "Pan",
                                 "Cirrus", "TIR1", "TIR2"],
            Sensor::Sentinel => &["Coastal", "Blue", "Green", "Red", "Red Edge 1", "Red Edge 2",
                                  "Red Edge 3", "NIR", "Red Edge 4", "Water Vapor", "SWIR1", "SWIR2"],
            Sensor::Modis => &["Red", "NIR", "Blue", "Green", "NIR2", "SWIR1", "SWIR2", "SWIR3",
                               "SWIR4", "SWIR5", "SWIR6", "SWIR7"],
            Sensor::Custom => &["DSR", "Direct", "Diffuse", "Solar Radiation"],
            _ => &[],
        }
    }

    /// Role of band `index` (1-based) in the sensor's standard band order
    ///
    /// # Returns
    /// None for sensors without a table, or when the raster has too few
    /// bands to be a full product of the sensor
    pub fn band_role(&self, index: usize, band_count: usize) -> Option<BandRole> {
        use BandRole::*;
        let table: &[BandRole] = match (self, band_count) {
            // OLI/TIRS: B1..B11 with panchromatic B8 and cirrus B9
            (Sensor::Landsat, n) if n >= 7 => &[Coastal, Blue, Green, Red, Nir, Swir, Swir2,
                                                Panchromatic, Unknown, Thermal, Thermal],
            // MSI L2A without the cirrus band
            (Sensor::Sentinel, 12) => &[Coastal, Blue, Green, Red, RedEdge, RedEdge, RedEdge, Nir,
                                        RedEdge, Unknown, Swir, Swir2],
            (Sensor::Sentinel, n) if n >= 13 => &[Coastal, Blue, Green, Red, RedEdge, RedEdge, RedEdge,
                                                  Nir, RedEdge, Unknown, Unknown, Swir, Swir2],
            _ => return None,
        };
        Some(table.get(index.checked_sub(1)?).copied().unwrap_or(Unknown))
    }
}

/// Sensor information reported with the metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorInfo {
    pub detected_sensor: Option<Sensor>,
    pub capabilities: Option<SensorCapabilities>,
    pub typical_bands: Vec<&'static str>,
}

impl SensorInfo {
    pub fn from_sensor(sensor: Option<Sensor>) -> Self {
        SensorInfo {
            detected_sensor: sensor,
            capabilities: sensor.and_then(|s| s.capabilities()),
            typical_bands: sensor.map(|s| s.typical_bands().to_vec()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_on_word_boundaries() {
        assert_eq!(Sensor::detect(&["LANDSAT_8 OLI_TIRS"]), Some(Sensor::Landsat));
        assert_eq!(Sensor::detect(&["SPACECRAFT_ID", "Sentinel-2A"]), Some(Sensor::Sentinel));
        // "html" and "atmosphere" must not look like TM
        assert_eq!(Sensor::detect(&["html", "atmosphere"]), None);
    }

    #[test]
    fn test_priority_follows_table_order() {
        assert_eq!(Sensor::detect(&["modis", "landsat"]), Some(Sensor::Landsat));
    }

    #[test]
    fn test_band_tables() {
        assert_eq!(Sensor::Landsat.band_role(5, 7), Some(BandRole::Nir));
        assert_eq!(Sensor::Landsat.band_role(10, 11), Some(BandRole::Thermal));
        assert_eq!(Sensor::Landsat.band_role(1, 4), None);
        assert_eq!(Sensor::Sentinel.band_role(12, 12), Some(BandRole::Swir2));
        assert_eq!(Sensor::Sentinel.band_role(13, 13), Some(BandRole::Swir2));
        assert_eq!(Sensor::Sentinel.band_role(1, 11), None);
        assert_eq!(Sensor::Spot.band_role(1, 4), None);
    }

    #[test]
    fn test_sensor_info() {
        let info = SensorInfo::from_sensor(Some(Sensor::Sentinel));
        assert_eq!(info.typical_bands.len(), 12);
        assert_eq!(info.capabilities.unwrap().revisit_time, Some("5 days"));
        assert!(SensorInfo::from_sensor(None).typical_bands.is_empty());
    }
}
