//! Band role assignment
//!
//! Every band gets a semantic role (red, nir, ...) from the first source
//! that knows it:
//!
//! 1. a keyword in the band description or metadata
//! 2. a wavelength item
//! 3. RGB photometric interpretation
//! 4. the band table of a recognised sensor
//! 5. the band position

use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::metadata::BandMetadata;
use super::sensors::Sensor;

/// Semantic role of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandRole {
    Coastal,
    Blue,
    Green,
    Red,
    RedEdge,
    Nir,
    Swir,
    Swir2,
    Thermal,
    Panchromatic,
    Unknown,
}

impl BandRole {
    pub fn name(&self) -> &'static str {
        match self {
            BandRole::Coastal => "coastal",
            BandRole::Blue => "blue",
            BandRole::Green => "green",
            BandRole::Red => "red",
            BandRole::RedEdge => "red_edge",
            BandRole::Nir => "nir",
            BandRole::Swir => "swir",
            BandRole::Swir2 => "swir2",
            BandRole::Thermal => "thermal",
            BandRole::Panchromatic => "panchromatic",
            BandRole::Unknown => "unknown",
        }
    }

    /// Inverse of [`BandRole::name`]
    pub fn from_name(name: &str) -> Option<BandRole> {
        ROLE_KEYWORDS.iter()
            .map(|(role, _)| *role)
            .chain(std::iter::once(BandRole::Unknown))
            .find(|role| role.name() == name)
    }
}

impl fmt::Display for BandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a role was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    Keyword,
    Wavelength,
    Photometric,
    SensorTable,
    Position,
}

lazy_static! {
    /// Keyword patterns, most specific first so "red edge" wins over "red"
    static ref ROLE_KEYWORDS: Vec<(BandRole, Regex)> = vec![
        (BandRole::RedEdge, Regex::new(r"(?i)\bred\s?edge\b|\bre\d\b").unwrap()),
        (BandRole::Nir, Regex::new(r"(?i)\b(nir|near\s?infrared)\b").unwrap()),
        (BandRole::Swir2, Regex::new(r"(?i)\bswir\s?2\b").unwrap()),
        (BandRole::Swir, Regex::new(r"(?i)\bswir\s?1?\b").unwrap()),
        (BandRole::Thermal, Regex::new(r"(?i)\b(thermal|tir|lwir)\s?\d?\b").unwrap()),
        (BandRole::Panchromatic, Regex::new(r"(?i)\b(pan|panchromatic)\b").unwrap()),
        (BandRole::Coastal, Regex::new(r"(?i)\b(coastal|aerosol)\b").unwrap()),
        (BandRole::Red, Regex::new(r"(?i)\bred\b").unwrap()),
        (BandRole::Green, Regex::new(r"(?i)\bgreen\b").unwrap()),
        (BandRole::Blue, Regex::new(r"(?i)\bblue\b").unwrap()),
    ];

    static ref NUMBER: Regex = Regex::new(r"[-+]?\d+(\.\d+)?").unwrap();
    static ref MICROMETRE: Regex = Regex::new(r"(?i)(µm|um\b|micro)").unwrap();
}

/// Role named by a keyword in `text`
///
/// Underscores and hyphens count as word separators.
pub fn role_from_keyword(text: &str) -> Option<BandRole> {
    let normalized = text.replace(['_', '-'], " ");
    ROLE_KEYWORDS.iter()
        .find(|(_, pattern)| pattern.is_match(&normalized))
        .map(|(role, _)| *role)
}

/// Wavelength in nanometres from a metadata value
///
/// Values explicitly given in micrometres, or below 30 without a unit,
/// are converted from micrometres.
pub fn parse_wavelength(text: &str) -> Option<f64> {
    let number: f64 = NUMBER.find(text)?.as_str().parse().ok()?;
    if number <= 0.0 {
        return None;
    }
    if MICROMETRE.is_match(text) || number < 30.0 {
        Some(number * 1000.0)
    } else {
        Some(number)
    }
}

/// Role of a band centred at `nm` nanometres
pub fn classify_wavelength(nm: f64) -> Option<BandRole> {
    const RANGES: [(f64, f64, BandRole); 9] = [
        (400.0, 450.0, BandRole::Coastal),
        (450.0, 500.0, BandRole::Blue),
        (500.0, 600.0, BandRole::Green),
        (600.0, 700.0, BandRole::Red),
        (700.0, 760.0, BandRole::RedEdge),
        (760.0, 1000.0, BandRole::Nir),
        (1000.0, 1800.0, BandRole::Swir),
        (1800.0, 2500.0, BandRole::Swir2),
        (8000.0, 15000.0, BandRole::Thermal),
    ];
    RANGES.iter()
        .find(|(lo, hi, _)| nm >= *lo && nm < *hi)
        .map(|(_, _, role)| *role)
}

/// Default role by position for rasters without any other hint
pub fn positional_role(index: usize, band_count: usize) -> BandRole {
    use BandRole::*;
    let table: &[BandRole] = match band_count {
        0..=2 => &[],
        3 => &[Red, Green, Blue],
        4 => &[Red, Green, Blue, Nir],
        5 => &[Blue, Green, Red, Nir, Swir],
        _ => &[Blue, Green, Red, Nir, Swir, Swir2, Thermal],
    };
    index.checked_sub(1).and_then(|i| table.get(i)).copied().unwrap_or(Unknown)
}

/// Role decision for one band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    pub role: BandRole,
    pub source: RoleSource,
}

/// Assigns roles to all bands of a raster
pub struct RoleDetector {
    band_count: usize,
    rgb_photometric: bool,
    sensor: Option<Sensor>,
}

impl RoleDetector {
    pub fn new(band_count: usize, rgb_photometric: bool, sensor: Option<Sensor>) -> Self {
        RoleDetector { band_count, rgb_photometric, sensor }
    }

    /// Role of band `index` (1-based)
    pub fn assign(&self, index: usize, metadata: &BandMetadata) -> RoleAssignment {
        let keyword = metadata.description.as_deref()
            .and_then(role_from_keyword)
            .or_else(|| metadata.items.iter()
                .filter(|(name, _)| !name.to_ascii_lowercase().contains("wavelength"))
                .find_map(|(_, value)| role_from_keyword(value)));
        if let Some(role) = keyword {
            return RoleAssignment { role, source: RoleSource::Keyword };
        }

        if let Some(role) = metadata.wavelength_nm.and_then(classify_wavelength) {
            return RoleAssignment { role, source: RoleSource::Wavelength };
        }

        if self.rgb_photometric && self.band_count >= 3 && index <= 3 {
            let role = [BandRole::Red, BandRole::Green, BandRole::Blue][index - 1];
            return RoleAssignment { role, source: RoleSource::Photometric };
        }

        if let Some(role) = self.sensor.and_then(|s| s.band_role(index, self.band_count)) {
            return RoleAssignment { role, source: RoleSource::SensorTable };
        }

        RoleAssignment { role: positional_role(index, self.band_count), source: RoleSource::Position }
    }

    /// Roles of all bands, band-ordered
    pub fn assign_all(&self, bands: &[BandMetadata]) -> Vec<RoleAssignment> {
        bands.iter().enumerate()
            .map(|(i, meta)| {
                let assignment = self.assign(i + 1, meta);
                debug!("Band {}: role {} from {:?}", i + 1, assignment.role, assignment.source);
                assignment
            })
            .collect()
    }
}

/// Lowest band index (1-based) per known role
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleMap {
    bands: BTreeMap<BandRole, usize>,
}

impl RoleMap {
    pub fn from_roles(roles: &[BandRole]) -> Self {
        let mut bands = BTreeMap::new();
        for (i, role) in roles.iter().enumerate() {
            if *role != BandRole::Unknown {
                bands.entry(*role).or_insert(i + 1);
            }
        }
        RoleMap { bands }
    }

    pub fn band(&self, role: BandRole) -> Option<usize> {
        self.bands.get(&role).copied()
    }

    pub fn contains(&self, role: BandRole) -> bool {
        self.bands.contains_key(&role)
    }

    pub fn roles(&self) -> impl Iterator<Item = (BandRole, usize)> + '_ {
        self.bands.iter().map(|(r, b)| (*r, *b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn described(text: &str) -> BandMetadata {
        BandMetadata { description: Some(text.to_string()), ..BandMetadata::default() }
    }

    #[test]
    fn test_keywords() {
        assert_eq!(role_from_keyword("Red Edge 1"), Some(BandRole::RedEdge));
        assert_eq!(role_from_keyword("B8 NIR"), Some(BandRole::Nir));
        assert_eq!(role_from_keyword("SWIR_2"), Some(BandRole::Swir2));
        assert_eq!(role_from_keyword("swir1"), Some(BandRole::Swir));
        assert_eq!(role_from_keyword("TIR1"), Some(BandRole::Thermal));
        assert_eq!(role_from_keyword("band_red"), Some(BandRole::Red));
        assert_eq!(role_from_keyword("Coastal aerosol"), Some(BandRole::Coastal));
        assert_eq!(role_from_keyword("reduced"), None);
        assert_eq!(role_from_keyword("spanish"), None);
    }

    #[test]
    fn test_wavelengths() {
        assert_eq!(parse_wavelength("842"), Some(842.0));
        assert!((parse_wavelength("0.665").unwrap() - 665.0).abs() < 1e-6);
        assert!((parse_wavelength("10.9 um").unwrap() - 10900.0).abs() < 1e-6);
        assert_eq!(classify_wavelength(842.0), Some(BandRole::Nir));
        assert_eq!(classify_wavelength(665.0), Some(BandRole::Red));
        assert_eq!(classify_wavelength(10900.0), Some(BandRole::Thermal));
        assert_eq!(classify_wavelength(3000.0), None);
    }

    #[test]
    fn test_positional_defaults() {
        assert_eq!(positional_role(1, 1), BandRole::Unknown);
        assert_eq!(positional_role(4, 4), BandRole::Nir);
        assert_eq!(positional_role(1, 5), BandRole::Blue);
        assert_eq!(positional_role(7, 8), BandRole::Thermal);
        assert_eq!(positional_role(8, 8), BandRole::Unknown);
    }

    #[test]
    fn test_priority_order() {
        let detector = RoleDetector::new(4, true, None);
        let by_keyword = detector.assign(1, &described("nir"));
        assert_eq!(by_keyword, RoleAssignment { role: BandRole::Nir, source: RoleSource::Keyword });

        let by_wavelength = detector.assign(1, &BandMetadata { wavelength_nm: Some(560.0), ..Default::default() });
        assert_eq!(by_wavelength.source, RoleSource::Wavelength);
        assert_eq!(by_wavelength.role, BandRole::Green);

        let by_photometric = detector.assign(3, &BandMetadata::default());
        assert_eq!(by_photometric, RoleAssignment { role: BandRole::Blue, source: RoleSource::Photometric });

        let by_position = detector.assign(4, &BandMetadata::default());
        assert_eq!(by_position, RoleAssignment { role: BandRole::Nir, source: RoleSource::Position });

        let landsat = RoleDetector::new(7, false, Some(Sensor::Landsat));
        assert_eq!(landsat.assign(5, &BandMetadata::default()).source, RoleSource::SensorTable);
    }

    #[test]
    fn test_role_map_uses_lowest_index() {
        let map = RoleMap::from_roles(&[BandRole::Unknown, BandRole::Red, BandRole::Red, BandRole::Nir]);
        assert_eq!(map.band(BandRole::Red), Some(2));
        assert_eq!(map.band(BandRole::Nir), Some(4));
        assert!(!map.contains(BandRole::Unknown));
        assert_eq!(BandRole::from_name("red_edge"), Some(BandRole::RedEdge));
        assert_eq!(BandRole::from_name("unknown"), Some(BandRole::Unknown));
    }
}
