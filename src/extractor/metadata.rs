//! Metadata aggregation
//!
//! Gathers every metadata domain of a raster into one report:
//!
//! * `TIFF`: all tags of the main IFD, rendered as text
//! * `IMAGE_STRUCTURE`: compression, interleave and predictor
//! * `GEOTIFF`: the resolved GeoKeys
//! * `default` and any other domain found in the GDAL_METADATA tag
//!
//! Per-band GDAL items become [`BandMetadata`]. The aggregator also sorts
//! items into acquisition, quality, sensor, processing and coordinate
//! categories and recognises the sensor.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::raster::RasterHandle;
use crate::tiff::constants::{field_types, predictor, tags};
use crate::utils::tag_utils::get_tag_name;

use super::roles::parse_wavelength;
use super::sensors::{Sensor, SensorInfo};

/// Numeric tags with more values than this are summarised
const MAX_RENDERED_VALUES: u64 = 16;

pub const DOMAIN_TIFF: &str = "TIFF";
pub const DOMAIN_IMAGE_STRUCTURE: &str = "IMAGE_STRUCTURE";
pub const DOMAIN_GEOTIFF: &str = "GEOTIFF";
pub const DOMAIN_DEFAULT: &str = "default";

/// Metadata of one band
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandMetadata {
    pub description: Option<String>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub unit: Option<String>,
    pub wavelength_nm: Option<f64>,
    /// Remaining band items by name
    pub items: BTreeMap<String, String>,
}

impl BandMetadata {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.scale.is_none() && self.offset.is_none()
            && self.unit.is_none() && self.items.is_empty()
    }

    fn apply(&mut self, name: &str, role: Option<&str>, value: &str) {
        match role.map(|r| r.to_ascii_lowercase()).as_deref() {
            Some("description") => self.description = Some(value.to_string()),
            Some("scale") => self.scale = value.trim().parse().ok(),
            Some("offset") => self.offset = value.trim().parse().ok(),
            Some("unittype") => self.unit = Some(value.to_string()),
            _ => {
                if self.wavelength_nm.is_none() && name.to_ascii_lowercase().contains("wavelength") {
                    self.wavelength_nm = parse_wavelength(value);
                }
                self.items.insert(name.to_string(), value.to_string());
            }
        }
    }
}

/// Metadata items sorted by what they describe
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedMetadata {
    pub acquisition: BTreeMap<String, String>,
    pub quality: BTreeMap<String, String>,
    pub sensor: BTreeMap<String, String>,
    pub processing: BTreeMap<String, String>,
    pub coordinate: BTreeMap<String, String>,
}

impl ParsedMetadata {
    /// File `key` into the first matching category
    fn classify(&mut self, key: String, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

        let category = if has(&["date", "time", "acquisition", "sun", "solar", "azimuth", "elevation", "zenith"]) {
            &mut self.acquisition
        } else if has(&["cloud", "quality", "qa"]) {
            &mut self.quality
        } else if has(&["sensor", "platform", "satellite", "instrument", "band", "wavelength", "spectral"]) {
            &mut self.sensor
        } else if has(&["processing", "level", "correction", "calibration"]) {
            &mut self.processing
        } else if has(&["projection", "datum", "ellipsoid", "zone", "coordinate"]) {
            &mut self.coordinate
        } else {
            return;
        };
        category.insert(key, value.to_string());
    }
}

/// All metadata of a raster
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataReport {
    pub domains: BTreeMap<String, BTreeMap<String, String>>,
    pub bands: Vec<BandMetadata>,
    pub parsed: ParsedMetadata,
    pub sensor_info: SensorInfo,
}

impl MetadataReport {
    /// Domains holding at least one item
    pub fn populated_domains(&self) -> usize {
        self.domains.values().filter(|items| !items.is_empty()).count()
    }

    pub fn sensor(&self) -> Option<Sensor> {
        self.sensor_info.detected_sensor
    }

    /// Metadata of band `index` (1-based)
    pub fn band(&self, index: usize) -> Option<&BandMetadata> {
        index.checked_sub(1).and_then(|i| self.bands.get(i))
    }

    fn domain(&mut self, name: &str) -> &mut BTreeMap<String, String> {
        self.domains.entry(name.to_string()).or_default()
    }
}

/// Builds a [`MetadataReport`] from an opened raster
pub struct MetadataAggregator;

impl MetadataAggregator {
    pub fn collect(handle: &mut RasterHandle) -> MetadataReport {
        let mut report = MetadataReport {
            bands: vec![BandMetadata::default(); handle.band_count()],
            ..MetadataReport::default()
        };

        Self::collect_tiff_tags(handle, &mut report);
        Self::collect_image_structure(handle, &mut report);
        Self::collect_geokeys(handle, &mut report);
        Self::collect_gdal_items(handle, &mut report);

        report.parsed = Self::categorise(&report);
        report.sensor_info = SensorInfo::from_sensor(Self::detect_sensor(&report));

        debug!("Metadata: {} populated domains, sensor {:?}",
               report.populated_domains(), report.sensor());
        report
    }

    fn collect_tiff_tags(handle: &mut RasterHandle, report: &mut MetadataReport) {
        let entries: Vec<(u16, u16, u64)> = handle.ifd().entries.iter()
            .map(|e| (e.tag, e.field_type, e.count))
            .collect();

        for (tag, field_type, count) in entries {
            if tag == tags::GDAL_METADATA {
                continue;
            }
            let name = match get_tag_name(tag) {
                "Unknown" => format!("Tag{}", tag),
                known => known.to_string(),
            };
            let value = if field_type == field_types::ASCII {
                handle.ascii_tag(tag)
            } else if count > MAX_RENDERED_VALUES {
                Some(format!("<{} values>", count))
            } else {
                handle.numeric_tag(tag).map(|values| {
                    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
                })
            };
            if let Some(value) = value {
                report.domain(DOMAIN_TIFF).insert(name, value);
            }
        }
    }

    fn collect_image_structure(handle: &RasterHandle, report: &mut MetadataReport) {
        let layout = handle.layout();
        let compression = handle.compression_name().to_string();
        let interleave = layout.interleave().to_string();
        let predictor_code = layout.predictor;

        let domain = report.domain(DOMAIN_IMAGE_STRUCTURE);
        domain.insert("COMPRESSION".to_string(), compression);
        domain.insert("INTERLEAVE".to_string(), interleave);
        if predictor_code != predictor::NONE {
            domain.insert("PREDICTOR".to_string(), predictor_code.to_string());
        }
    }

    fn collect_geokeys(handle: &RasterHandle, report: &mut MetadataReport) {
        let geo = handle.geo_info();
        let Some(dir) = geo.key_directory.as_ref() else {
            return;
        };
        let mut values = dir.named_values();
        let area_or_point = if geo.is_pixel_is_point() { "Point" } else { "Area" };
        values.insert("AREA_OR_POINT".to_string(), area_or_point.to_string());
        report.domain(DOMAIN_GEOTIFF).extend(values);
    }

    fn collect_gdal_items(handle: &mut RasterHandle, report: &mut MetadataReport) {
        let band_count = report.bands.len();
        for item in handle.gdal_metadata() {
            match item.sample {
                Some(sample) if sample < band_count => {
                    report.bands[sample].apply(&item.name, item.role.as_deref(), &item.value);
                }
                Some(sample) => warn!("Ignoring metadata item {} for missing band {}", item.name, sample + 1),
                None => {
                    let domain = item.domain.as_deref().filter(|d| !d.is_empty()).unwrap_or(DOMAIN_DEFAULT);
                    report.domain(domain).insert(item.name, item.value);
                }
            }
        }
    }

    fn categorise(report: &MetadataReport) -> ParsedMetadata {
        let mut parsed = ParsedMetadata::default();
        for (domain, items) in &report.domains {
            for (name, value) in items {
                parsed.classify(format!("{}:{}", domain, name), name, value);
            }
        }
        for (i, band) in report.bands.iter().enumerate() {
            for (name, value) in &band.items {
                parsed.classify(format!("band_{}:{}", i + 1, name), name, value);
            }
        }
        parsed
    }

    /// Sensor named anywhere in the item names, values or band descriptions
    ///
    /// TIFF structure tags are skipped; their names carry no sensor hints
    /// and their values are numbers.
    fn detect_sensor(report: &MetadataReport) -> Option<Sensor> {
        let mut texts: Vec<&str> = Vec::new();
        for (domain, items) in &report.domains {
            for (name, value) in items {
                if domain != DOMAIN_TIFF {
                    texts.push(name);
                }
                texts.push(value);
            }
        }
        for band in &report.bands {
            texts.extend(band.description.as_deref());
            for (name, value) in &band.items {
                texts.push(name);
                texts.push(value);
            }
        }
        Sensor::detect(&texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_items_by_role() {
        let mut band = BandMetadata::default();
        band.apply("DESCRIPTION", Some("description"), "NIR");
        band.apply("SCALE", Some("scale"), "0.0001");
        band.apply("OFFSET", Some("offset"), "-0.1");
        band.apply("UNITTYPE", Some("unittype"), "reflectance");
        band.apply("CENTRAL_WAVELENGTH", None, "842 nm");
        assert_eq!(band.description.as_deref(), Some("NIR"));
        assert_eq!(band.scale, Some(0.0001));
        assert_eq!(band.offset, Some(-0.1));
        assert_eq!(band.unit.as_deref(), Some("reflectance"));
        assert_eq!(band.wavelength_nm, Some(842.0));
        assert_eq!(band.items.len(), 1);
    }

    #[test]
    fn test_categories() {
        let mut parsed = ParsedMetadata::default();
        parsed.classify("default:ACQUISITION_DATE".into(), "ACQUISITION_DATE", "2024-05-01");
        parsed.classify("default:CLOUD_COVER".into(), "CLOUD_COVER", "3.2");
        parsed.classify("default:SPACECRAFT".into(), "PLATFORM", "Sentinel-2A");
        parsed.classify("default:PROCESSING_LEVEL".into(), "PROCESSING_LEVEL", "L2A");
        parsed.classify("default:UTM_ZONE".into(), "UTM_ZONE", "33");
        parsed.classify("default:FOO".into(), "FOO", "bar");
        assert_eq!(parsed.acquisition.len(), 1);
        assert_eq!(parsed.quality.len(), 1);
        assert_eq!(parsed.sensor.len(), 1);
        assert_eq!(parsed.processing.len(), 1);
        assert_eq!(parsed.coordinate.len(), 1);
    }

    #[test]
    fn test_populated_domains_and_sensor() {
        let mut report = MetadataReport::default();
        report.domain(DOMAIN_TIFF).insert("ImageWidth".into(), "10".into());
        report.domain(DOMAIN_GEOTIFF);
        report.domain(DOMAIN_DEFAULT).insert("SPACECRAFT_ID".into(), "LANDSAT_9".into());
        assert_eq!(report.populated_domains(), 2);
        assert_eq!(MetadataAggregator::detect_sensor(&report), Some(Sensor::Landsat));
    }
}
