//! NoData detection
//!
//! Decides the effective NoData value of each band from the declared
//! GDAL_NODATA value and a reservoir sample of the band. Detection never
//! fails; when nothing qualifies the band simply has no NoData value.

use std::fmt;

use log::debug;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::config::NoDataConfig;
use crate::raster::PixelType;
use crate::tiff::builders::metadata_tags::{format_nodata, parse_nodata};

/// Where the effective NoData value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataSource {
    Declared,
    Detected,
    None,
}

/// NoData decision for one band
#[derive(Debug, Clone, PartialEq)]
pub struct NoDataDecision {
    pub value: Option<f64>,
    pub source: NoDataSource,
    /// Value declared in the file, if any
    pub declared: Option<f64>,
    /// The declared value never occurs and lies outside the sampled range
    pub declared_unused: bool,
    /// Share of the sample equal to the effective value
    pub sample_share: f64,
}

impl NoDataDecision {
    fn none(declared: Option<f64>, declared_unused: bool) -> Self {
        NoDataDecision { value: None, source: NoDataSource::None, declared, declared_unused, sample_share: 0.0 }
    }
}

/// Whether a pixel value counts as valid data
///
/// NaN and infinite values are never valid.
#[inline]
pub fn is_valid(value: f64, nodata: Option<f64>) -> bool {
    value.is_finite() && nodata.map_or(true, |nd| value != nd)
}

/// A NoData candidate and the sample share it needs to qualify
#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: f64,
    threshold: f64,
}

/// Detector applying the declared-then-fallback rules
pub struct NoDataDetector<'a> {
    config: &'a NoDataConfig,
}

impl<'a> NoDataDetector<'a> {
    pub fn new(config: &'a NoDataConfig) -> Self {
        NoDataDetector { config }
    }

    /// Decide the NoData value of one band
    ///
    /// # Arguments
    /// * `sample` - Reservoir sample of the band, NaN included
    /// * `declared` - GDAL_NODATA value of the file
    /// * `pixel_type` - Sample type of the band
    pub fn detect(&self, sample: &[f64], declared: Option<f64>, pixel_type: PixelType) -> NoDataDecision {
        let declared = declared.map(|d| normalize(d, pixel_type));

        if let Some(value) = declared {
            let share = share_of(sample, value);
            if value.is_nan() || sample.is_empty() || share > 0.0 || within_range(sample, value) {
                debug!("Declared NoData {} trusted (share {:.4})", format_nodata(value), share);
                return NoDataDecision {
                    value: Some(value),
                    source: NoDataSource::Declared,
                    declared,
                    declared_unused: false,
                    sample_share: share,
                };
            }
            debug!("Declared NoData {} never occurs, probing fallbacks", format_nodata(value));
        }
        let declared_unused = declared.is_some();

        if sample.is_empty() {
            return NoDataDecision::none(declared, declared_unused);
        }

        for candidate in self.candidates(pixel_type) {
            let share = share_of(sample, candidate.value);
            if share > candidate.threshold {
                debug!("Detected NoData {} (share {:.4} > {})", format_nodata(candidate.value),
                       share, candidate.threshold);
                return NoDataDecision {
                    value: Some(candidate.value),
                    source: NoDataSource::Detected,
                    declared,
                    declared_unused,
                    sample_share: share,
                };
            }
        }

        NoDataDecision::none(declared, declared_unused)
    }

    /// Fallback candidates in priority order: 0, -9999, the type sentinel
    ///
    /// Sentinel-like values (-9999, NaN) need the presence threshold;
    /// values that are ordinary data (0, integer extremes) need the
    /// dominant threshold.
    fn candidates(&self, pixel_type: PixelType) -> Vec<Candidate> {
        let sentinel = pixel_type.sentinel();
        let sentinel_threshold = if sentinel.is_nan() {
            self.config.presence_threshold
        } else {
            self.config.dominant_threshold
        };

        let mut out: Vec<Candidate> = Vec::with_capacity(3);
        for candidate in [
            Candidate { value: 0.0, threshold: self.config.dominant_threshold },
            Candidate { value: -9999.0, threshold: self.config.presence_threshold },
            Candidate { value: sentinel, threshold: sentinel_threshold },
        ] {
            if !pixel_type.can_represent(candidate.value) {
                continue;
            }
            if out.iter().any(|c| same_value(c.value, candidate.value)) {
                continue;
            }
            out.push(candidate);
        }
        out
    }
}

/// Round a declared value to what the pixel type can hold
fn normalize(value: f64, pixel_type: PixelType) -> f64 {
    match pixel_type {
        PixelType::F32 => value as f32 as f64,
        _ => value,
    }
}

fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn share_of(sample: &[f64], value: f64) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let hits = sample.iter().filter(|v| same_value(**v, value)).count();
    hits as f64 / sample.len() as f64
}

/// Whether `value` lies inside the finite range of the sample
fn within_range(sample: &[f64], value: f64) -> bool {
    let mut finite = sample.iter().copied().filter(|v| v.is_finite());
    let Some(first) = finite.next() else {
        return false;
    };
    let (min, max) = finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    value >= min && value <= max
}

/// NoData value that survives JSON round trips
///
/// Finite values serialize as numbers; NaN and infinities as the strings
/// GDAL uses for them.
#[derive(Debug, Clone, Copy)]
pub struct NoDataValue(pub f64);

impl PartialEq for NoDataValue {
    fn eq(&self, other: &Self) -> bool {
        same_value(self.0, other.0)
    }
}

impl Serialize for NoDataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.serialize_str(&format_nodata(self.0))
        }
    }
}

impl<'de> Deserialize<'de> for NoDataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NoDataVisitor;

        impl<'de> Visitor<'de> for NoDataVisitor {
            type Value = NoDataValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or one of \"nan\", \"inf\", \"-inf\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<NoDataValue, E> {
                Ok(NoDataValue(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<NoDataValue, E> {
                Ok(NoDataValue(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<NoDataValue, E> {
                Ok(NoDataValue(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<NoDataValue, E> {
                parse_nodata(v).map(NoDataValue)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(NoDataVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector_config() -> NoDataConfig {
        NoDataConfig::default()
    }

    #[test]
    fn test_declared_value_present_is_trusted() {
        let config = detector_config();
        let sample = vec![5.0, 6.0, -1.0, 7.0];
        let d = NoDataDetector::new(&config).detect(&sample, Some(-1.0), PixelType::I16);
        assert_eq!(d.source, NoDataSource::Declared);
        assert_eq!(d.value, Some(-1.0));
        assert!(!d.declared_unused);
    }

    #[test]
    fn test_declared_value_inside_range_is_trusted() {
        let config = detector_config();
        let sample = vec![1.0, 10.0];
        let d = NoDataDetector::new(&config).detect(&sample, Some(5.0), PixelType::U8);
        assert_eq!(d.source, NoDataSource::Declared);
    }

    #[test]
    fn test_unused_declared_value_falls_back() {
        let config = detector_config();
        let mut sample = vec![0.0; 30];
        sample.extend((1..=70).map(|v| v as f64));
        let d = NoDataDetector::new(&config).detect(&sample, Some(-32768.0), PixelType::I16);
        assert!(d.declared_unused);
        assert_eq!(d.source, NoDataSource::Detected);
        assert_eq!(d.value, Some(0.0));
        assert!((d.sample_share - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_sentinel_thresholds() {
        let config = detector_config();
        let detector = NoDataDetector::new(&config);

        // 1% of -9999 is above the presence threshold
        let mut sample: Vec<f64> = (0..990).map(|v| 1.0 + v as f64).collect();
        sample.extend(vec![-9999.0; 10]);
        assert_eq!(detector.detect(&sample, None, PixelType::F32).value, Some(-9999.0));

        // 5% zeros is ordinary data
        let mut sample: Vec<f64> = (0..95).map(|v| 1.0 + v as f64).collect();
        sample.extend(vec![0.0; 5]);
        assert_eq!(detector.detect(&sample, None, PixelType::U8).source, NoDataSource::None);

        // u8 cannot hold -9999; 255 dominates
        let mut sample = vec![255.0; 50];
        sample.extend(vec![3.0; 50]);
        assert_eq!(detector.detect(&sample, None, PixelType::U8).value, Some(255.0));
    }

    #[test]
    fn test_nan_sentinel_for_floats() {
        let config = detector_config();
        let mut sample = vec![1.5; 99];
        sample.push(f64::NAN);
        let d = NoDataDetector::new(&config).detect(&sample, None, PixelType::F64);
        assert!(d.value.unwrap().is_nan());
        assert!(!is_valid(f64::NAN, None));
        assert!(!is_valid(f64::INFINITY, Some(0.0)));
        assert!(is_valid(1.5, Some(f64::NAN)));
    }

    #[test]
    fn test_nodata_value_json() {
        let json = serde_json::to_string(&vec![NoDataValue(f64::NAN), NoDataValue(-9999.0)]).unwrap();
        assert_eq!(json, "[\"nan\",-9999.0]");
        let back: Vec<NoDataValue> = serde_json::from_str(&json).unwrap();
        assert!(back[0].0.is_nan());
        assert_eq!(back[1], NoDataValue(-9999.0));
    }
}
