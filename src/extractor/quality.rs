//! Quality scoring
//!
//! A 110 point completeness score over what the extraction produced.
//!
//! | part              | points |
//! |-------------------|--------|
//! | basic             | 30     |
//! | band analysis     | 25     |
//! | metadata          | 25     |
//! | advanced analysis | 30     |
//! | sensor bonus      | 5      |

use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use crate::config::QualityConfig;

use super::indices::{ComputedIndex, FormulaKind, IndexCategory};
use super::metadata::MetadataReport;
use super::spatial::SpatialReport;
use super::statistics::BandStatisticsOutcome;

const BASIC_MAX: f64 = 30.0;
const BAND_MAX: f64 = 25.0;
const METADATA_MAX: f64 = 25.0;
const ADVANCED_MAX: f64 = 30.0;
const SENSOR_MAX: f64 = 5.0;
const TOTAL_MAX: f64 = 110.0;
const POINTS_PER_CATEGORY: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityScore {
    pub basic: f64,
    pub band_analysis: f64,
    pub metadata: f64,
    pub advanced_analysis: f64,
    pub sensor_bonus: f64,
    pub total: f64,
    /// Categories that earned advanced analysis points
    pub advanced_categories: Vec<IndexCategory>,
}

/// Structural facts the basic score checks
#[derive(Debug, Clone, Copy)]
pub struct BasicFacts<'a> {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub pixel_type: Option<&'a str>,
    pub driver: &'a str,
    pub file_size_bytes: u64,
}

/// Everything the scorer reads
pub struct QualityInputs<'a> {
    pub basic: BasicFacts<'a>,
    pub spatial: &'a SpatialReport,
    pub bands: &'a [BandStatisticsOutcome],
    pub metadata: &'a MetadataReport,
    pub indices: &'a [ComputedIndex],
    pub has_correlation: bool,
}

pub struct QualityScorer<'a> {
    config: &'a QualityConfig,
}

impl<'a> QualityScorer<'a> {
    pub fn new(config: &'a QualityConfig) -> Self {
        QualityScorer { config }
    }

    pub fn score(&self, inputs: &QualityInputs) -> QualityScore {
        let basic = Self::basic(inputs).clamp(0.0, BASIC_MAX);
        let band_analysis = self.band_analysis(inputs.bands).clamp(0.0, BAND_MAX);
        let metadata = (inputs.metadata.populated_domains() as f64
            / self.config.expected_metadata_domains.max(1) as f64 * METADATA_MAX).clamp(0.0, METADATA_MAX);
        let advanced_categories = Self::advanced_categories(inputs);
        let advanced_analysis = (advanced_categories.len() as f64 * POINTS_PER_CATEGORY).clamp(0.0, ADVANCED_MAX);
        let sensor_bonus = if inputs.metadata.sensor().is_some() { SENSOR_MAX } else { 0.0 };

        let total = (basic + band_analysis + metadata + advanced_analysis + sensor_bonus).clamp(0.0, TOTAL_MAX);
        debug!("Quality: basic {:.1}, bands {:.1}, metadata {:.1}, advanced {:.1}, sensor {:.1} = {:.1}",
               basic, band_analysis, metadata, advanced_analysis, sensor_bonus, total);

        QualityScore {
            basic,
            band_analysis,
            metadata,
            advanced_analysis,
            sensor_bonus,
            total,
            advanced_categories: advanced_categories.into_iter().collect(),
        }
    }

    fn basic(inputs: &QualityInputs) -> f64 {
        let facts = &inputs.basic;
        let present = [
            facts.width > 0,
            facts.height > 0,
            facts.band_count > 0,
            facts.pixel_type.is_some(),
            !facts.driver.is_empty(),
            facts.file_size_bytes > 0,
        ];
        let structural = 10.0 * present.iter().filter(|p| **p).count() as f64 / present.len() as f64;

        let spatial = inputs.spatial;
        let mut score = structural;
        if spatial.has_geotransform() {
            score += 5.0;
        }
        if spatial.has_projection() {
            score += 5.0;
        }
        if spatial.bounding_box.is_some() {
            score += 10.0;
        }
        score
    }

    fn band_analysis(&self, bands: &[BandStatisticsOutcome]) -> f64 {
        if bands.is_empty() {
            return 0.0;
        }
        let total = bands.len() as f64;
        let complete = bands.iter().filter(|b| b.statistics.is_some()).count() as f64;
        let sparse = bands.iter()
            .filter(|b| b.valid_pixel_ratio < self.config.near_zero_valid_ratio)
            .count() as f64;
        complete / total * BAND_MAX - sparse * (BAND_MAX / 2.0) / total
    }

    fn advanced_categories(inputs: &QualityInputs) -> BTreeSet<IndexCategory> {
        let mut categories: BTreeSet<IndexCategory> = inputs.indices.iter()
            .filter(|i| i.formula_kind == FormulaKind::Named)
            .map(|i| i.category)
            .collect();
        let generic = inputs.indices.iter().any(|i| i.formula_kind != FormulaKind::Named);
        if generic || inputs.has_correlation {
            categories.insert(IndexCategory::Spectral);
        }
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::accumulate::Summary;

    fn facts() -> BasicFacts<'static> {
        BasicFacts {
            width: 10,
            height: 10,
            band_count: 1,
            pixel_type: Some("UInt8"),
            driver: "GTiff",
            file_size_bytes: 1000,
        }
    }

    fn empty_spatial() -> SpatialReport {
        SpatialReport {
            geotransform: None,
            crs: None,
            bounding_box: None,
            corners: None,
            center: None,
            resolution: None,
            area: None,
            area_units: None,
            wgs84_bounds: None,
            pixel_is_point: false,
        }
    }

    fn outcome(valid: u64, total: u64) -> BandStatisticsOutcome {
        BandStatisticsOutcome {
            statistics: None,
            histogram: Vec::new(),
            total_pixels: total,
            valid_pixels: valid,
            nodata_pixels: total - valid,
            valid_pixel_ratio: valid as f64 / total as f64,
        }
    }

    fn index(name: &str, kind: FormulaKind, category: IndexCategory) -> ComputedIndex {
        ComputedIndex {
            name: name.to_string(),
            formula_kind: kind,
            category,
            input_band_indices: vec![1, 2],
            summary: Summary { mean: 0.0, std: 0.0, min: 0.0, max: 0.0, valid_pixels: 1 },
        }
    }

    #[test]
    fn test_all_nodata_single_band_stays_in_range() {
        let config = QualityConfig::default();
        let spatial = empty_spatial();
        let metadata = MetadataReport::default();
        let bands = vec![outcome(0, 100)];
        let score = QualityScorer::new(&config).score(&QualityInputs {
            basic: facts(),
            spatial: &spatial,
            bands: &bands,
            metadata: &metadata,
            indices: &[],
            has_correlation: false,
        });
        assert_eq!(score.basic, 10.0);
        assert_eq!(score.band_analysis, 0.0);
        assert_eq!(score.advanced_analysis, 0.0);
        assert!((0.0..=110.0).contains(&score.total));
    }

    #[test]
    fn test_advanced_categories() {
        let config = QualityConfig::default();
        let spatial = empty_spatial();
        let metadata = MetadataReport::default();
        let indices = vec![
            index("ndvi", FormulaKind::Named, IndexCategory::Vegetation),
            index("savi", FormulaKind::Named, IndexCategory::Vegetation),
            index("ndwi", FormulaKind::Named, IndexCategory::Water),
            index("ratio_b2_b3", FormulaKind::GenericRatio, IndexCategory::Spectral),
        ];
        let score = QualityScorer::new(&config).score(&QualityInputs {
            basic: facts(),
            spatial: &spatial,
            bands: &[],
            metadata: &metadata,
            indices: &indices,
            has_correlation: false,
        });
        assert_eq!(score.advanced_analysis, 18.0);
        assert_eq!(score.advanced_categories,
                   vec![IndexCategory::Vegetation, IndexCategory::Water, IndexCategory::Spectral]);
    }
}
