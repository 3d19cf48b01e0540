//! Index calculator
//!
//! Plans the indices a raster supports from its role map, then accumulates
//! their summaries window by window. No per-pixel array is kept.

use std::collections::HashSet;

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::IndicesConfig;
use crate::errors::SkippedComputation;
use crate::extractor::accumulate::{RunningStats, Summary};
use crate::extractor::nodata::is_valid;
use crate::extractor::roles::RoleMap;
use crate::raster::WindowData;

use super::registry::{divide, normalized_difference, registry, IndexCategory, IndexFormula};

const STAGE: &str = "indices";

/// How an index value is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaKind {
    Named,
    GenericRatio,
    GenericNormDiff,
}

/// Summary of one index over the raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedIndex {
    pub name: String,
    pub formula_kind: FormulaKind,
    pub category: IndexCategory,
    /// 1-based band indices in formula order
    pub input_band_indices: Vec<usize>,
    pub summary: Summary,
}

#[derive(Debug, Clone, Copy)]
enum Evaluation {
    Named(IndexFormula),
    Ratio,
    NormDiff,
}

#[derive(Debug, Clone)]
struct PlannedIndex {
    name: String,
    kind: FormulaKind,
    category: IndexCategory,
    bands: Vec<usize>,
    evaluation: Evaluation,
    stats: RunningStats,
    /// Pixels where every input band is valid
    common_valid: u64,
}

impl PlannedIndex {
    fn observe(&mut self, data: &WindowData, nodata: &[Option<f64>], epsilon: f64) {
        let mut values = [0.0f64; 4];
        let inputs = self.bands.len();

        'pixels: for p in 0..data.window.pixels() {
            for (slot, band) in self.bands.iter().enumerate() {
                let v = data.bands[band - 1][p];
                if !is_valid(v, nodata[band - 1]) {
                    continue 'pixels;
                }
                values[slot] = v;
            }
            self.common_valid += 1;

            let value = match self.evaluation {
                Evaluation::Named(formula) => formula.evaluate(&values[..inputs], epsilon),
                Evaluation::Ratio => divide(values[0], values[1], epsilon),
                Evaluation::NormDiff => normalized_difference(values[0], values[1], epsilon),
            };
            if let Some(value) = value {
                self.stats.push(value);
            }
        }
    }
}

/// Indices planned for one raster and their running summaries
pub struct IndexPlan {
    entries: Vec<PlannedIndex>,
    nodata: Vec<Option<f64>>,
    epsilon: f64,
    skipped: Vec<SkippedComputation>,
}

impl IndexPlan {
    /// Plan every applicable index
    ///
    /// # Arguments
    /// * `config` - Index options
    /// * `roles` - Lowest band per role
    /// * `nodata` - Effective NoData value per band
    /// * `valid_pixels` - Valid pixel count per band from the statistics stage
    pub fn new(config: &IndicesConfig, roles: &RoleMap, nodata: &[Option<f64>], valid_pixels: &[u64]) -> Self {
        let band_count = nodata.len();
        let band_empty = |band: usize| valid_pixels.get(band - 1).map_or(true, |n| *n == 0);
        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        let mut covered: HashSet<(usize, usize)> = HashSet::new();

        for def in registry(config.savi_l).into_iter().filter(|d| d.applicable(roles)) {
            let bands = def.input_bands(roles);
            if bands.len() == 2 {
                covered.insert((bands[0].min(bands[1]), bands[0].max(bands[1])));
            }
            if let Some(empty) = bands.iter().find(|b| band_empty(**b)) {
                skipped.push(SkippedComputation::new(STAGE, def.name,
                    format!("input band {} contains only NoData pixels", empty)));
                continue;
            }
            entries.push(PlannedIndex {
                name: def.name.to_string(),
                kind: FormulaKind::Named,
                category: def.category,
                bands,
                evaluation: Evaluation::Named(def.formula),
                stats: RunningStats::new(),
                common_valid: 0,
            });
        }

        if config.generic_pairs && band_count > config.max_generic_bands {
            skipped.push(SkippedComputation::new(STAGE, "generic_pairs",
                format!("{} bands exceed the generic pair limit of {}", band_count, config.max_generic_bands)));
        } else if config.generic_pairs {
            for i in 1..=band_count {
                for j in (i + 1)..=band_count {
                    if covered.contains(&(i, j)) || band_empty(i) || band_empty(j) {
                        continue;
                    }
                    for (kind, evaluation, prefix) in [
                        (FormulaKind::GenericRatio, Evaluation::Ratio, "ratio"),
                        (FormulaKind::GenericNormDiff, Evaluation::NormDiff, "normdiff"),
                    ] {
                        entries.push(PlannedIndex {
                            name: format!("{}_b{}_b{}", prefix, i, j),
                            kind,
                            category: IndexCategory::Spectral,
                            bands: vec![i, j],
                            evaluation,
                            stats: RunningStats::new(),
                            common_valid: 0,
                        });
                    }
                }
            }
        }

        debug!("Planned {} indices ({} skipped)", entries.len(), skipped.len());
        IndexPlan {
            entries,
            nodata: nodata.to_vec(),
            epsilon: config.epsilon,
            skipped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Accumulate one window into every planned index
    pub fn observe(&mut self, data: &WindowData) {
        let nodata = &self.nodata;
        let epsilon = self.epsilon;
        self.entries.par_iter_mut().for_each(|entry| entry.observe(data, nodata, epsilon));
    }

    /// Indices with at least one defined value, plus what was skipped
    pub fn finish(self) -> (Vec<ComputedIndex>, Vec<SkippedComputation>) {
        let mut skipped = self.skipped;
        let mut computed = Vec::with_capacity(self.entries.len());

        for entry in self.entries {
            match entry.stats.summary() {
                Some(summary) => computed.push(ComputedIndex {
                    name: entry.name,
                    formula_kind: entry.kind,
                    category: entry.category,
                    input_band_indices: entry.bands,
                    summary,
                }),
                None if entry.common_valid > 0 => skipped.push(SkippedComputation::new(
                    STAGE, entry.name,
                    format!("none of {} common valid pixels has a defined value", entry.common_valid))),
                None => debug!("{}: no pixel is valid in all input bands", entry.name),
            }
        }

        info!("Computed {} indices", computed.len());
        (computed, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::roles::BandRole;
    use crate::raster::Window;

    fn window(bands: Vec<Vec<f64>>) -> WindowData {
        let width = bands[0].len();
        let mut data = WindowData::new(Window::new(0, 1, width), bands.len());
        data.bands = bands;
        data
    }

    #[test]
    fn test_ndvi_of_constant_bands() {
        use BandRole::*;
        let roles = RoleMap::from_roles(&[Red, Green, Blue, Nir]);
        let nodata = vec![None; 4];
        let mut plan = IndexPlan::new(&IndicesConfig::default(), &roles, &nodata, &[4; 4]);
        plan.observe(&window(vec![vec![100.0; 4], vec![150.0; 4], vec![50.0; 4], vec![200.0; 4]]));
        let (computed, _) = plan.finish();

        let ndvi = computed.iter().find(|c| c.name == "ndvi").unwrap();
        assert!((ndvi.summary.mean - 0.3333).abs() < 1e-4);
        assert_eq!(ndvi.input_band_indices, vec![4, 1]);
        assert_eq!(ndvi.summary.valid_pixels, 4);
        // ndvi covers bands 1 and 4
        assert!(computed.iter().all(|c| c.name != "ratio_b1_b4"));
        assert!(computed.iter().any(|c| c.name == "ratio_b2_b3"));
    }

    #[test]
    fn test_generic_pairs_need_common_valid_pixels() {
        let roles = RoleMap::from_roles(&[BandRole::Unknown, BandRole::Unknown]);
        let nodata = vec![Some(0.0), Some(0.0)];
        let mut plan = IndexPlan::new(&IndicesConfig::default(), &roles, &nodata, &[1, 1]);
        plan.observe(&window(vec![vec![5.0, 0.0], vec![0.0, 5.0]]));
        let (computed, skipped) = plan.finish();
        assert!(computed.is_empty());
        assert!(skipped.is_empty());

        let mut plan = IndexPlan::new(&IndicesConfig::default(), &roles, &nodata, &[2, 2]);
        plan.observe(&window(vec![vec![2.0, 3.0], vec![4.0, 6.0]]));
        let (computed, _) = plan.finish();
        let names: Vec<&str> = computed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ratio_b1_b2", "normdiff_b1_b2"]);
        assert!((computed[0].summary.mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_values_are_recorded() {
        let roles = RoleMap::from_roles(&[BandRole::Unknown, BandRole::Unknown]);
        let mut plan = IndexPlan::new(&IndicesConfig::default(), &roles, &[None, None], &[2, 2]);
        plan.observe(&window(vec![vec![1.0, -2.0], vec![-1.0, 2.0]]));
        let (computed, skipped) = plan.finish();
        assert!(computed.iter().all(|c| c.name != "normdiff_b1_b2"));
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].item, "normdiff_b1_b2");
    }

    #[test]
    fn test_empty_input_band_skips_named_index() {
        use BandRole::*;
        let roles = RoleMap::from_roles(&[Red, Green, Blue, Nir]);
        let plan = IndexPlan::new(&IndicesConfig::default(), &roles, &[None; 4], &[10, 10, 10, 0]);
        let (_, skipped) = plan.finish();
        assert!(skipped.iter().any(|s| s.item == "ndvi"));
    }

    #[test]
    fn test_only_applicable_indices_are_planned() {
        use BandRole::*;
        let roles = RoleMap::from_roles(&[Red, Green, Nir]);
        let config = IndicesConfig { generic_pairs: false, ..IndicesConfig::default() };
        let mut plan = IndexPlan::new(&config, &roles, &[None; 3], &[2; 3]);
        plan.observe(&window(vec![vec![10.0, 20.0], vec![30.0, 40.0], vec![50.0, 60.0]]));
        let (computed, skipped) = plan.finish();

        assert!(skipped.is_empty());
        let registered = registry(config.savi_l);
        for index in &computed {
            let def = registered.iter().find(|d| d.name == index.name).unwrap();
            assert!(def.applicable(&roles));
        }
        assert!(computed.iter().any(|c| c.name == "ndvi"));
        assert!(computed.iter().all(|c| c.name != "evi" && c.name != "bsi" && c.name != "ndbi"));
    }

    #[test]
    fn test_single_band_plans_nothing() {
        let roles = RoleMap::from_roles(&[BandRole::Unknown]);
        let plan = IndexPlan::new(&IndicesConfig::default(), &roles, &[None], &[100]);
        assert!(plan.is_empty());
    }
}
