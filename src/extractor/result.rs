//! Extraction result
//!
//! The aggregate a run returns, split into the groups that are stored
//! separately: `spatial_summary`, `raw_metadata`, `band_details`,
//! `computed_indices`, `processing_summary` and `reconstruction`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::errors::{EngineResult, SkippedComputation};
use crate::raster::{RasterDataset, RasterLayout};
use crate::reconstruction::ReconstructionPackage;
use crate::tiff::constants::photometric;

use super::context::StageTiming;
use super::indices::{ComputedIndex, FormulaKind};
use super::metadata::{BandMetadata, MetadataReport};
use super::nodata::{NoDataDecision, NoDataSource, NoDataValue};
use super::quality::QualityScore;
use super::roles::{BandRole, RoleAssignment, RoleSource};
use super::spatial::SpatialReport;
use super::spectral::SpectralReport;
use super::statistics::{BandStatistics, BandStatisticsOutcome, HistogramBin};
use super::structural::StructuralReport;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything known about one band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandReport {
    /// 1-based band index
    pub index: usize,
    pub role: BandRole,
    pub role_source: RoleSource,
    pub nodata_value: Option<NoDataValue>,
    pub nodata_source: NoDataSource,
    pub declared_nodata: Option<NoDataValue>,
    /// Declared value ignored because it never occurs in the data
    pub declared_nodata_unused: bool,
    pub statistics: Option<BandStatistics>,
    pub histogram: Vec<HistogramBin>,
    pub valid_pixel_ratio: f64,
    pub total_pixels: u64,
    pub valid_pixels: u64,
    pub nodata_pixels: u64,
    pub description: Option<String>,
    pub wavelength_nm: Option<f64>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub unit: Option<String>,
    pub block_width: usize,
    pub block_height: usize,
    pub color_interpretation: String,
}

impl BandReport {
    pub fn new(index: usize, assignment: RoleAssignment, nodata: &NoDataDecision, outcome: BandStatisticsOutcome,
               metadata: &BandMetadata, layout: &RasterLayout) -> Self {
        BandReport {
            index,
            role: assignment.role,
            role_source: assignment.source,
            nodata_value: nodata.value.map(NoDataValue),
            nodata_source: nodata.source,
            declared_nodata: nodata.declared.map(NoDataValue),
            declared_nodata_unused: nodata.declared_unused,
            statistics: outcome.statistics,
            histogram: outcome.histogram,
            valid_pixel_ratio: outcome.valid_pixel_ratio,
            total_pixels: outcome.total_pixels,
            valid_pixels: outcome.valid_pixels,
            nodata_pixels: outcome.nodata_pixels,
            description: metadata.description.clone(),
            wavelength_nm: metadata.wavelength_nm,
            scale: metadata.scale,
            offset: metadata.offset,
            unit: metadata.unit.clone(),
            block_width: layout.block_width,
            block_height: layout.block_height,
            color_interpretation: color_interpretation(layout.photometric, index).to_string(),
        }
    }
}

/// GDAL colour interpretation of band `index` (1-based)
pub fn color_interpretation(photometric_code: Option<u16>, index: usize) -> &'static str {
    match (photometric_code, index) {
        (Some(photometric::RGB), 1) => "Red",
        (Some(photometric::RGB), 2) => "Green",
        (Some(photometric::RGB), 3) => "Blue",
        (Some(photometric::RGB), 4) => "Alpha",
        (Some(photometric::BLACK_IS_ZERO | photometric::WHITE_IS_ZERO), 1) => "Gray",
        (Some(photometric::PALETTE), 1) => "Palette",
        _ => "Undefined",
    }
}

/// Dataset, container structure and georeferencing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialSummary {
    pub dataset: RasterDataset,
    #[serde(flatten)]
    pub structural: StructuralReport,
    pub spatial: SpatialReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedIndices {
    pub named: Vec<ComputedIndex>,
    pub generic: Vec<ComputedIndex>,
    pub spectral: SpectralReport,
}

impl ComputedIndices {
    pub fn new(indices: Vec<ComputedIndex>, spectral: SpectralReport) -> Self {
        let (named, generic) = indices.into_iter().partition(|i| i.formula_kind == FormulaKind::Named);
        ComputedIndices { named, generic, spectral }
    }

    pub fn get(&self, name: &str) -> Option<&ComputedIndex> {
        self.named.iter().chain(&self.generic).find(|i| i.name == name)
    }

    /// Named and generic indices, named first
    pub fn all(&self) -> impl Iterator<Item = &ComputedIndex> {
        self.named.iter().chain(&self.generic)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub run_id: String,
    pub engine_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub quality_score: QualityScore,
    pub skipped_computations: Vec<SkippedComputation>,
    pub stage_timings: Vec<StageTiming>,
    pub config: EngineConfig,
}

/// The complete output of one extraction run
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub spatial_summary: SpatialSummary,
    pub raw_metadata: MetadataReport,
    pub band_details: Vec<BandReport>,
    pub computed_indices: ComputedIndices,
    pub processing_summary: ProcessingSummary,
    pub reconstruction: ReconstructionPackage,
}

impl ExtractionResult {
    pub fn run_id(&self) -> &str {
        &self.processing_summary.run_id
    }

    pub fn quality_score(&self) -> &QualityScore {
        &self.processing_summary.quality_score
    }

    /// 1-based band lookup
    pub fn band(&self, index: usize) -> Option<&BandReport> {
        index.checked_sub(1).and_then(|i| self.band_details.get(i))
    }

    /// Every group as a JSON value, keyed by group name
    pub fn groups(&self) -> EngineResult<BTreeMap<&'static str, Value>> {
        let mut groups = BTreeMap::new();
        groups.insert("spatial_summary", serde_json::to_value(&self.spatial_summary)?);
        groups.insert("raw_metadata", serde_json::to_value(&self.raw_metadata)?);
        groups.insert("band_details", serde_json::to_value(&self.band_details)?);
        groups.insert("computed_indices", serde_json::to_value(&self.computed_indices)?);
        groups.insert("processing_summary", serde_json::to_value(&self.processing_summary)?);
        groups.insert("reconstruction", serde_json::to_value(&self.reconstruction)?);
        Ok(groups)
    }

    /// Write each group to `dir/{group}.json`
    ///
    /// # Returns
    /// The written paths, in group name order
    pub fn write_groups(&self, dir: &Path) -> EngineResult<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for (name, value) in self.groups()? {
            let path = dir.join(format!("{}.json", name));
            fs::write(&path, serde_json::to_string_pretty(&value)?)?;
            written.push(path);
        }
        info!("Wrote {} result groups of run {} to {}", written.len(), self.run_id(), dir.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_interpretation() {
        assert_eq!(color_interpretation(Some(photometric::RGB), 2), "Green");
        assert_eq!(color_interpretation(Some(photometric::BLACK_IS_ZERO), 1), "Gray");
        assert_eq!(color_interpretation(Some(photometric::BLACK_IS_ZERO), 2), "Undefined");
        assert_eq!(color_interpretation(None, 1), "Undefined");
    }
}
