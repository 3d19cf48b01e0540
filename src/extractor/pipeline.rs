//! Extraction pipeline
//!
//! Runs the stages of one extraction in order over a single raster handle:
//!
//! 1. open, structural, spatial and metadata extraction
//! 2. a sampling pass feeding NoData detection, then role detection
//! 3. the two statistics passes
//! 4. one shared pass for the index calculator and the spectral analyzer
//! 5. quality scoring and the reconstruction sampling pass
//!
//! Local failures are recorded in the run's skip list. Only an unreadable
//! raster, an unsupported pixel type or an exhausted budget stop the run,
//! and then no partial result is returned.

use chrono::Utc;
use log::{debug, info};

use crate::config::EngineConfig;
use crate::errors::{EngineResult, ExtractionError};
use crate::raster::RasterHandle;
use crate::reconstruction::{BandSummary, PackageSource, ReconstructionPackager, SourceFile};
use crate::tiff::constants::photometric;

use super::context::{RunContext, RunRequest};
use super::indices::IndexPlan;
use super::metadata::{BandMetadata, MetadataAggregator};
use super::nodata::{NoDataDecision, NoDataDetector};
use super::quality::{BasicFacts, QualityInputs, QualityScorer};
use super::result::{BandReport, ComputedIndices, ExtractionResult, ProcessingSummary, SpatialSummary, ENGINE_VERSION};
use super::roles::{BandRole, RoleDetector, RoleMap};
use super::sampling::BandSampler;
use super::spatial::SpatialExtractor;
use super::spectral::{SpectralAnalyzer, SpectralBand};
use super::statistics::StatisticsEngine;
use super::structural::StructuralExtractor;

/// Runs complete extractions with one configuration
#[derive(Debug, Clone, Default)]
pub struct ExtractionPipeline {
    config: EngineConfig,
}

impl ExtractionPipeline {
    pub fn new(config: EngineConfig) -> Self {
        ExtractionPipeline { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract everything from the raster of `request`
    ///
    /// # Arguments
    /// * `request` - Raster path and run id
    ///
    /// # Returns
    /// The complete result, or the error that cancelled the run
    pub fn run(&self, request: &RunRequest) -> EngineResult<ExtractionResult> {
        let config = &self.config;
        let mut ctx = RunContext::new(&request.run_id, config.clone());
        info!("Run {}: extracting {}", ctx.run_id, request.path.display());

        let mut handle = ctx.time_stage("open", |ctx| {
            RasterHandle::open(&request.path, &ctx.open_options())
                .map_err(|e| ExtractionError::from_tiff(e, &request.path, &ctx.run_id, "open", false))
        })?;
        let band_count = handle.band_count();
        let pixel_type = handle.pixel_type();

        let structural = ctx.time_stage("structural", |_| Ok(StructuralExtractor::extract(&mut handle)))?;
        let spatial = ctx.time_stage("spatial", |_| Ok(SpatialExtractor::extract(&handle)))?;
        let metadata = ctx.time_stage("metadata", |_| Ok(MetadataAggregator::collect(&mut handle)))?;
        let band_metadata: Vec<BandMetadata> = (1..=band_count)
            .map(|i| metadata.band(i).cloned().unwrap_or_default())
            .collect();

        let samples = ctx.time_stage("sampling", |ctx| {
            let nodata_config = &config.nodata;
            let mut sampler = BandSampler::new(band_count, nodata_config.sample_size, nodata_config.seed);
            let reservoir_bytes = (band_count * nodata_config.sample_size * std::mem::size_of::<f64>()) as u64;
            ctx.scan(&mut handle, "sampling", reservoir_bytes, |data| {
                sampler.observe(data);
                Ok(())
            })?;
            Ok(sampler.finish())
        })?;

        let decisions: Vec<NoDataDecision> = ctx.time_stage("nodata", |_| {
            let declared = handle.declared_nodata();
            let detector = NoDataDetector::new(&config.nodata);
            Ok(samples.iter().map(|sample| detector.detect(sample, declared, pixel_type)).collect())
        })?;
        let nodata: Vec<Option<f64>> = decisions.iter().map(|d| d.value).collect();

        let assignments = ctx.time_stage("roles", |_| {
            let rgb = handle.layout().photometric == Some(photometric::RGB);
            Ok(RoleDetector::new(band_count, rgb, metadata.sensor()).assign_all(&band_metadata))
        })?;
        let roles: Vec<BandRole> = assignments.iter().map(|a| a.role).collect();
        let role_map = RoleMap::from_roles(&roles);

        let outcomes = ctx.time_stage("statistics", |ctx| {
            StatisticsEngine::new(&config.statistics).run(ctx, &mut handle, &nodata, &samples)
        })?;
        drop(samples);

        let (indices, spectral) = ctx.time_stage("indices", |ctx| {
            let valid: Vec<u64> = outcomes.iter().map(|o| o.valid_pixels).collect();
            let mut plan = IndexPlan::new(&config.indices, &role_map, &nodata, &valid);
            let bands = (0..band_count)
                .map(|i| SpectralBand {
                    role: roles[i],
                    nodata: nodata[i],
                    statistics: outcomes[i].statistics.clone(),
                    wavelength_nm: band_metadata[i].wavelength_nm,
                })
                .collect();
            let mut analyzer = SpectralAnalyzer::new(&config.spectral, bands);

            if !plan.is_empty() || analyzer.needs_pixels() {
                debug!("Index pass: {} planned indices", plan.len());
                ctx.scan(&mut handle, "indices", 0, |data| {
                    plan.observe(data);
                    analyzer.observe(data);
                    Ok(())
                })?;
            }
            let (indices, index_skips) = plan.finish();
            let (spectral, spectral_skips) = analyzer.finish();
            ctx.record(index_skips);
            ctx.record(spectral_skips);
            Ok((indices, spectral))
        })?;

        let dataset = handle.dataset().clone();
        let quality_score = ctx.time_stage("quality", |_| {
            let inputs = QualityInputs {
                basic: BasicFacts {
                    width: dataset.width,
                    height: dataset.height,
                    band_count: dataset.band_count,
                    pixel_type: Some(dataset.pixel_type.name()),
                    driver: &dataset.driver_name,
                    file_size_bytes: dataset.file_size_bytes,
                },
                spatial: &spatial,
                bands: &outcomes,
                metadata: &metadata,
                indices: &indices,
                has_correlation: spectral.has_correlation(),
            };
            Ok(QualityScorer::new(&config.quality).score(&inputs))
        })?;

        let file = SourceFile {
            original_filename: handle.path().file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            original_size_bytes: dataset.file_size_bytes,
            driver: dataset.driver_name.clone(),
        };
        let reconstruction = ctx.time_stage("reconstruction", |ctx| {
            let source = PackageSource {
                width: dataset.width,
                height: dataset.height,
                pixel_type,
                geotransform: dataset.geotransform,
                projection_wkt: dataset.projection_wkt.clone(),
                epsg: spatial.epsg(),
                nodata: nodata.clone(),
                roles: roles.clone(),
                summaries: outcomes.iter()
                    .map(|o| o.statistics.as_ref().map(|s| BandSummary { min: s.min, max: s.max, mean: s.mean }))
                    .collect(),
                valid_pixels: outcomes.iter().map(|o| o.valid_pixels).max().unwrap_or(0),
                file,
            };
            ReconstructionPackager::new(&config.reconstruction).package(ctx, &mut handle, source)
        })?;

        let layout = handle.layout();
        let band_details: Vec<BandReport> = outcomes.into_iter().enumerate()
            .map(|(i, outcome)| BandReport::new(i + 1, assignments[i], &decisions[i], outcome,
                                                &band_metadata[i], layout))
            .collect();

        let finished_at = Utc::now();
        let processing_summary = ProcessingSummary {
            run_id: ctx.run_id.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            started_at: ctx.started_at,
            finished_at,
            duration_secs: ctx.budget().elapsed().as_secs_f64(),
            quality_score,
            skipped_computations: ctx.skipped().to_vec(),
            stage_timings: ctx.timings().to_vec(),
            config: config.clone(),
        };
        info!("Run {}: finished in {:.2}s, quality {:.1}, {} skipped computations",
              ctx.run_id, processing_summary.duration_secs, processing_summary.quality_score.total,
              processing_summary.skipped_computations.len());

        Ok(ExtractionResult {
            spatial_summary: SpatialSummary { dataset, structural, spatial },
            raw_metadata: metadata,
            band_details,
            computed_indices: ComputedIndices::new(indices, spectral),
            processing_summary,
            reconstruction,
        })
    }
}
