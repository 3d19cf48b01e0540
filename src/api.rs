//! Library entry point
//!
//! `RasterEngine` wraps the extraction pipeline and the reconstructor behind a
//! few calls that take a path and an engine configuration.

use std::path::Path;

use log::{error, info};
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::extractor::{ExtractionPipeline, ExtractionResult, RunRequest};
use crate::reconstruction::{ReconstructionPackage, ReconstructionReport, Reconstructor};

/// Main interface to the rasterlens library
///
/// Holds one configuration and runs extractions and reconstructions with
/// it. The engine keeps no per-run state, so one instance can serve any
/// number of runs, also concurrently.
#[derive(Debug, Clone, Default)]
pub struct RasterEngine {
    pipeline: ExtractionPipeline,
}

impl RasterEngine {
    /// Create an engine with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        RasterEngine { pipeline: ExtractionPipeline::new(config) }
    }

    /// Create an engine from a TOML configuration file
    ///
    /// # Arguments
    /// * `path` - Configuration file; missing keys fall back to defaults
    pub fn from_config_file(path: &Path) -> EngineResult<Self> {
        Ok(Self::new(EngineConfig::load(path)?))
    }

    pub fn config(&self) -> &EngineConfig {
        self.pipeline.config()
    }

    /// Extract everything from one raster
    ///
    /// # Arguments
    /// * `request` - Raster path and run id
    ///
    /// # Returns
    /// The complete result, or the error that cancelled the run
    pub fn extract(&self, request: &RunRequest) -> EngineResult<ExtractionResult> {
        self.pipeline.run(request)
    }

    /// Extract several rasters concurrently
    ///
    /// # Returns
    /// One outcome per request, in request order
    pub fn extract_batch(&self, requests: &[RunRequest]) -> Vec<EngineResult<ExtractionResult>> {
        self.extract_batch_with(requests, |_, _| {})
    }

    /// Like [`extract_batch`](Self::extract_batch), calling `on_done` as each
    /// run finishes
    pub fn extract_batch_with<F>(&self, requests: &[RunRequest], on_done: F) -> Vec<EngineResult<ExtractionResult>>
    where
        F: Fn(&RunRequest, &EngineResult<ExtractionResult>) + Sync,
    {
        info!("Starting batch of {} runs", requests.len());
        let outcomes: Vec<EngineResult<ExtractionResult>> = requests.par_iter()
            .map(|request| {
                let outcome = self.extract(request);
                if let Err(e) = &outcome {
                    error!("Run {} failed: {}", request.run_id, e);
                }
                on_done(request, &outcome);
                outcome
            })
            .collect();
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        info!("Batch finished: {} succeeded, {} failed", outcomes.len() - failed, failed);
        outcomes
    }

    /// Rebuild a raster from a package
    ///
    /// # Arguments
    /// * `package` - Package produced by an extraction
    /// * `output` - Path of the GeoTIFF to write
    pub fn reconstruct(&self, package: &ReconstructionPackage, output: &Path) -> EngineResult<ReconstructionReport> {
        let config = &self.config().reconstruction;
        Reconstructor::new(config.k_neighbors, config.idw_power).reconstruct(package, output)
    }

    /// Rebuild a raster from a package file
    pub fn reconstruct_file(&self, package: &Path, output: &Path) -> EngineResult<ReconstructionReport> {
        let package = ReconstructionPackage::load(package)?;
        self.reconstruct(&package, output)
    }
}
