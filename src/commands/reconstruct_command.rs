//! Reconstruction command
//!
//! Rebuilds a GeoTIFF from a reconstruction package written by an
//! earlier extraction.

use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::api::RasterEngine;
use crate::commands::command_traits::Command;
use crate::errors::{EngineResult, ExtractionError};

/// Command for rebuilding a raster from a package
pub struct ReconstructCommand {
    package: PathBuf,
    output: PathBuf,
    engine: RasterEngine,
}

impl ReconstructCommand {
    /// Create a new reconstruct command
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    /// * `engine` - Engine configured from `--config`
    pub fn new(args: &ArgMatches, engine: RasterEngine) -> EngineResult<Self> {
        let package = args.get_one::<String>("reconstruct")
            .map(PathBuf::from)
            .ok_or_else(|| ExtractionError::Config("missing reconstruction package".to_string()))?;
        let output = args.get_one::<String>("output")
            .map(PathBuf::from)
            .ok_or_else(|| ExtractionError::Config(
                "--output is required with --reconstruct".to_string()))?;
        info!("Reconstructing {} into {}", package.display(), output.display());
        Ok(ReconstructCommand { package, output, engine })
    }
}

impl Command for ReconstructCommand {
    fn execute(&self) -> EngineResult<()> {
        let report = self.engine.reconstruct_file(&self.package, &self.output)?;
        println!("Reconstructed {}x{} raster with {} bands from {} samples into {}",
                 report.width, report.height, report.bands, report.samples_used, report.output_path);
        if !report.filled_bands.is_empty() {
            println!("Bands without samples: {:?}", report.filled_bands);
        }
        Ok(())
    }
}
