//! Extraction command
//!
//! Runs the extraction pipeline over one or more rasters and writes the
//! result groups of each run into its own directory below the output
//! directory. Several inputs are processed as a batch with a progress bar.

use std::path::PathBuf;

use clap::ArgMatches;
use log::{error, info};

use crate::api::RasterEngine;
use crate::commands::command_traits::Command;
use crate::errors::{EngineResult, ExtractionError};
use crate::extractor::{ExtractionResult, RunRequest};
use crate::utils::progress::ProgressTracker;

/// Command for extracting analysis results from rasters
pub struct ExtractCommand {
    /// Rasters to extract
    inputs: Vec<PathBuf>,
    /// Directory receiving one sub-directory per run
    output_dir: PathBuf,
    /// Run id given on the command line
    run_id: Option<String>,
    engine: RasterEngine,
}

impl ExtractCommand {
    /// Create a new extract command
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    /// * `engine` - Engine configured from `--config`
    ///
    /// # Returns
    /// A new ExtractCommand instance or an error
    pub fn new(args: &ArgMatches, engine: RasterEngine) -> EngineResult<Self> {
        let inputs: Vec<PathBuf> = args.get_many::<String>("inputs")
            .map(|values| values.map(PathBuf::from).collect())
            .unwrap_or_default();
        if inputs.is_empty() {
            return Err(ExtractionError::Config("no input rasters given".to_string()));
        }

        let output_dir = args.get_one::<String>("output")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("rasterlens-output"));
        let run_id = args.get_one::<String>("run-id").cloned();
        info!("Extracting {} raster(s) into {}", inputs.len(), output_dir.display());

        Ok(ExtractCommand { inputs, output_dir, run_id, engine })
    }

    /// Run requests for all inputs
    ///
    /// A single input takes the given run id as is; in a batch it prefixes
    /// the file stem so that every run id stays unique.
    fn requests(&self) -> Vec<RunRequest> {
        if let ([input], Some(run_id)) = (self.inputs.as_slice(), self.run_id.as_ref()) {
            return vec![RunRequest::new(input.clone(), run_id.clone())];
        }
        self.inputs.iter()
            .map(|input| {
                let request = RunRequest::for_path(input.clone());
                match &self.run_id {
                    Some(prefix) => RunRequest::new(input.clone(), format!("{}-{}", prefix, request.run_id)),
                    None => request,
                }
            })
            .collect()
    }

    fn store(&self, result: &ExtractionResult) -> EngineResult<()> {
        let dir = self.output_dir.join(result.run_id());
        let written = result.write_groups(&dir)?;
        let score = result.quality_score();
        println!("{}: quality {:.1}/110, {} bands, {} skipped computations, {} files in {}",
                 result.run_id(), score.total, result.band_details.len(),
                 result.processing_summary.skipped_computations.len(), written.len(), dir.display());
        Ok(())
    }
}

impl Command for ExtractCommand {
    fn execute(&self) -> EngineResult<()> {
        let requests = self.requests();

        if let [request] = requests.as_slice() {
            let result = self.engine.extract(request)?;
            return self.store(&result);
        }

        let progress = ProgressTracker::new(requests.len() as u64, "Extracting rasters");
        let outcomes = self.engine.extract_batch_with(&requests, |request, _| {
            progress.set_message(&request.run_id);
            progress.increment(1);
        });
        progress.finish();

        let mut first_error = None;
        for (request, outcome) in requests.iter().zip(outcomes) {
            match outcome.and_then(|result| self.store(&result)) {
                Ok(()) => {}
                Err(e) => {
                    error!("Run {} on {} failed ({}): {}", request.run_id, request.path.display(), e.kind(), e);
                    eprintln!("{}: {}", request.run_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
