//! CLI command implementations
//!
//! This module contains implementations of the commands supported by the
//! CLI application using the Command pattern.

pub mod command_traits;
pub mod extract_command;
pub mod reconstruct_command;

pub use command_traits::{Command, CommandFactory};
pub use extract_command::ExtractCommand;
pub use reconstruct_command::ReconstructCommand;

use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use crate::api::RasterEngine;
use crate::config::EngineConfig;
use crate::errors::EngineResult;

/// Factory for creating command instances based on CLI arguments
///
/// `--reconstruct` selects the reconstruction command, everything else is
/// an extraction of the positional inputs.
pub struct RasterlensCommandFactory;

impl RasterlensCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        RasterlensCommandFactory
    }

    fn engine(args: &ArgMatches) -> EngineResult<RasterEngine> {
        let config = match args.get_one::<String>("config") {
            Some(path) => EngineConfig::load(&PathBuf::from(path))?,
            None => {
                info!("No configuration file given, using defaults");
                EngineConfig::default()
            }
        };
        Ok(RasterEngine::new(config))
    }
}

impl Default for RasterlensCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandFactory for RasterlensCommandFactory {
    fn create_command(&self, args: &ArgMatches) -> EngineResult<Box<dyn Command>> {
        let engine = Self::engine(args)?;
        if args.get_one::<String>("reconstruct").is_some() {
            Ok(Box::new(ReconstructCommand::new(args, engine)?))
        } else {
            Ok(Box::new(ExtractCommand::new(args, engine)?))
        }
    }
}
