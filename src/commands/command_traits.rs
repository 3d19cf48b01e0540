//! Command and factory traits for the CLI

use clap::ArgMatches;

use crate::errors::EngineResult;

/// One CLI operation, built from parsed arguments and run once
pub trait Command {
    /// Run the operation; the error is reported by the binary
    fn execute(&self) -> EngineResult<()>;
}

/// Chooses and builds the command for a set of arguments
pub trait CommandFactory {
    /// # Arguments
    /// * `args` - Parsed CLI arguments
    ///
    /// # Returns
    /// The command to run, or a configuration error
    fn create_command(&self, args: &ArgMatches) -> EngineResult<Box<dyn Command>>;
}
