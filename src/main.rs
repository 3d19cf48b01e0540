//! rasterlens command line

use clap::{Arg, Command as ClapCommand, ArgAction};
use env_logger::Env;
use log::{error, LevelFilter};
use std::path::Path;
use std::process;

use rasterlens::utils::logger::Logger;
use rasterlens::commands::{CommandFactory, RasterlensCommandFactory};

fn main() {
    let matches = ClapCommand::new("rasterlens")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Maurice Schilpp")
        .about("Extract structure, statistics, spectral indices and a reconstruction package from GeoTIFF rasters")
        .arg(
            Arg::new("inputs")
                .help("Input GeoTIFF file(s); several files run as a batch")
                .num_args(1..)
                .required_unless_present("reconstruct")
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Output directory for extraction results, or output GeoTIFF with --reconstruct")
                .value_name("PATH")
                .required(false),
        )
        .arg(
            Arg::new("run-id")
                .long("run-id")
                .help("Run id; prefixes the file stem in a batch")
                .value_name("ID")
                .required(false),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML engine configuration")
                .value_name("FILE")
                .required(false),
        )
        .arg(
            Arg::new("reconstruct")
                .long("reconstruct")
                .help("Rebuild a raster from this reconstruction package")
                .value_name("PACKAGE")
                .conflicts_with("inputs")
                .required(false),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Write the log to this file instead of stderr")
                .value_name("FILE")
                .required(false),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") { LevelFilter::Debug } else { LevelFilter::Info };
    match matches.get_one::<String>("log-file") {
        Some(log_file) => {
            if let Err(e) = Logger::init_global_logger(Path::new(log_file), level) {
                eprintln!("Error setting up logger: {}", e);
                process::exit(1);
            }
        }
        None => {
            let default = level.as_str().to_ascii_lowercase();
            env_logger::Builder::from_env(Env::default().default_filter_or(default)).init();
        }
    }

    let factory = RasterlensCommandFactory::new();

    let command_result = factory.create_command(&matches);
    match command_result {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error ({}): {}", e.kind(), e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
}
