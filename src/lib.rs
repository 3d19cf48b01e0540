//! rasterlens
//!
//! GeoTIFF extraction engine: structural, spatial and metadata extraction,
//! NoData and band-role detection, band statistics, spectral indices,
//! quality scoring, and sample-based raster reconstruction.

pub mod io;
pub mod tiff;
pub mod utils;
pub mod compression;
pub mod coordinate;
pub mod raster;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod reconstruction;
pub mod commands;
pub mod api;

pub use crate::api::RasterEngine;

pub use config::EngineConfig;
pub use errors::{EngineResult, ExtractionError, SkippedComputation};
pub use extractor::{ExtractionResult, RunRequest};
pub use raster::{PixelType, RasterHandle, RasterSpec, RasterWriter, WriterOptions};
pub use reconstruction::{ReconstructionPackage, ReconstructionReport};
pub use tiff::TiffReader;
pub use coordinate::{BoundingBox, Point, CoordinateSystem};
