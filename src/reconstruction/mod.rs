//! Reconstruction
//!
//! Packaging a stratified pixel sample of a raster, and rebuilding an
//! approximate GeoTIFF from such a package.

pub mod package;
pub mod packager;
pub mod sample_index;
pub mod rebuild;

pub use package::{BandStorage, BandSummary, CellSize, PixelSample, ReconstructionPackage, SourceFile};
pub use packager::{PackageSource, ReconstructionPackager};
pub use rebuild::{ReconstructionReport, Reconstructor};
