//! Utility modules for common functionality
//!
//! Helpers shared by the TIFF layer, the raster layer and the CLI.

pub mod logger;
pub mod progress;
pub(crate) mod tiff_utils;
pub mod xml_utils;
pub(crate) mod write_utils;
pub mod tiff_code_translators;
pub mod tag_utils;
