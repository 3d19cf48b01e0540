//! Raster access
//!
//! Opening GeoTIFF rasters, decoding their pixel blocks into windows of
//! `f64` samples, and writing rasters back out.

pub mod pixel_type;
pub mod decode;
pub mod window;
pub mod layout;
mod block_reader;
pub mod dataset;
pub mod handle;
pub mod writer;

pub use pixel_type::PixelType;
pub use window::{Window, WindowData};
pub use layout::RasterLayout;
pub use dataset::RasterDataset;
pub use handle::{FileTimes, OpenOptions, RasterHandle};
pub use writer::{RasterSpec, RasterWriter, WriterOptions};
