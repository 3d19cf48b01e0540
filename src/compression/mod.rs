//! Compression handling for TIFF files
//!
//! Strategy implementations for every compression scheme the raster
//! reader decodes and the writer can produce, selected through
//! `CompressionFactory`.

mod handler;
mod uncompressed;
mod deflate;
mod factory;
mod lzw;
mod packbits;
mod zstd;

pub use handler::CompressionHandler;
pub use uncompressed::UncompressedHandler;
pub use deflate::DeflateHandler;
pub use factory::CompressionFactory;
pub use lzw::LzwHandler;
pub use packbits::PackBitsHandler;
pub use zstd::ZstdHandler;
