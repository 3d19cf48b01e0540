//! Factory for creating compression handlers

use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;
use super::uncompressed::UncompressedHandler;
use super::deflate::DeflateHandler;
use super::lzw::LzwHandler;
use super::packbits::PackBitsHandler;
use super::zstd::ZstdHandler;

/// Factory for creating compression handlers
pub struct CompressionFactory;

impl CompressionFactory {
    /// Create a compression handler for the given Compression tag value
    pub fn create_handler(code: u64) -> TiffResult<Box<dyn CompressionHandler>> {
        let code = u16::try_from(code).map_err(|_| TiffError::UnsupportedCompression(code))?;

        match code {
            compression::NONE => Ok(Box::new(UncompressedHandler)),
            compression::LZW => Ok(Box::new(LzwHandler)),
            compression::DEFLATE => Ok(Box::new(DeflateHandler::new())),
            compression::DEFLATE_OLD => Ok(Box::new(DeflateHandler::legacy())),
            compression::ZSTD => Ok(Box::new(ZstdHandler)),
            compression::PACKBITS => Ok(Box::new(PackBitsHandler)),
            other => Err(TiffError::UnsupportedCompression(other as u64)),
        }
    }

    /// Get a handler by name, as used in creation options
    pub fn get_handler_by_name(name: &str) -> TiffResult<Box<dyn CompressionHandler>> {
        match name.to_lowercase().as_str() {
            "uncompressed" | "none" => Ok(Box::new(UncompressedHandler)),
            "deflate" | "zip" | "adobe deflate" => Ok(Box::new(DeflateHandler::new())),
            "lzw" => Ok(Box::new(LzwHandler)),
            "zstd" => Ok(Box::new(ZstdHandler)),
            "packbits" => Ok(Box::new(PackBitsHandler)),
            _ => Err(TiffError::GenericError(format!("Unknown compression type: {}", name)))
        }
    }

    /// Whether a Compression tag value can be decoded
    pub fn is_supported(code: u64) -> bool {
        Self::create_handler(code).is_ok()
    }
}
