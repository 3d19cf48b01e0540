//! Handler for Deflate compressed data

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

/// Deflate (zlib) compression handler
///
/// Serves both the Adobe code (8) and the pre-standard code (32946); the
/// stream format is identical.
pub struct DeflateHandler {
    code: u16,
    level: u32,
}

impl DeflateHandler {
    /// Handler writing the Adobe Deflate code
    pub fn new() -> Self {
        DeflateHandler { code: compression::DEFLATE, level: 6 }
    }

    /// Handler for the legacy code 32946
    pub fn legacy() -> Self {
        DeflateHandler { code: compression::DEFLATE_OLD, level: 6 }
    }
}

impl Default for DeflateHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionHandler for DeflateHandler {
    fn decompress(&self, data: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::with_capacity(expected_len);
        decoder.read_to_end(&mut decompressed)
            .map_err(|e| TiffError::GenericError(format!("Deflate decompression error: {}", e)))?;

        debug!("Deflate: {} -> {} bytes", data.len(), decompressed.len());
        Ok(decompressed)
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn name(&self) -> &'static str {
        "Deflate"
    }

    fn code(&self) -> u16 {
        self.code
    }
}
