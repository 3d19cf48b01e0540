//! Zstandard blocks (compression code 14)

use std::io::Read;

use log::trace;
use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

/// Level used for written rasters
const WRITE_LEVEL: i32 = 3;

/// Zstandard codec
///
/// Decoding stops after the size implied by the block geometry, so a
/// frame carrying trailing garbage never allocates past one block.
#[derive(Debug, Default)]
pub struct ZstdHandler;

impl CompressionHandler for ZstdHandler {
    fn decompress(&self, data: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| TiffError::GenericError(format!("ZSTD stream error: {}", e)))?;
        let mut block = Vec::with_capacity(expected_len);
        decoder.take(expected_len as u64).read_to_end(&mut block)
            .map_err(|e| TiffError::GenericError(format!("ZSTD decompression error: {}", e)))?;
        trace!("ZSTD: {} -> {} bytes", data.len(), block.len());
        Ok(block)
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        zstd::encode_all(data, WRITE_LEVEL)
            .map_err(|e| TiffError::GenericError(format!("ZSTD compression error: {}", e)))
    }

    fn name(&self) -> &'static str {
        "ZSTD"
    }

    fn code(&self) -> u16 {
        compression::ZSTD
    }
}
