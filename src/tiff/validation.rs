//! TIFF validation utilities
//!
//! Validation functions run while parsing potentially malformed files:
//! header checks, offset bounds and sanity ranges for image structure
//! values. Each returns a `TiffError` describing the first violation.

use log::{debug, error, warn};
use std::io::SeekFrom;

use crate::io::seekable::SeekableReader;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::io::byte_order::ByteOrderHandler;
use crate::tiff::constants::header;

/// Validates an IFD offset to ensure it's within the file
///
/// # Arguments
/// * `offset` - The offset to validate
/// * `file_size` - The file size for validation
pub fn validate_ifd_offset(offset: u64, file_size: u64) -> TiffResult<()> {
    if offset >= file_size || offset < 8 {
        return Err(TiffError::GenericError(format!(
            "Invalid IFD offset: {} (file size: {})",
            offset, file_size
        )));
    }

    Ok(())
}

/// Validates that a data block (strip or tile) lies entirely inside the file
///
/// # Arguments
/// * `index` - Block index, for the error message
/// * `offset` - Block start offset
/// * `length` - Block byte count
/// * `file_size` - Total file size
pub fn validate_block_range(index: usize, offset: u64, length: u64, file_size: u64) -> TiffResult<()> {
    let end = offset.checked_add(length);
    match end {
        Some(end) if end <= file_size => Ok(()),
        _ => Err(TiffError::GenericError(format!(
            "Block {} at offset {} with {} bytes runs past end of file ({} bytes)",
            index, offset, length, file_size
        ))),
    }
}

/// Gets the file size for validation purposes
///
/// # Arguments
/// * `reader` - The seekable reader to use
///
/// # Returns
/// The file size or u64::MAX if it couldn't be determined
pub fn get_file_size(reader: &mut dyn SeekableReader) -> TiffResult<u64> {
    let current_position = reader.stream_position()?;
    let file_size = match reader.seek(SeekFrom::End(0)) {
        Ok(size) => size,
        Err(e) => {
            warn!("Could not determine file size: {}", e);
            u64::MAX
        }
    };
    reader.seek(SeekFrom::Start(current_position))?;

    Ok(file_size)
}

/// Validates the BigTIFF header
///
/// After the version number (43) BigTIFF stores the offset size, which
/// must be 8, followed by a reserved zero.
///
/// # Arguments
/// * `reader` - The seekable reader to use
/// * `byte_order_handler` - Handler for the file's byte order
pub fn validate_bigtiff_header(
    reader: &mut dyn SeekableReader,
    byte_order_handler: &dyn ByteOrderHandler
) -> TiffResult<()> {
    let offset_size = byte_order_handler.read_u16(reader)?;
    let zeros = byte_order_handler.read_u16(reader)?;

    debug!("BigTIFF offset size: {}, reserved: {}", offset_size, zeros);

    if offset_size != header::BIGTIFF_OFFSET_SIZE || zeros != 0 {
        error!("Invalid BigTIFF header: offset_size={}, zeros={}", offset_size, zeros);
        return Err(TiffError::InvalidBigTIFFHeader);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_range() {
        assert!(validate_block_range(0, 8, 100, 108).is_ok());
        assert!(validate_block_range(1, 8, 101, 108).is_err());
        assert!(validate_block_range(2, u64::MAX, 2, 108).is_err());
    }

    #[test]
    fn test_ifd_offset_bounds() {
        assert!(validate_ifd_offset(4, 100).is_err());
        assert!(validate_ifd_offset(8, 100).is_ok());
        assert!(validate_ifd_offset(100, 100).is_err());
    }
}
