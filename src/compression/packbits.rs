//! Handler for PackBits compressed data
//!
//! Byte-oriented run-length encoding: a signed header byte `n` is followed
//! by `n + 1` literal bytes when `n >= 0`, or by one byte repeated
//! `1 - n` times when `-127 <= n <= -1`. `-128` is a no-op.

use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

/// PackBits compression handler (compression code 32773)
pub struct PackBitsHandler;

impl CompressionHandler for PackBitsHandler {
    fn decompress(&self, data: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
        let mut out = Vec::with_capacity(expected_len);
        let mut i = 0;

        while i < data.len() && (expected_len == 0 || out.len() < expected_len) {
            let header = data[i] as i8;
            i += 1;

            if header >= 0 {
                let count = header as usize + 1;
                let literal = data.get(i..i + count).ok_or_else(|| TiffError::GenericError(
                    "PackBits literal run past end of data".to_string()))?;
                out.extend_from_slice(literal);
                i += count;
            } else if header != -128 {
                let count = (1 - header as isize) as usize;
                let byte = *data.get(i).ok_or_else(|| TiffError::GenericError(
                    "PackBits repeat run past end of data".to_string()))?;
                out.resize(out.len() + count, byte);
                i += 1;
            }
        }

        if expected_len > 0 {
            out.truncate(expected_len);
        }
        Ok(out)
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() + data.len() / 128 + 1);
        let mut i = 0;

        while i < data.len() {
            let mut run = 1;
            while i + run < data.len() && run < 128 && data[i + run] == data[i] {
                run += 1;
            }

            if run >= 2 {
                out.push((1 - run as isize) as i8 as u8);
                out.push(data[i]);
                i += run;
                continue;
            }

            let start = i;
            while i < data.len() && i - start < 128 {
                if i + 1 < data.len() && data[i + 1] == data[i] {
                    break;
                }
                i += 1;
            }
            if i == start {
                i += 1;
            }
            out.push((i - start - 1) as u8);
            out.extend_from_slice(&data[start..i]);
        }

        Ok(out)
    }

    fn name(&self) -> &'static str {
        "PackBits"
    }

    fn code(&self) -> u16 {
        compression::PACKBITS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_reference_sequence() {
        // Example stream from the TIFF 6.0 documentation
        let packed = [0xFEu8, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22,
                      0xF7, 0xAA];
        let expected = [0xAAu8, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00,
                        0x2A, 0x22, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA];
        assert_eq!(PackBitsHandler.decompress(&packed, expected.len()).unwrap(), expected.to_vec());
    }

    #[test]
    fn test_mixed_runs() {
        let mut data = vec![7u8; 300];
        data.extend((0..50u8).collect::<Vec<_>>());
        let packed = PackBitsHandler.compress(&data).unwrap();
        assert_eq!(PackBitsHandler.decompress(&packed, data.len()).unwrap(), data);
    }
}
