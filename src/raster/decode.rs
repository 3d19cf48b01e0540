//! Block decoding
//!
//! Turns the raw bytes of one strip or tile into decoded sample bytes:
//! decompression first, then the inverse of the TIFF predictor. The
//! output stays in the file's byte order so samples can be read with the
//! file's `ByteOrderHandler`. Encoding helpers do the reverse for the
//! little-endian files the writer produces.

use log::trace;

use crate::compression::{CompressionFactory, CompressionHandler};
use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::tiff::constants::predictor;
use crate::tiff::errors::{TiffError, TiffResult};

/// Decoder shared by all blocks of one image
pub struct BlockDecoder {
    compression: Box<dyn CompressionHandler>,
    predictor: u16,
    bytes_per_sample: usize,
    /// Samples per pixel inside one block (1 for planar images)
    samples_per_pixel: usize,
    byte_order: ByteOrder,
}

impl BlockDecoder {
    /// Build a decoder for the image's compression and predictor
    pub fn new(compression: u64, predictor_code: u16, bytes_per_sample: usize,
               samples_per_pixel: usize, byte_order: ByteOrder) -> TiffResult<Self> {
        let handler = CompressionFactory::create_handler(compression)?;

        match predictor_code {
            predictor::NONE | predictor::HORIZONTAL_DIFFERENCING | predictor::FLOATING_POINT => {}
            other => return Err(TiffError::GenericError(format!("Unsupported predictor {}", other))),
        }
        if predictor_code == predictor::HORIZONTAL_DIFFERENCING && bytes_per_sample == 8 {
            return Err(TiffError::GenericError(
                "Horizontal differencing on 64-bit samples is not supported".to_string()));
        }

        Ok(BlockDecoder {
            compression: handler,
            predictor: predictor_code,
            bytes_per_sample,
            samples_per_pixel,
            byte_order,
        })
    }

    /// Compression scheme name
    pub fn compression_name(&self) -> &'static str {
        self.compression.name()
    }

    /// Decode one block of `width` x `rows` pixels
    pub fn decode(&self, index: usize, raw: &[u8], width: usize, rows: usize) -> TiffResult<Vec<u8>> {
        let expected = width * rows * self.samples_per_pixel * self.bytes_per_sample;
        let mut data = self.compression.decompress(raw, expected)
            .map_err(|e| TiffError::CorruptBlock { index, reason: e.to_string() })?;

        if data.len() < expected {
            return Err(TiffError::CorruptBlock {
                index,
                reason: format!("decoded {} bytes, expected {}", data.len(), expected),
            });
        }
        data.truncate(expected);
        trace!("Block {}: {} -> {} bytes ({})", index, raw.len(), data.len(), self.compression.name());

        let handler = self.byte_order.create_handler();
        match self.predictor {
            predictor::HORIZONTAL_DIFFERENCING => undo_horizontal_predictor(
                &mut data, width, self.samples_per_pixel, self.bytes_per_sample, handler.as_ref()),
            predictor::FLOATING_POINT => undo_float_predictor(
                &mut data, width, self.samples_per_pixel, self.bytes_per_sample, self.byte_order),
            _ => {}
        }

        Ok(data)
    }
}

/// Undo horizontal differencing (predictor 2) in place
///
/// Each sample is stored as the difference to the same channel of the
/// previous pixel in the row; sums wrap in the sample's width.
pub fn undo_horizontal_predictor(data: &mut [u8], width: usize, samples_per_pixel: usize,
                                 bytes_per_sample: usize, handler: &dyn ByteOrderHandler) {
    let row_len = width * samples_per_pixel * bytes_per_sample;
    if row_len == 0 {
        return;
    }
    let stride = samples_per_pixel * bytes_per_sample;

    for row in data.chunks_exact_mut(row_len) {
        for pos in (stride..row_len).step_by(bytes_per_sample) {
            let prev = pos - stride;
            match bytes_per_sample {
                1 => row[pos] = row[pos].wrapping_add(row[prev]),
                2 => {
                    let value = handler.u16_from(&row[pos..]).wrapping_add(handler.u16_from(&row[prev..]));
                    handler.u16_into(&mut row[pos..], value);
                }
                4 => {
                    let value = handler.u32_from(&row[pos..]).wrapping_add(handler.u32_from(&row[prev..]));
                    handler.u32_into(&mut row[pos..], value);
                }
                _ => {
                    let value = handler.u64_from(&row[pos..]).wrapping_add(handler.u64_from(&row[prev..]));
                    handler.u64_into(&mut row[pos..], value);
                }
            }
        }
    }
}

/// Apply horizontal differencing to little-endian rows in place
pub fn apply_horizontal_predictor(data: &mut [u8], width: usize, samples_per_pixel: usize,
                                  bytes_per_sample: usize) {
    let row_len = width * samples_per_pixel * bytes_per_sample;
    if row_len == 0 {
        return;
    }
    let stride = samples_per_pixel * bytes_per_sample;
    let handler = ByteOrder::LittleEndian.create_handler();

    for row in data.chunks_exact_mut(row_len) {
        // Right to left so every difference uses the original neighbour
        for pos in (stride..row_len).step_by(bytes_per_sample).rev() {
            let prev = pos - stride;
            match bytes_per_sample {
                1 => row[pos] = row[pos].wrapping_sub(row[prev]),
                2 => {
                    let value = handler.u16_from(&row[pos..]).wrapping_sub(handler.u16_from(&row[prev..]));
                    handler.u16_into(&mut row[pos..], value);
                }
                4 => {
                    let value = handler.u32_from(&row[pos..]).wrapping_sub(handler.u32_from(&row[prev..]));
                    handler.u32_into(&mut row[pos..], value);
                }
                _ => {
                    let value = handler.u64_from(&row[pos..]).wrapping_sub(handler.u64_from(&row[prev..]));
                    handler.u64_into(&mut row[pos..], value);
                }
            }
        }
    }
}

/// Undo the floating point predictor (predictor 3) in place
///
/// Rows hold the sample bytes split into planes, most significant byte
/// first, then byte-wise differenced. The result is written in
/// `byte_order`.
pub fn undo_float_predictor(data: &mut [u8], width: usize, samples_per_pixel: usize,
                            bytes_per_sample: usize, byte_order: ByteOrder) {
    let samples = width * samples_per_pixel;
    let row_len = samples * bytes_per_sample;
    if row_len == 0 {
        return;
    }
    let mut planes = vec![0u8; row_len];

    for row in data.chunks_exact_mut(row_len) {
        for i in samples_per_pixel..row_len {
            row[i] = row[i].wrapping_add(row[i - samples_per_pixel]);
        }
        planes.copy_from_slice(row);

        for sample in 0..samples {
            for byte in 0..bytes_per_sample {
                let value = planes[byte * samples + sample];
                let target = match byte_order {
                    ByteOrder::BigEndian => byte,
                    ByteOrder::LittleEndian => bytes_per_sample - 1 - byte,
                };
                row[sample * bytes_per_sample + target] = value;
            }
        }
    }
}

/// Apply the floating point predictor to little-endian rows in place
pub fn apply_float_predictor(data: &mut [u8], width: usize, samples_per_pixel: usize, bytes_per_sample: usize) {
    let samples = width * samples_per_pixel;
    let row_len = samples * bytes_per_sample;
    if row_len == 0 {
        return;
    }
    let mut planes = vec![0u8; row_len];

    for row in data.chunks_exact_mut(row_len) {
        for sample in 0..samples {
            for byte in 0..bytes_per_sample {
                planes[byte * samples + sample] = row[sample * bytes_per_sample + bytes_per_sample - 1 - byte];
            }
        }
        for i in (samples_per_pixel..row_len).rev() {
            planes[i] = planes[i].wrapping_sub(planes[i - samples_per_pixel]);
        }
        row.copy_from_slice(&planes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::byte_order::BigEndianHandler;

    #[test]
    fn test_horizontal_predictor_u16_big_endian() {
        // Row 10, +5, +5 stored big-endian
        let mut data = vec![0, 10, 0, 5, 0, 5];
        undo_horizontal_predictor(&mut data, 3, 1, 2, &BigEndianHandler);
        assert_eq!(data, vec![0, 10, 0, 15, 0, 20]);
    }

    #[test]
    fn test_horizontal_predictor_interleaved_bytes() {
        let original: Vec<u8> = vec![10, 200, 12, 190, 15, 250, 9, 5];
        let mut data = original.clone();
        apply_horizontal_predictor(&mut data, 4, 2, 1);
        assert_eq!(&data[..4], &[10, 200, 2, 246]);
        undo_horizontal_predictor(&mut data, 4, 2, 1, ByteOrder::LittleEndian.create_handler().as_ref());
        assert_eq!(data, original);
    }

    #[test]
    fn test_float_predictor_restores_little_endian_samples() {
        let values = [1.5f32, -2.25, 1000.0, 0.0, 3.75, 7.0];
        let original: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut data = original.clone();

        apply_float_predictor(&mut data, 3, 1, 4);
        assert_ne!(data, original);
        undo_float_predictor(&mut data, 3, 1, 4, ByteOrder::LittleEndian);
        assert_eq!(data, original);
    }

    #[test]
    fn test_short_block_is_corrupt() {
        let decoder = BlockDecoder::new(1, predictor::NONE, 2, 1, ByteOrder::LittleEndian).unwrap();
        let err = decoder.decode(7, &[0u8; 10], 4, 2).unwrap_err();
        assert!(matches!(err, TiffError::CorruptBlock { index: 7, .. }));
        assert_eq!(decoder.decode(0, &[0u8; 16], 4, 2).unwrap().len(), 16);
    }
}
