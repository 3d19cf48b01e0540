//! Block layout of an image
//!
//! Collects everything needed to locate and decode pixel blocks from the
//! main IFD: dimensions, sample layout, strip or tile geometry and the
//! block offset tables.

use std::io::SeekFrom;

use log::{debug, warn};

use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{compression, planar_config, predictor, sample_format, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;
use crate::tiff::validation;

use super::pixel_type::PixelType;

/// Strip or tile organisation of the main image
#[derive(Debug, Clone)]
pub struct RasterLayout {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub pixel_type: PixelType,
    /// Bands stored in separate planes (PlanarConfiguration = 2)
    pub planar: bool,
    pub compression: u64,
    pub predictor: u16,
    pub photometric: Option<u16>,
    pub tiled: bool,
    /// Block width; the image width for strips
    pub block_width: usize,
    /// Tile height or rows per strip
    pub block_height: usize,
    pub blocks_across: usize,
    pub blocks_down: usize,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub file_size: u64,
}

impl RasterLayout {
    /// Read the layout of `ifd`
    ///
    /// # Arguments
    /// * `reader` - TIFF reader that parsed the file
    /// * `stream` - Stream to read the offset tables from
    /// * `ifd` - Image directory (normally the first one)
    ///
    /// # Returns
    /// The layout, or an error for unsupported sample layouts and
    /// inconsistent block tables
    pub fn from_ifd(reader: &TiffReader, stream: &mut dyn SeekableReader, ifd: &IFD) -> TiffResult<Self> {
        let (width, height) = ifd.get_dimensions().ok_or(TiffError::MissingDimensions)?;
        let (width, height) = (width as usize, height as usize);
        let bands = ifd.get_samples_per_pixel().max(1) as usize;

        let bits = Self::uniform_values(reader, stream, ifd, tags::BITS_PER_SAMPLE, 1, "bit depths")?;
        let format = Self::uniform_values(reader, stream, ifd, tags::SAMPLE_FORMAT,
                                          sample_format::UNSIGNED as u64, "sample formats")?;
        let pixel_type = PixelType::from_tiff(bits as u16, format as u16)?;

        let planar = ifd.get_tag_value(tags::PLANAR_CONFIGURATION)
            .map(|v| v as u16 == planar_config::PLANAR)
            .unwrap_or(false);
        let compression = ifd.get_tag_value(tags::COMPRESSION).unwrap_or(compression::NONE as u64);
        let predictor = ifd.get_tag_value(tags::PREDICTOR).map(|v| v as u16).unwrap_or(predictor::NONE);
        let photometric = ifd.get_tag_value(tags::PHOTOMETRIC_INTERPRETATION).map(|v| v as u16);

        let tiled = ifd.is_tiled();
        let (block_width, block_height, offset_tag, count_tag) = if tiled {
            let tw = ifd.get_tag_value(tags::TILE_WIDTH).unwrap_or(0) as usize;
            let th = ifd.get_tag_value(tags::TILE_LENGTH).unwrap_or(0) as usize;
            if tw == 0 || th == 0 {
                return Err(TiffError::GenericError(format!("Invalid tile size {}x{}", tw, th)));
            }
            (tw, th, tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS)
        } else {
            let rows = ifd.get_tag_value(tags::ROWS_PER_STRIP)
                .map(|v| v as usize)
                .filter(|&v| v > 0)
                .unwrap_or(height)
                .min(height.max(1));
            (width, rows, tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
        };

        let blocks_across = width.div_ceil(block_width.max(1));
        let blocks_down = height.div_ceil(block_height.max(1));

        let offsets = reader.read_tag_values(stream, ifd, offset_tag)?;
        let byte_counts = if ifd.has_tag(count_tag) {
            reader.read_tag_values(stream, ifd, count_tag)?
        } else {
            warn!("Missing block byte counts; treating the image as uncompressed");
            let bytes = (block_width * block_height * pixel_type.bytes()
                * if planar { 1 } else { bands }) as u64;
            vec![bytes; offsets.len()]
        };

        let file_size = validation::get_file_size(stream)?;

        let layout = RasterLayout {
            width,
            height,
            bands,
            pixel_type,
            planar,
            compression,
            predictor,
            photometric,
            tiled,
            block_width,
            block_height,
            blocks_across,
            blocks_down,
            offsets,
            byte_counts,
            file_size,
        };

        let expected = layout.block_count();
        if layout.offsets.len() < expected || layout.byte_counts.len() < expected {
            return Err(TiffError::GenericError(format!(
                "Expected {} blocks, found {} offsets and {} byte counts",
                expected, layout.offsets.len(), layout.byte_counts.len())));
        }

        debug!("Layout: {}x{}x{} {} {} blocks {}x{} ({} x {}), compression {}, predictor {}",
               width, height, bands, pixel_type, if tiled { "tiled" } else { "striped" },
               block_width, block_height, blocks_across, blocks_down, compression, predictor);

        Ok(layout)
    }

    /// Read a per-sample tag whose values must all be equal
    fn uniform_values(reader: &TiffReader, stream: &mut dyn SeekableReader, ifd: &IFD,
                      tag: u16, default: u64, what: &str) -> TiffResult<u64> {
        if !ifd.has_tag(tag) {
            return Ok(default);
        }
        let values = reader.read_tag_values(stream, ifd, tag)?;
        let first = values.first().copied().unwrap_or(default);
        if values.iter().any(|&v| v != first) {
            let bits = ifd.get_tag_value(tags::BITS_PER_SAMPLE).unwrap_or(0) as u16;
            let format = ifd.get_tag_value(tags::SAMPLE_FORMAT).unwrap_or(1) as u16;
            return Err(TiffError::UnsupportedSampleLayout {
                bits,
                sample_format: format,
                reason: format!("mixed {} across bands: {:?}", what, values),
            });
        }
        Ok(first)
    }

    /// Blocks in one plane
    pub fn blocks_per_plane(&self) -> usize {
        self.blocks_across * self.blocks_down
    }

    /// Total blocks in the image
    pub fn block_count(&self) -> usize {
        if self.planar {
            self.blocks_per_plane() * self.bands
        } else {
            self.blocks_per_plane()
        }
    }

    /// Samples per pixel inside one block
    pub fn samples_per_block_pixel(&self) -> usize {
        if self.planar { 1 } else { self.bands }
    }

    /// Index of the block at (`block_col`, `block_row`) for `plane`
    ///
    /// `plane` is the 0-based band for planar images and ignored otherwise.
    pub fn block_index(&self, block_col: usize, block_row: usize, plane: usize) -> usize {
        let index = block_row * self.blocks_across + block_col;
        if self.planar {
            plane * self.blocks_per_plane() + index
        } else {
            index
        }
    }

    /// Rows of data stored in block row `block_row`
    ///
    /// Tiles always hold a full tile; the last strip may be shorter.
    pub fn stored_rows(&self, block_row: usize) -> usize {
        if self.tiled {
            self.block_height
        } else {
            self.block_height.min(self.height - block_row * self.block_height)
        }
    }

    /// Planes to visit for every block position
    pub fn planes(&self) -> usize {
        if self.planar { self.bands } else { 1 }
    }

    /// "PIXEL" or "BAND" in GDAL's interleave vocabulary
    pub fn interleave(&self) -> &'static str {
        if self.planar && self.bands > 1 { "BAND" } else { "PIXEL" }
    }

    /// Read the raw (still compressed) bytes of block `index`
    ///
    /// Sparse blocks (offset or byte count of zero) return `None`.
    pub fn read_raw_block(&self, stream: &mut dyn SeekableReader, index: usize) -> TiffResult<Option<Vec<u8>>> {
        let offset = self.offsets[index];
        let length = self.byte_counts[index];
        if offset == 0 || length == 0 {
            return Ok(None);
        }
        validation::validate_block_range(index, offset, length, self.file_size)?;

        stream.seek(SeekFrom::Start(offset))?;
        let mut raw = vec![0u8; length as usize];
        stream.read_exact(&mut raw)?;
        Ok(Some(raw))
    }
}
