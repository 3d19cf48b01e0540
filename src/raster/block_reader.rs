//! Windowed block reading
//!
//! Reads every strip or tile intersecting a window, decodes it and scatters
//! the samples into band-major `f64` buffers. A strip is handled as a tile
//! that spans the full image width, so one code path serves both layouts
//! and both planar configurations.

use log::trace;

use crate::io::byte_order::ByteOrderHandler;
use crate::io::seekable::SeekableReader;
use crate::tiff::errors::TiffResult;

use super::decode::BlockDecoder;
use super::layout::RasterLayout;
use super::window::{Window, WindowData};

/// Reads windows of an image described by a `RasterLayout`
pub struct BlockReader<'a> {
    layout: &'a RasterLayout,
    decoder: &'a BlockDecoder,
    handler: &'a dyn ByteOrderHandler,
}

impl<'a> BlockReader<'a> {
    pub fn new(layout: &'a RasterLayout, decoder: &'a BlockDecoder, handler: &'a dyn ByteOrderHandler) -> Self {
        BlockReader { layout, decoder, handler }
    }

    /// Decode all samples of `window`
    ///
    /// Sparse blocks read as zero.
    pub fn read_window(&self, stream: &mut dyn SeekableReader, window: &Window) -> TiffResult<WindowData> {
        let layout = self.layout;
        let mut data = WindowData::new(*window, layout.bands);
        if window.rows == 0 {
            return Ok(data);
        }

        let first_block_row = window.row / layout.block_height;
        let last_block_row = (window.end_row() - 1) / layout.block_height;

        for block_row in first_block_row..=last_block_row {
            for block_col in 0..layout.blocks_across {
                for plane in 0..layout.planes() {
                    let index = layout.block_index(block_col, block_row, plane);
                    self.read_block(stream, index, block_col, block_row, plane, &mut data)?;
                }
            }
        }

        Ok(data)
    }

    fn read_block(&self, stream: &mut dyn SeekableReader, index: usize, block_col: usize,
                  block_row: usize, plane: usize, data: &mut WindowData) -> TiffResult<()> {
        let layout = self.layout;
        let raw = match layout.read_raw_block(stream, index)? {
            Some(raw) => raw,
            None => {
                trace!("Block {} is sparse", index);
                return Ok(());
            }
        };

        let stored_rows = layout.stored_rows(block_row);
        let decoded = self.decoder.decode(index, &raw, layout.block_width, stored_rows)?;

        let spp = layout.samples_per_block_pixel();
        let bps = layout.pixel_type.bytes();
        let x0 = block_col * layout.block_width;
        let y0 = block_row * layout.block_height;
        let cols = layout.block_width.min(layout.width - x0);
        let window = data.window;

        for r in 0..stored_rows {
            let y = y0 + r;
            if y >= layout.height || !window.contains_row(y) {
                continue;
            }
            let out_row = (y - window.row) * window.width;

            for c in 0..cols {
                let pixel = (r * layout.block_width + c) * spp;
                for s in 0..spp {
                    let band = if layout.planar { plane } else { s };
                    let pos = (pixel + s) * bps;
                    data.bands[band][out_row + x0 + c] =
                        layout.pixel_type.decode(&decoded[pos..pos + bps], self.handler);
                }
            }
        }

        Ok(())
    }
}
