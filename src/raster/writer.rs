//! GeoTIFF raster writer
//!
//! Encodes band-major `f64` pixel buffers into a little-endian GeoTIFF with
//! the requested compression, strip or tile layout, georeferencing, NoData
//! and GDAL metadata. Used by the reconstructor and by tests to produce
//! synthetic rasters.

use std::path::Path;

use log::{debug, info};

use crate::compression::{CompressionFactory, CompressionHandler};
use crate::tiff::builder::TiffBuilder;
use crate::tiff::builders::basic_tags::TiffLayout;
use crate::tiff::builders::geo_tags::GeoKeySpec;
use crate::tiff::constants::{compression, predictor};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::utils::xml_utils::GdalMetadataItem;

use super::decode::{apply_float_predictor, apply_horizontal_predictor};
use super::pixel_type::PixelType;

/// Target size of one strip in bytes before compression
const STRIP_TARGET_BYTES: usize = 64 * 1024;

/// Creation options
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Compression name: none, deflate, lzw, zstd or packbits
    pub compression: String,
    pub tiled: bool,
    /// Tile edge length for tiled output
    pub block_size: usize,
    /// Apply the horizontal (integer) or floating point predictor
    pub predictor: bool,
    pub big_tiff: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            compression: "deflate".to_string(),
            tiled: false,
            block_size: 256,
            predictor: false,
            big_tiff: false,
        }
    }
}

/// Everything written besides the pixels
#[derive(Debug, Clone)]
pub struct RasterSpec {
    pub width: usize,
    pub height: usize,
    pub pixel_type: PixelType,
    pub geotransform: Option<[f64; 6]>,
    pub geokeys: Option<GeoKeySpec>,
    pub nodata: Option<f64>,
    pub metadata: Vec<GdalMetadataItem>,
}

impl RasterSpec {
    /// Plain raster without georeferencing or metadata
    pub fn new(width: usize, height: usize, pixel_type: PixelType) -> Self {
        RasterSpec {
            width,
            height,
            pixel_type,
            geotransform: None,
            geokeys: None,
            nodata: None,
            metadata: Vec::new(),
        }
    }
}

/// Writer producing GeoTIFF files from band buffers
pub struct RasterWriter {
    options: WriterOptions,
}

impl RasterWriter {
    pub fn new(options: WriterOptions) -> Self {
        RasterWriter { options }
    }

    /// Write `bands` (one `width * height` buffer per band) to `path`
    ///
    /// # Returns
    /// An error for empty or mismatched buffers, unknown compression names
    /// or I/O failures
    pub fn write(&self, path: &Path, spec: &RasterSpec, bands: &[Vec<f64>]) -> TiffResult<()> {
        let builder = self.build(spec, bands)?;
        builder.write(path)?;
        info!("Wrote {}x{}x{} {} raster to {}", spec.width, spec.height, bands.len(),
              spec.pixel_type, path.display());
        Ok(())
    }

    /// Encode the raster into a `TiffBuilder` without writing it
    pub fn build(&self, spec: &RasterSpec, bands: &[Vec<f64>]) -> TiffResult<TiffBuilder> {
        let pixels = spec.width * spec.height;
        if bands.is_empty() || pixels == 0 {
            return Err(TiffError::GenericError("Cannot write an empty raster".to_string()));
        }
        if let Some(band) = bands.iter().position(|b| b.len() != pixels) {
            return Err(TiffError::GenericError(format!(
                "Band {} has {} samples, expected {}", band + 1, bands[band].len(), pixels)));
        }

        let handler = CompressionFactory::get_handler_by_name(&self.options.compression)?;
        let predictor_code = match (self.options.predictor, spec.pixel_type) {
            (false, _) => predictor::NONE,
            (true, pt) if pt.is_float() => predictor::FLOATING_POINT,
            (true, PixelType::U8 | PixelType::I8 | PixelType::U16 | PixelType::I16
                | PixelType::U32 | PixelType::I32) => predictor::HORIZONTAL_DIFFERENCING,
            (true, _) => predictor::NONE,
        };

        let mut layout = TiffLayout::new(spec.width as u32, spec.height as u32, bands.len() as u16,
                                         spec.pixel_type.bits(), spec.pixel_type.sample_format());
        layout.compression = handler.code();
        if handler.code() != compression::NONE {
            layout.predictor = predictor_code;
        }

        let mut builder = TiffBuilder::new(self.options.big_tiff);
        let ifd = builder.add_ifd();
        builder.add_layout_tags(ifd, &layout)?;

        let encoder = BlockEncoder { spec, bands, handler: handler.as_ref(), predictor: layout.predictor };
        if self.options.tiled {
            let size = self.options.block_size.max(16);
            let mut tiles = Vec::new();
            for ty in (0..spec.height).step_by(size) {
                for tx in (0..spec.width).step_by(size) {
                    tiles.push(encoder.encode(tx, ty, size, size)?);
                }
            }
            debug!("Encoded {} tiles of {}x{}", tiles.len(), size, size);
            builder.set_tiles(ifd, size as u32, size as u32, tiles)?;
        } else {
            let row_bytes = spec.width * bands.len() * spec.pixel_type.bytes();
            let rows_per_strip = (STRIP_TARGET_BYTES / row_bytes.max(1)).clamp(1, spec.height);
            let mut strips = Vec::new();
            for y in (0..spec.height).step_by(rows_per_strip) {
                let rows = rows_per_strip.min(spec.height - y);
                strips.push(encoder.encode(0, y, spec.width, rows)?);
            }
            debug!("Encoded {} strips of {} rows", strips.len(), rows_per_strip);
            builder.set_strips(ifd, rows_per_strip as u32, strips)?;
        }

        if let Some(gt) = spec.geotransform.as_ref() {
            builder.add_geotransform(ifd, gt)?;
        }
        if let Some(keys) = spec.geokeys.as_ref() {
            builder.add_geokeys(ifd, keys)?;
        }
        if let Some(nodata) = spec.nodata {
            builder.add_nodata_tag(ifd, nodata)?;
        }
        builder.add_gdal_metadata(ifd, &spec.metadata)?;

        Ok(builder)
    }
}

/// Encodes one block of chunky pixels
struct BlockEncoder<'a> {
    spec: &'a RasterSpec,
    bands: &'a [Vec<f64>],
    handler: &'a dyn CompressionHandler,
    predictor: u16,
}

impl BlockEncoder<'_> {
    /// Encode the block with upper-left pixel (`x0`, `y0`)
    ///
    /// Pixels outside the raster (right and bottom tile padding) are
    /// written as zero.
    fn encode(&self, x0: usize, y0: usize, block_width: usize, block_height: usize) -> TiffResult<Vec<u8>> {
        let spec = self.spec;
        let bps = spec.pixel_type.bytes();
        let mut data = Vec::with_capacity(block_width * block_height * self.bands.len() * bps);

        for y in y0..y0 + block_height {
            for x in x0..x0 + block_width {
                for band in self.bands {
                    let value = if x < spec.width && y < spec.height { band[y * spec.width + x] } else { 0.0 };
                    spec.pixel_type.encode_le(value, &mut data);
                }
            }
        }

        match self.predictor {
            predictor::HORIZONTAL_DIFFERENCING =>
                apply_horizontal_predictor(&mut data, block_width, self.bands.len(), bps),
            predictor::FLOATING_POINT =>
                apply_float_predictor(&mut data, block_width, self.bands.len(), bps),
            _ => {}
        }

        self.handler.compress(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_bands() {
        let writer = RasterWriter::new(WriterOptions::default());
        let spec = RasterSpec::new(4, 4, PixelType::U8);
        assert!(writer.build(&spec, &[vec![0.0; 16], vec![0.0; 15]]).is_err());
        assert!(writer.build(&spec, &[]).is_err());
    }

    #[test]
    fn test_unknown_compression_name() {
        let writer = RasterWriter::new(WriterOptions { compression: "jpeg".into(), ..WriterOptions::default() });
        let spec = RasterSpec::new(2, 2, PixelType::U8);
        assert!(writer.build(&spec, &[vec![1.0; 4]]).is_err());
    }
}
