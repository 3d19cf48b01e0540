//! Raster handle
//!
//! Owns an opened GeoTIFF for the duration of one run: the file stream
//! (wrapped in a `DeadlineReader`), the parsed directory structure, the
//! block layout and decoder, and the georeferencing tags. All pixel and tag
//! access of the extraction stages goes through this type.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::coordinate::CrsDescription;
use crate::io::deadline::DeadlineReader;
use crate::tiff::builders::metadata_tags::parse_nodata;
use crate::tiff::constants::tags;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geo_key_parser::{GeoInfo, GeoKeyParser};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;
use crate::tiff::types::TIFF;
use crate::utils::xml_utils::{parse_gdal_metadata, GdalMetadataItem};

use super::block_reader::BlockReader;
use super::dataset::{RasterDataset, DRIVER_NAME};
use super::decode::BlockDecoder;
use super::layout::RasterLayout;
use super::pixel_type::PixelType;
use super::window::{Window, WindowData};

/// Limits applied to every read of an opened raster
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Absolute deadline after which reads fail with `TimedOut`
    pub deadline: Option<Instant>,
    /// Longest a single read may take
    pub op_timeout: Option<Duration>,
}

/// File system timestamps of the raster file
#[derive(Debug, Clone, Default)]
pub struct FileTimes {
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
}

/// An opened raster
pub struct RasterHandle {
    path: PathBuf,
    stream: DeadlineReader<BufReader<File>>,
    reader: TiffReader,
    tiff: TIFF,
    layout: RasterLayout,
    decoder: BlockDecoder,
    geo: GeoInfo,
    crs: Option<CrsDescription>,
    times: FileTimes,
    dataset: RasterDataset,
}

impl RasterHandle {
    /// Open a raster and read its structure
    ///
    /// # Arguments
    /// * `path` - GeoTIFF file
    /// * `options` - Read deadline and per-read timeout
    ///
    /// # Returns
    /// The handle, or the container-level error that prevented opening
    pub fn open(path: &Path, options: &OpenOptions) -> TiffResult<Self> {
        info!("Opening raster {}", path.display());
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        let mut stream = DeadlineReader::new(BufReader::new(file), options.deadline, options.op_timeout);

        let mut reader = TiffReader::new();
        let tiff = reader.read(&mut stream)?;
        let ifd = tiff.main_ifd()
            .ok_or_else(|| TiffError::GenericError("TIFF file contains no image".to_string()))?;

        let layout = RasterLayout::from_ifd(&reader, &mut stream, ifd)?;
        let decoder = BlockDecoder::new(layout.compression, layout.predictor, layout.pixel_type.bytes(),
                                        layout.samples_per_block_pixel(), tiff.byte_order)?;
        let geo = GeoKeyParser::read_geo_info(&reader, &mut stream, ifd)?;
        let crs = CrsDescription::from_geo_info(&geo);

        let times = FileTimes {
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            accessed: metadata.accessed().ok().map(DateTime::<Utc>::from),
        };

        let dataset = RasterDataset {
            width: layout.width,
            height: layout.height,
            band_count: layout.bands,
            pixel_type: layout.pixel_type,
            geotransform: geo.geotransform(),
            projection_wkt: crs.as_ref().and_then(|c| c.wkt.clone()),
            driver_name: DRIVER_NAME.to_string(),
            file_size_bytes: metadata.len(),
            created_at: times.created.or(times.modified),
        };

        debug!("Opened {}: {}x{} x{} {} ({}), georeferenced: {}",
               path.display(), dataset.width, dataset.height, dataset.band_count,
               dataset.pixel_type, decoder.compression_name(), dataset.is_georeferenced());

        Ok(RasterHandle {
            path: path.to_path_buf(),
            stream,
            reader,
            tiff,
            layout,
            decoder,
            geo,
            crs,
            times,
            dataset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dataset(&self) -> &RasterDataset {
        &self.dataset
    }

    pub fn width(&self) -> usize {
        self.layout.width
    }

    pub fn height(&self) -> usize {
        self.layout.height
    }

    pub fn band_count(&self) -> usize {
        self.layout.bands
    }

    pub fn pixel_type(&self) -> PixelType {
        self.layout.pixel_type
    }

    pub fn geotransform(&self) -> Option<[f64; 6]> {
        self.dataset.geotransform
    }

    pub fn layout(&self) -> &RasterLayout {
        &self.layout
    }

    pub fn tiff(&self) -> &TIFF {
        &self.tiff
    }

    /// The main image directory
    pub fn ifd(&self) -> &IFD {
        &self.tiff.ifds[0]
    }

    pub fn geo_info(&self) -> &GeoInfo {
        &self.geo
    }

    pub fn crs(&self) -> Option<&CrsDescription> {
        self.crs.as_ref()
    }

    pub fn file_times(&self) -> &FileTimes {
        &self.times
    }

    pub fn compression_name(&self) -> &'static str {
        self.decoder.compression_name()
    }

    /// Processing windows of at least `min_rows` rows, aligned to the block height
    pub fn windows(&self, min_rows: usize) -> Vec<Window> {
        Window::plan(self.layout.width, self.layout.height, self.layout.block_height, min_rows)
    }

    /// Decode every band of `window`
    pub fn read_window(&mut self, window: &Window) -> TiffResult<WindowData> {
        let handler = self.reader.handler()?;
        BlockReader::new(&self.layout, &self.decoder, handler).read_window(&mut self.stream, window)
    }

    /// ASCII tag of the main IFD, None when absent or unreadable
    pub fn ascii_tag(&mut self, tag: u16) -> Option<String> {
        let ifd = &self.tiff.ifds[0];
        if !ifd.has_tag(tag) {
            return None;
        }
        match self.reader.read_tag_ascii(&mut self.stream, ifd, tag) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("Cannot read ASCII tag {}: {}", tag, e);
                None
            }
        }
    }

    /// Numeric tag of the main IFD as floats
    pub fn numeric_tag(&mut self, tag: u16) -> Option<Vec<f64>> {
        let ifd = &self.tiff.ifds[0];
        if !ifd.has_tag(tag) {
            return None;
        }
        self.reader.read_tag_f64s(&mut self.stream, ifd, tag).ok()
    }

    /// NoData value declared in the GDAL_NODATA tag
    pub fn declared_nodata(&mut self) -> Option<f64> {
        self.ascii_tag(tags::GDAL_NODATA).and_then(|text| parse_nodata(&text))
    }

    /// Items of the GDAL_METADATA tag
    pub fn gdal_metadata(&mut self) -> Vec<GdalMetadataItem> {
        self.ascii_tag(tags::GDAL_METADATA)
            .map(|xml| parse_gdal_metadata(&xml))
            .unwrap_or_default()
    }
}
