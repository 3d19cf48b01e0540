//! Basic TIFF tag strategies
//!
//! This module provides functionality for adding the baseline tags that
//! describe a raster's layout: dimensions, sample properties, compression
//! and how pixel blocks are organised into strips or tiles.

use crate::tiff::ifd::IFD;
use crate::tiff::constants::{tags, field_types, photometric, planar_config, predictor, sample_format};
use crate::utils::tiff_utils::{self, ExternalData};
use log::{debug, info};

/// Pixel layout of an image to be written
#[derive(Debug, Clone)]
pub struct TiffLayout {
    pub width: u32,
    pub height: u32,
    pub bands: u16,
    pub bits_per_sample: u16,
    pub sample_format: u16,
    pub compression: u16,
    pub predictor: u16,
    pub planar_config: u16,
}

impl TiffLayout {
    /// Single-plane interleaved layout with no compression or predictor
    pub fn new(width: u32, height: u32, bands: u16, bits_per_sample: u16, sample_format: u16) -> Self {
        TiffLayout {
            width,
            height,
            bands,
            bits_per_sample,
            sample_format,
            compression: crate::tiff::constants::compression::NONE,
            predictor: predictor::NONE,
            planar_config: planar_config::CHUNKY,
        }
    }

    /// Bytes per sample
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize + 7) / 8
    }

    /// Samples stored per pixel inside one block
    pub fn samples_per_block_pixel(&self) -> usize {
        if self.planar_config == planar_config::PLANAR { 1 } else { self.bands as usize }
    }

    /// Photometric interpretation matching the band count
    pub fn photometric(&self) -> u16 {
        if self.bands == 3 && self.bits_per_sample == 8 && self.sample_format == sample_format::UNSIGNED {
            photometric::RGB
        } else {
            photometric::BLACK_IS_ZERO
        }
    }
}

/// Adds basic TIFF tags to an IFD
pub struct BasicTagsBuilder;

impl BasicTagsBuilder {
    /// Add the tags describing dimensions, samples and compression
    pub fn add_layout_tags(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        layout: &TiffLayout,
        is_big_tiff: bool,
    ) {
        info!("Adding layout tags for {}x{} image with {} band(s) of {} bits",
              layout.width, layout.height, layout.bands, layout.bits_per_sample);

        tiff_utils::add_longs(ifd, external_data, ifd_index, tags::IMAGE_WIDTH, &[layout.width], is_big_tiff);
        tiff_utils::add_longs(ifd, external_data, ifd_index, tags::IMAGE_LENGTH, &[layout.height], is_big_tiff);

        let bands = layout.bands as usize;
        tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::BITS_PER_SAMPLE,
                               &vec![layout.bits_per_sample; bands], is_big_tiff);
        tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::SAMPLE_FORMAT,
                               &vec![layout.sample_format; bands], is_big_tiff);
        tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::SAMPLES_PER_PIXEL,
                               &[layout.bands], is_big_tiff);
        tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::COMPRESSION,
                               &[layout.compression], is_big_tiff);
        tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::PHOTOMETRIC_INTERPRETATION,
                               &[layout.photometric()], is_big_tiff);
        tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::PLANAR_CONFIGURATION,
                               &[layout.planar_config], is_big_tiff);

        if layout.predictor != predictor::NONE {
            tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::PREDICTOR,
                                   &[layout.predictor], is_big_tiff);
        }

        // Bands past the first colour bands carry no colour meaning
        let extra = if layout.photometric() == photometric::RGB { 0 } else { bands.saturating_sub(1) };
        if extra > 0 {
            debug!("Declaring {} unspecified extra sample(s)", extra);
            tiff_utils::add_shorts(ifd, external_data, ifd_index, tags::EXTRA_SAMPLES,
                                   &vec![crate::tiff::constants::extra_samples::UNSPECIFIED; extra], is_big_tiff);
        }
    }

    /// Declare strip organisation for already-encoded strips
    ///
    /// The byte counts are final; the offsets are a placeholder array the
    /// writer fills once the block positions are known.
    pub fn setup_strips(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        rows_per_strip: u32,
        byte_counts: &[u64],
        is_big_tiff: bool,
    ) {
        info!("Setting up {} strip(s) of {} rows", byte_counts.len(), rows_per_strip);

        tiff_utils::add_longs(ifd, external_data, ifd_index, tags::ROWS_PER_STRIP, &[rows_per_strip], is_big_tiff);
        Self::add_block_arrays(ifd, external_data, ifd_index,
                               tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS, byte_counts, is_big_tiff);
    }

    /// Declare tile organisation for already-encoded tiles
    pub fn setup_tiles(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        tile_width: u32,
        tile_height: u32,
        byte_counts: &[u64],
        is_big_tiff: bool,
    ) {
        info!("Setting up {} tile(s) of {}x{}", byte_counts.len(), tile_width, tile_height);

        tiff_utils::add_longs(ifd, external_data, ifd_index, tags::TILE_WIDTH, &[tile_width], is_big_tiff);
        tiff_utils::add_longs(ifd, external_data, ifd_index, tags::TILE_LENGTH, &[tile_height], is_big_tiff);
        Self::add_block_arrays(ifd, external_data, ifd_index,
                               tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS, byte_counts, is_big_tiff);
    }

    fn add_block_arrays(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        offsets_tag: u16,
        counts_tag: u16,
        byte_counts: &[u64],
        is_big_tiff: bool,
    ) {
        let (field_type, width) = Self::offset_field(is_big_tiff);
        let count = byte_counts.len() as u64;

        let counts_payload: Vec<u8> = if is_big_tiff {
            byte_counts.iter().flat_map(|c| c.to_le_bytes()).collect()
        } else {
            byte_counts.iter().flat_map(|&c| (c as u32).to_le_bytes()).collect()
        };
        tiff_utils::add_tag(ifd, external_data, ifd_index, counts_tag, field_type, count, counts_payload, is_big_tiff);

        let placeholder = vec![0u8; byte_counts.len() * width];
        tiff_utils::add_tag(ifd, external_data, ifd_index, offsets_tag, field_type, count, placeholder, is_big_tiff);
    }

    /// Field type and width used for offset and byte-count arrays
    pub fn offset_field(is_big_tiff: bool) -> (u16, usize) {
        if is_big_tiff { (field_types::LONG8, 8) } else { (field_types::LONG, 4) }
    }
}
