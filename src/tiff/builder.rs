//! TIFF file construction utilities
//!
//! `TiffBuilder` collects IFDs, tag payloads and encoded pixel blocks and
//! delegates each concern to a builder strategy: layout tags, GeoTIFF tags,
//! GDAL metadata and finally the writer that lays the file out.

use std::io::{Seek, Write};
use std::path::Path;
use log::{debug, info};

use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::utils::tiff_utils::ExternalData;
use crate::utils::xml_utils::GdalMetadataItem;

use crate::tiff::builders::basic_tags::{BasicTagsBuilder, TiffLayout};
use crate::tiff::builders::geo_tags::{GeoKeySpec, GeoTagsBuilder};
use crate::tiff::builders::metadata_tags::MetadataBuilder;
use crate::tiff::builders::writer::{ImageBlocks, WriterBuilder};

/// Builder for creating TIFF files
pub struct TiffBuilder {
    is_big_tiff: bool,
    pub ifds: Vec<IFD>,
    image_blocks: ImageBlocks,
    external_data: ExternalData,
}

impl TiffBuilder {
    /// Create a new TIFF builder
    pub fn new(is_big_tiff: bool) -> Self {
        debug!("Creating new TiffBuilder (is_big_tiff: {})", is_big_tiff);
        TiffBuilder {
            is_big_tiff,
            ifds: Vec::new(),
            image_blocks: ImageBlocks::new(),
            external_data: ExternalData::new(),
        }
    }

    /// Add an empty IFD and return its index
    pub fn add_ifd(&mut self) -> usize {
        let ifd_index = self.ifds.len();
        debug!("Adding IFD #{} to TiffBuilder", ifd_index);
        self.ifds.push(IFD::new(ifd_index, 0));
        ifd_index
    }

    fn ifd_mut(&mut self, ifd_index: usize) -> TiffResult<&mut IFD> {
        let count = self.ifds.len();
        self.ifds.get_mut(ifd_index).ok_or_else(|| TiffError::GenericError(format!(
            "Invalid IFD index {}, only have {} IFDs", ifd_index, count)))
    }

    /// Add the tags describing the pixel layout
    pub fn add_layout_tags(&mut self, ifd_index: usize, layout: &TiffLayout) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        self.ifd_mut(ifd_index)?;
        BasicTagsBuilder::add_layout_tags(&mut self.ifds[ifd_index], &mut self.external_data,
                                          ifd_index, layout, is_big_tiff);
        Ok(())
    }

    /// Attach encoded strips to an IFD
    pub fn set_strips(&mut self, ifd_index: usize, rows_per_strip: u32, strips: Vec<Vec<u8>>) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        let byte_counts: Vec<u64> = strips.iter().map(|s| s.len() as u64).collect();
        self.ifd_mut(ifd_index)?;

        BasicTagsBuilder::setup_strips(&mut self.ifds[ifd_index], &mut self.external_data,
                                       ifd_index, rows_per_strip, &byte_counts, is_big_tiff);
        self.image_blocks.insert(ifd_index, strips);
        Ok(())
    }

    /// Attach encoded tiles to an IFD
    pub fn set_tiles(&mut self, ifd_index: usize, tile_width: u32, tile_height: u32,
                     tiles: Vec<Vec<u8>>) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        let byte_counts: Vec<u64> = tiles.iter().map(|t| t.len() as u64).collect();
        self.ifd_mut(ifd_index)?;

        BasicTagsBuilder::setup_tiles(&mut self.ifds[ifd_index], &mut self.external_data,
                                      ifd_index, tile_width, tile_height, &byte_counts, is_big_tiff);
        self.image_blocks.insert(ifd_index, tiles);
        Ok(())
    }

    /// Georeference an IFD with an affine geotransform
    pub fn add_geotransform(&mut self, ifd_index: usize, geotransform: &[f64; 6]) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        self.ifd_mut(ifd_index)?;
        GeoTagsBuilder::add_geotransform(&mut self.ifds[ifd_index], &mut self.external_data,
                                         ifd_index, geotransform, is_big_tiff);
        Ok(())
    }

    /// Add the GeoKey directory naming the CRS
    pub fn add_geokeys(&mut self, ifd_index: usize, spec: &GeoKeySpec) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        self.ifd_mut(ifd_index)?;
        GeoTagsBuilder::add_geokeys(&mut self.ifds[ifd_index], &mut self.external_data,
                                    ifd_index, spec, is_big_tiff);
        Ok(())
    }

    /// Add a GDAL NoData tag to an IFD
    pub fn add_nodata_tag(&mut self, ifd_index: usize, nodata_value: f64) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        self.ifd_mut(ifd_index)?;
        MetadataBuilder::add_nodata_tag(&mut self.ifds[ifd_index], &mut self.external_data,
                                        ifd_index, nodata_value, is_big_tiff);
        Ok(())
    }

    /// Add a GDAL metadata tag
    pub fn add_gdal_metadata(&mut self, ifd_index: usize, items: &[GdalMetadataItem]) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        self.ifd_mut(ifd_index)?;
        MetadataBuilder::add_gdal_metadata_tag(&mut self.ifds[ifd_index], &mut self.external_data,
                                               ifd_index, items, is_big_tiff)
    }

    /// Add a free-text ASCII tag
    pub fn add_text_tag(&mut self, ifd_index: usize, tag: u16, text: &str) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        self.ifd_mut(ifd_index)?;
        MetadataBuilder::add_text_tag(&mut self.ifds[ifd_index], &mut self.external_data,
                                      ifd_index, tag, text, is_big_tiff);
        Ok(())
    }

    /// Write the TIFF file to disk
    pub fn write(&self, output_path: &Path) -> TiffResult<()> {
        info!("Writing {} IFD(s) to {}", self.ifds.len(), output_path.display());
        WriterBuilder::write(self.is_big_tiff, &self.ifds, &self.image_blocks, &self.external_data, output_path)
    }

    /// Write the TIFF into an in-memory or other seekable sink
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> TiffResult<()> {
        WriterBuilder::write_to(writer, self.is_big_tiff, &self.ifds, &self.image_blocks, &self.external_data)
    }
}
