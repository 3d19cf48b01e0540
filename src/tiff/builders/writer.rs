//! TIFF writing strategies
//!
//! This module handles writing TIFF files to disk. Writing a valid TIFF
//! requires careful management of offsets, ordering and alignment so the
//! file can be read by other software.
//!
//! Layout: header, all IFDs, external tag payloads, then the pixel blocks
//! of each IFD in order. Output is always little-endian.

use crate::tiff::ifd::IFD;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::constants::{header, tags};
use crate::utils::tiff_utils::ExternalData;
use crate::utils::write_utils;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// Encoded pixel blocks (strips or tiles) keyed by IFD index
pub type ImageBlocks = BTreeMap<usize, Vec<Vec<u8>>>;

/// Handles writing TIFF files to disk
pub struct WriterBuilder;

/// Where everything lands in the output file
struct FileLayout {
    ifd_offsets: Vec<u64>,
    tag_data_offsets: BTreeMap<(usize, u16), u64>,
    block_offsets: BTreeMap<usize, Vec<u64>>,
    end: u64,
}

impl WriterBuilder {
    /// Write a complete TIFF file to disk
    pub fn write(
        is_big_tiff: bool,
        ifds: &[IFD],
        image_blocks: &ImageBlocks,
        external_data: &ExternalData,
        output_path: &Path,
    ) -> TiffResult<()> {
        info!("Writing TIFF to {}", output_path.display());

        let file = File::create(output_path).map_err(TiffError::from)?;
        let mut writer = BufWriter::with_capacity(1024 * 1024, file);
        Self::write_to(&mut writer, is_big_tiff, ifds, image_blocks, external_data)?;
        writer.flush()?;
        Ok(())
    }

    /// Write a complete TIFF into any seekable sink
    pub fn write_to<W: Write + Seek>(
        writer: &mut W,
        is_big_tiff: bool,
        ifds: &[IFD],
        image_blocks: &ImageBlocks,
        external_data: &ExternalData,
    ) -> TiffResult<()> {
        let mut sorted_ifds = Self::prepare_sorted_ifds(ifds);
        let mut external = external_data.clone();

        let header_size = if is_big_tiff { 16 } else { 8 };
        let layout = Self::calculate_offsets(&sorted_ifds, &external, image_blocks, header_size, is_big_tiff);

        if !is_big_tiff && layout.end > u32::MAX as u64 {
            return Err(TiffError::GenericError(format!(
                "Output of {} bytes exceeds classic TIFF limits, use BigTIFF", layout.end)));
        }

        Self::patch_block_offsets(&mut sorted_ifds, &mut external, &layout, is_big_tiff)?;

        Self::write_header(writer, is_big_tiff)?;
        let first_ifd_offset = layout.ifd_offsets.first().copied().unwrap_or(0);
        Self::write_first_ifd_offset(writer, first_ifd_offset, is_big_tiff)?;
        Self::write_ifds(writer, &sorted_ifds, &layout, is_big_tiff)?;
        Self::write_external_data(writer, &external, &layout.tag_data_offsets)?;
        Self::write_image_blocks(writer, image_blocks, &layout.block_offsets)?;

        debug!("Wrote {} IFD(s), {} bytes total", sorted_ifds.len(), layout.end);
        Ok(())
    }

    /// Prepare sorted IFDs with unique tags
    fn prepare_sorted_ifds(ifds: &[IFD]) -> Vec<IFD> {
        ifds.iter().map(|ifd| {
            let mut sorted_ifd = ifd.clone();
            sorted_ifd.entries = write_utils::get_unique_sorted_entries(&ifd.entries);
            sorted_ifd
        }).collect()
    }

    /// Calculate offsets for IFDs, external data and pixel blocks
    fn calculate_offsets(
        sorted_ifds: &[IFD],
        external_data: &ExternalData,
        image_blocks: &ImageBlocks,
        header_size: u64,
        is_big_tiff: bool,
    ) -> FileLayout {
        let mut current_offset = header_size;

        let mut ifd_offsets = Vec::with_capacity(sorted_ifds.len());
        for ifd in sorted_ifds {
            ifd_offsets.push(current_offset);
            current_offset += Self::calculate_ifd_size(ifd, is_big_tiff);
        }

        let mut tag_data_offsets = BTreeMap::new();
        for (key, data) in external_data {
            current_offset = write_utils::align_to_4_bytes(current_offset);
            tag_data_offsets.insert(*key, current_offset);
            current_offset += data.len() as u64;
        }

        let mut block_offsets = BTreeMap::new();
        for (ifd_index, blocks) in image_blocks {
            let offsets = blocks.iter().map(|block| {
                current_offset = write_utils::align_to_4_bytes(current_offset);
                let offset = current_offset;
                current_offset += block.len() as u64;
                offset
            }).collect();
            block_offsets.insert(*ifd_index, offsets);
        }

        FileLayout { ifd_offsets, tag_data_offsets, block_offsets, end: current_offset }
    }

    /// Fill the StripOffsets / TileOffsets arrays now that positions are known
    fn patch_block_offsets(
        sorted_ifds: &mut [IFD],
        external: &mut ExternalData,
        layout: &FileLayout,
        is_big_tiff: bool,
    ) -> TiffResult<()> {
        for (ifd_index, offsets) in &layout.block_offsets {
            let ifd = sorted_ifds.get_mut(*ifd_index).ok_or_else(|| TiffError::GenericError(
                format!("Pixel blocks given for missing IFD #{}", ifd_index)))?;

            let offsets_tag = if ifd.has_tag(tags::TILE_OFFSETS) { tags::TILE_OFFSETS } else { tags::STRIP_OFFSETS };
            let payload: Vec<u8> = if is_big_tiff {
                offsets.iter().flat_map(|o| o.to_le_bytes()).collect()
            } else {
                offsets.iter().flat_map(|&o| (o as u32).to_le_bytes()).collect()
            };

            let entry = ifd.entries.iter_mut().find(|e| e.tag == offsets_tag).ok_or_else(||
                TiffError::TagNotFound(offsets_tag))?;
            if entry.count != offsets.len() as u64 {
                return Err(TiffError::GenericError(format!(
                    "IFD #{} declares {} blocks but {} were given", ifd_index, entry.count, offsets.len())));
            }

            match external.get_mut(&(*ifd_index, offsets_tag)) {
                Some(data) if data.len() == payload.len() => *data = payload,
                Some(_) => return Err(TiffError::GenericError(format!(
                    "Offset array size mismatch for tag {}", offsets_tag))),
                None => {
                    entry.value_bytes = [0u8; 8];
                    entry.value_bytes[..payload.len()].copy_from_slice(&payload);
                    entry.value_offset = offsets.first().copied().unwrap_or(0);
                }
            }
        }
        Ok(())
    }

    /// Write TIFF header with a placeholder for the first IFD offset
    fn write_header(writer: &mut impl Write, is_big_tiff: bool) -> TiffResult<()> {
        writer.write_all(&header::LITTLE_ENDIAN_MARKER)?;

        if is_big_tiff {
            writer.write_all(&header::BIG_TIFF_VERSION.to_le_bytes())?;
            writer.write_all(&header::BIGTIFF_OFFSET_SIZE.to_le_bytes())?;
            writer.write_all(&[0u8, 0])?;
            writer.write_all(&[0u8; 8])?;
        } else {
            writer.write_all(&header::TIFF_VERSION.to_le_bytes())?;
            writer.write_all(&[0u8; 4])?;
        }

        Ok(())
    }

    /// Calculate size of an IFD
    fn calculate_ifd_size(ifd: &IFD, is_big_tiff: bool) -> u64 {
        let entries_count = ifd.entries.len() as u64;
        if is_big_tiff {
            8 + (20 * entries_count) + 8
        } else {
            2 + (12 * entries_count) + 4
        }
    }

    fn write_first_ifd_offset(writer: &mut (impl Write + Seek), offset: u64, is_big_tiff: bool) -> TiffResult<()> {
        let position = if is_big_tiff { 8 } else { 4 };
        writer.seek(SeekFrom::Start(position))?;

        if is_big_tiff {
            writer.write_all(&offset.to_le_bytes())?;
        } else {
            writer.write_all(&(offset as u32).to_le_bytes())?;
        }
        Ok(())
    }

    fn write_ifds(
        writer: &mut (impl Write + Seek),
        sorted_ifds: &[IFD],
        layout: &FileLayout,
        is_big_tiff: bool,
    ) -> TiffResult<()> {
        for (i, ifd) in sorted_ifds.iter().enumerate() {
            let next_ifd_offset = layout.ifd_offsets.get(i + 1).copied().unwrap_or(0);
            writer.seek(SeekFrom::Start(layout.ifd_offsets[i]))?;
            Self::write_ifd(writer, ifd, next_ifd_offset, &layout.tag_data_offsets, i, is_big_tiff)?;
        }
        Ok(())
    }

    fn write_external_data(
        writer: &mut (impl Write + Seek),
        external_data: &ExternalData,
        tag_data_offsets: &BTreeMap<(usize, u16), u64>,
    ) -> TiffResult<()> {
        for (key, data) in external_data {
            if let Some(offset) = tag_data_offsets.get(key) {
                writer.seek(SeekFrom::Start(*offset))?;
                writer.write_all(data)?;
                write_utils::write_padding(writer, data.len())?;
            }
        }
        Ok(())
    }

    fn write_image_blocks(
        writer: &mut (impl Write + Seek),
        image_blocks: &ImageBlocks,
        block_offsets: &BTreeMap<usize, Vec<u64>>,
    ) -> TiffResult<()> {
        for (ifd_index, blocks) in image_blocks {
            let offsets = match block_offsets.get(ifd_index) {
                Some(offsets) => offsets,
                None => continue,
            };
            for (block, offset) in blocks.iter().zip(offsets) {
                writer.seek(SeekFrom::Start(*offset))?;
                writer.write_all(block)?;
            }
        }
        Ok(())
    }

    /// Write an IFD (Image File Directory)
    ///
    /// Inline entries carry their little-endian payload in `value_bytes`;
    /// external ones point at the offset assigned in the layout.
    fn write_ifd(
        writer: &mut (impl Write + Seek),
        ifd: &IFD,
        next_offset: u64,
        tag_offsets: &BTreeMap<(usize, u16), u64>,
        ifd_index: usize,
        is_big_tiff: bool,
    ) -> TiffResult<()> {
        if is_big_tiff {
            writer.write_all(&(ifd.entries.len() as u64).to_le_bytes())?;
        } else {
            writer.write_all(&(ifd.entries.len() as u16).to_le_bytes())?;
        }

        for entry in &ifd.entries {
            writer.write_all(&entry.tag.to_le_bytes())?;
            writer.write_all(&entry.field_type.to_le_bytes())?;

            if is_big_tiff {
                writer.write_all(&entry.count.to_le_bytes())?;
            } else {
                writer.write_all(&(entry.count as u32).to_le_bytes())?;
            }

            match tag_offsets.get(&(ifd_index, entry.tag)) {
                Some(&offset) if is_big_tiff => writer.write_all(&offset.to_le_bytes())?,
                Some(&offset) => writer.write_all(&(offset as u32).to_le_bytes())?,
                None if is_big_tiff => writer.write_all(&entry.value_bytes)?,
                None => writer.write_all(&entry.value_bytes[..4])?,
            }
        }

        if is_big_tiff {
            writer.write_all(&next_offset.to_le_bytes())?;
        } else {
            writer.write_all(&(next_offset as u32).to_le_bytes())?;
        }
        Ok(())
    }
}
