//! TIFF file reader implementation
//!
//! This module implements the TIFF/BigTIFF file reader that uses the
//! Strategy pattern to handle different byte orders. The reader parses the
//! header and the IFD chain once; tag payloads are decoded on demand from
//! the same stream, so a handle never has to reopen its file by path.

use log::{debug, info, warn};
use std::io::SeekFrom;

use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{field_types, header};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{IFD, IFDEntry};
use crate::tiff::types::TIFF;
use crate::tiff::validation;
use crate::utils::tag_utils;

/// Upper bound on a single tag payload; anything larger is a corrupt entry
const MAX_TAG_PAYLOAD: u64 = 64 * 1024 * 1024;

/// Upper bound on the IFD chain length, guards against offset loops
const MAX_IFDS: usize = 256;

/// Reader for TIFF and BigTIFF files
pub struct TiffReader {
    /// Current byte order handler
    pub(crate) byte_order_handler: Option<Box<dyn ByteOrderHandler>>,
    /// Whether currently reading BigTIFF format
    pub(crate) is_big_tiff: bool,
}

impl Default for TiffReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffReader {
    /// Creates a new TIFF reader
    pub fn new() -> Self {
        TiffReader {
            byte_order_handler: None,
            is_big_tiff: false,
        }
    }

    /// Returns the byte order handler, with proper error handling for None case
    pub fn handler(&self) -> TiffResult<&dyn ByteOrderHandler> {
        self.byte_order_handler.as_deref()
            .ok_or_else(|| TiffError::GenericError("Byte order not yet determined".to_string()))
    }

    /// Reads a TIFF file from the given reader
    ///
    /// This method handles the core process of reading a TIFF file:
    /// 1. Detect byte order (little/big endian)
    /// 2. Check for TIFF or BigTIFF format
    /// 3. Read all IFDs (Image File Directories)
    ///
    /// # Arguments
    /// * `reader` - Any struct implementing the SeekableReader trait
    ///
    /// # Returns
    /// A TIFF structure containing the file's directories
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> TiffResult<TIFF> {
        debug!("TiffReader::read starting");
        reader.seek(SeekFrom::Start(0))?;

        let handler = ByteOrder::detect(reader)?.create_handler();
        let is_big_tiff = Self::read_version(reader, handler.as_ref())?;
        let byte_order = handler.order();

        let first_ifd_offset = Self::read_offset(reader, is_big_tiff, handler.as_ref())?;
        debug!("First IFD offset: {}", first_ifd_offset);

        let file_size = validation::get_file_size(reader)?;
        validation::validate_ifd_offset(first_ifd_offset, file_size)?;

        self.byte_order_handler = Some(handler);
        self.is_big_tiff = is_big_tiff;

        let mut tiff = TIFF::new(is_big_tiff, byte_order);
        tiff.ifds = self.read_ifd_chain(reader, first_ifd_offset, file_size)?;

        if tiff.ifds.is_empty() {
            return Err(TiffError::GenericError("TIFF file contains no readable IFD".to_string()));
        }

        info!("Read {} IFDs ({}, {})", tiff.ifds.len(),
              if is_big_tiff { "BigTIFF" } else { "TIFF" }, byte_order.name());
        Ok(tiff)
    }

    /// Reads the version word after the byte order mark
    ///
    /// # Returns
    /// Whether the file is a BigTIFF
    fn read_version(reader: &mut dyn SeekableReader, handler: &dyn ByteOrderHandler) -> TiffResult<bool> {
        match handler.read_u16(reader)? {
            header::BIG_TIFF_VERSION => {
                validation::validate_bigtiff_header(reader, handler)?;
                debug!("BigTIFF header ({})", handler.order().name());
                Ok(true)
            }
            header::TIFF_VERSION => {
                debug!("Classic TIFF header ({})", handler.order().name());
                Ok(false)
            }
            other => Err(TiffError::UnsupportedVersion(other)),
        }
    }

    /// Reads an IFD offset at the current position; 8 bytes in BigTIFF, 4 otherwise
    fn read_offset(reader: &mut dyn SeekableReader, is_big_tiff: bool, handler: &dyn ByteOrderHandler) -> TiffResult<u64> {
        let offset = if is_big_tiff {
            handler.read_u64(reader)?
        } else {
            u64::from(handler.read_u32(reader)?)
        };
        Ok(offset)
    }

    /// Byte length of a directory up to its next-IFD offset field
    fn directory_len(ifd: &IFD, is_big_tiff: bool) -> u64 {
        let entries = ifd.entries.len() as u64;
        if is_big_tiff {
            8 + 20 * entries
        } else {
            2 + 12 * entries
        }
    }

    /// Reads a chain of IFDs starting from the given offset
    ///
    /// A broken link after the first IFD ends the chain with a warning; the
    /// directories read so far are kept.
    fn read_ifd_chain(&self, reader: &mut dyn SeekableReader, first_ifd_offset: u64, file_size: u64) -> TiffResult<Vec<IFD>> {
        let mut ifds = Vec::new();
        let mut ifd_offset = first_ifd_offset;
        let handler = self.handler()?;

        while ifd_offset != 0 && ifds.len() < MAX_IFDS {
            if ifd_offset >= file_size {
                warn!("IFD offset {} exceeds file size {}, stopping IFD chain", ifd_offset, file_size);
                break;
            }

            let ifd = match self.read_ifd(reader, ifd_offset, ifds.len()) {
                Ok(ifd) => ifd,
                Err(e) if ifds.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Error reading IFD {}: {}", ifds.len(), e);
                    break;
                }
            };

            let next_offset_position = ifd_offset + Self::directory_len(&ifd, self.is_big_tiff);
            let next_ifd_offset = if next_offset_position < file_size {
                reader.seek(SeekFrom::Start(next_offset_position))?;
                Self::read_offset(reader, self.is_big_tiff, handler).unwrap_or_else(|e| {
                    warn!("Error reading next IFD offset: {}", e);
                    0
                })
            } else {
                0
            };

            if next_ifd_offset != 0 && (next_ifd_offset >= file_size || next_ifd_offset < 8) {
                warn!("Invalid next IFD offset: {}, stopping IFD chain", next_ifd_offset);
                ifds.push(ifd);
                break;
            }

            ifds.push(ifd);
            ifd_offset = next_ifd_offset;
        }

        Ok(ifds)
    }

    /// Reads an IFD from the reader
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    /// * `offset` - Offset in the file where the IFD starts
    /// * `number` - The index of this IFD in the file
    ///
    /// # Returns
    /// The parsed IFD structure
    pub fn read_ifd(&self, reader: &mut dyn SeekableReader, offset: u64, number: usize) -> TiffResult<IFD> {
        reader.seek(SeekFrom::Start(offset))?;

        let handler = self.handler()?;
        let entry_count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u16(reader)? as u64
        };
        debug!("IFD #{} entry count: {}", number, entry_count);

        if entry_count > 4096 {
            return Err(TiffError::GenericError(format!(
                "Implausible IFD entry count {} at offset {}", entry_count, offset)));
        }

        let mut ifd = IFD::new(number, offset);
        for _ in 0..entry_count {
            let entry = self.read_ifd_entry(reader)?;
            ifd.add_entry(entry);
        }

        Ok(ifd)
    }

    /// Reads a single IFD entry
    ///
    /// The value field is kept as raw bytes; when the payload is inline its
    /// first value is decoded with the file's byte order, otherwise the field
    /// is decoded as an offset.
    fn read_ifd_entry(&self, reader: &mut dyn SeekableReader) -> TiffResult<IFDEntry> {
        let handler = self.handler()?;

        let tag = handler.read_u16(reader)?;
        let field_type = handler.read_u16(reader)?;
        let count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u32(reader)? as u64
        };

        let field_len = if self.is_big_tiff { 8 } else { 4 };
        let mut value_bytes = [0u8; 8];
        reader.read_exact(&mut value_bytes[..field_len])?;

        let mut entry = IFDEntry::new(tag, field_type, count, 0, value_bytes);
        entry.value_offset = if entry.is_value_inline(self.is_big_tiff) {
            tag_utils::first_inline_value(&entry, handler)
        } else if self.is_big_tiff {
            handler.u64_from(&value_bytes)
        } else {
            handler.u32_from(&value_bytes) as u64
        };

        Ok(entry)
    }

    /// Reads the raw payload bytes of a tag entry, still in file byte order
    pub fn read_tag_bytes(&self, reader: &mut dyn SeekableReader, entry: &IFDEntry) -> TiffResult<Vec<u8>> {
        let size = entry.payload_size();

        if entry.is_value_inline(self.is_big_tiff) {
            return Ok(entry.value_bytes[..size as usize].to_vec());
        }

        if size > MAX_TAG_PAYLOAD {
            return Err(TiffError::GenericError(format!(
                "Tag {} payload of {} bytes exceeds limit", entry.tag, size)));
        }

        reader.seek(SeekFrom::Start(entry.value_offset))?;
        let mut buffer = vec![0u8; size as usize];
        reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Reads a tag's values as a vector of u64
    ///
    /// Integer field types only; offsets, byte counts and code lists all go
    /// through here.
    ///
    /// # Arguments
    /// * `reader` - The seekable reader to use
    /// * `ifd` - The IFD containing the tag
    /// * `tag` - The tag number to read
    ///
    /// # Returns
    /// A vector of u64 values
    pub fn read_tag_values(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<u64>> {
        let entry = ifd.get_entry(tag)
            .ok_or(TiffError::TagNotFound(tag))?;

        let bytes = self.read_tag_bytes(reader, entry)?;
        tag_utils::decode_u64_values(&bytes, entry.field_type, self.handler()?)
    }

    /// Reads a tag's values as a vector of f64
    ///
    /// Accepts DOUBLE, FLOAT, RATIONAL and all integer field types.
    pub fn read_tag_f64s(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<f64>> {
        let entry = ifd.get_entry(tag)
            .ok_or(TiffError::TagNotFound(tag))?;

        let bytes = self.read_tag_bytes(reader, entry)?;
        tag_utils::decode_f64_values(&bytes, entry.field_type, self.handler()?)
    }

    /// Reads an ASCII tag, with trailing nulls removed
    pub fn read_tag_ascii(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<String> {
        let entry = ifd.get_entry(tag)
            .ok_or(TiffError::TagNotFound(tag))?;

        if entry.field_type != field_types::ASCII && entry.field_type != field_types::BYTE
            && entry.field_type != field_types::UNDEFINED {
            return Err(TiffError::UnsupportedFieldType(entry.field_type));
        }

        let mut bytes = self.read_tag_bytes(reader, entry)?;
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Returns whether the current file is a BigTIFF
    pub fn is_big_tiff(&self) -> bool {
        self.is_big_tiff
    }
}
