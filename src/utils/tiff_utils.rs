//! TIFF utility functions
//!
//! Common operations for building IFDs that are used by the builder
//! strategies: placing tag payloads inline or externally, encoding typed
//! value arrays, and replacing existing entries.

use crate::tiff::ifd::{IFD, IFDEntry};
use crate::tiff::constants::field_types;
use log::trace;
use std::collections::BTreeMap;

/// External tag payloads keyed by (IFD index, tag)
pub type ExternalData = BTreeMap<(usize, u16), Vec<u8>>;

/// Update an IFD tag, replacing it if it already exists
pub fn update_ifd_tag(ifd: &mut IFD, tag: u16, entry: IFDEntry) {
    ifd.entries.retain(|e| e.tag != tag);
    ifd.add_entry(entry);
}

/// Add a tag whose payload is already encoded in little-endian order
///
/// Payloads that fit the entry's value field (4 bytes, or 8 for BigTIFF)
/// are stored inline; anything larger goes to `external_data` and the
/// writer assigns its offset.
///
/// # Arguments
/// * `ifd` - The IFD where the tag will be added
/// * `external_data` - External payloads by (IFD index, tag)
/// * `ifd_index` - The index of the current IFD
/// * `tag` - The tag ID
/// * `field_type` - The data type code
/// * `count` - The number of values
/// * `payload` - The encoded values
/// * `is_big_tiff` - Whether the target file is BigTIFF
pub fn add_tag(
    ifd: &mut IFD,
    external_data: &mut ExternalData,
    ifd_index: usize,
    tag: u16,
    field_type: u16,
    count: u64,
    payload: Vec<u8>,
    is_big_tiff: bool,
) {
    let inline_size = if is_big_tiff { 8 } else { 4 };

    if payload.len() <= inline_size {
        let mut value_bytes = [0u8; 8];
        value_bytes[..payload.len()].copy_from_slice(&payload);
        let scalar = inline_scalar(&payload, field_type);
        trace!("Tag {} stored inline ({} bytes)", tag, payload.len());

        external_data.remove(&(ifd_index, tag));
        update_ifd_tag(ifd, tag, IFDEntry::new(tag, field_type, count, scalar, value_bytes));
    } else {
        trace!("Tag {} stored externally ({} bytes)", tag, payload.len());
        update_ifd_tag(ifd, tag, IFDEntry::new(tag, field_type, count, 0, [0u8; 8]));
        external_data.insert((ifd_index, tag), payload);
    }
}

/// Add a SHORT array tag
pub fn add_shorts(ifd: &mut IFD, external_data: &mut ExternalData, ifd_index: usize,
                  tag: u16, values: &[u16], is_big_tiff: bool) {
    let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    add_tag(ifd, external_data, ifd_index, tag, field_types::SHORT, values.len() as u64, payload, is_big_tiff);
}

/// Add a LONG array tag
pub fn add_longs(ifd: &mut IFD, external_data: &mut ExternalData, ifd_index: usize,
                 tag: u16, values: &[u32], is_big_tiff: bool) {
    let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    add_tag(ifd, external_data, ifd_index, tag, field_types::LONG, values.len() as u64, payload, is_big_tiff);
}

/// Add a DOUBLE array tag
pub fn add_doubles(ifd: &mut IFD, external_data: &mut ExternalData, ifd_index: usize,
                   tag: u16, values: &[f64], is_big_tiff: bool) {
    let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    add_tag(ifd, external_data, ifd_index, tag, field_types::DOUBLE, values.len() as u64, payload, is_big_tiff);
}

/// Add a NUL-terminated ASCII tag
pub fn add_ascii(ifd: &mut IFD, external_data: &mut ExternalData, ifd_index: usize,
                 tag: u16, text: &str, is_big_tiff: bool) {
    let mut payload = text.as_bytes().to_vec();
    payload.push(0);
    let count = payload.len() as u64;
    add_tag(ifd, external_data, ifd_index, tag, field_types::ASCII, count, payload, is_big_tiff);
}

/// Decode the first value of an inline payload for `IFDEntry::value_offset`
fn inline_scalar(payload: &[u8], field_type: u16) -> u64 {
    let mut buf = [0u8; 8];
    let width = crate::tiff::ifd::field_type_size(field_type).min(payload.len()).min(8);
    buf[..width].copy_from_slice(&payload[..width]);
    match field_type {
        field_types::SHORT | field_types::SSHORT => u16::from_le_bytes([buf[0], buf[1]]) as u64,
        field_types::LONG | field_types::SLONG => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as u64,
        field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => u64::from_le_bytes(buf),
        _ => buf[0] as u64,
    }
}
