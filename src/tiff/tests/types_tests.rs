//! Tests for the TIFF types module

extern crate std;

use crate::io::byte_order::ByteOrder;
use crate::tiff::types::TIFF;
use crate::tiff::ifd::{IFD, IFDEntry};

fn long_entry(tag: u16, value: u32) -> IFDEntry {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&value.to_le_bytes());
    IFDEntry::new(tag, 4, 1, value as u64, bytes)
}

#[test]
fn test_tiff_creation() {
    let tiff = TIFF::new(false, ByteOrder::LittleEndian);
    std::assert!(!tiff.is_big_tiff);
    std::assert_eq!(tiff.ifd_count(), 0);
    std::assert!(tiff.main_ifd().is_none());
}

#[test]
fn test_tiff_with_ifds() {
    let mut tiff = TIFF::new(true, ByteOrder::BigEndian);

    let mut main_ifd = IFD::new(0, 16);
    main_ifd.add_entry(long_entry(256, 1024));
    main_ifd.add_entry(long_entry(257, 768));
    tiff.ifds.push(main_ifd);

    // Reduced resolution subfile
    let mut overview_ifd = IFD::new(1, 100);
    overview_ifd.add_entry(long_entry(254, 1));
    overview_ifd.add_entry(long_entry(256, 512));
    overview_ifd.add_entry(long_entry(257, 384));
    tiff.ifds.push(overview_ifd);

    // Transparency mask, not an overview
    let mut mask_ifd = IFD::new(2, 200);
    mask_ifd.add_entry(long_entry(254, 4));
    tiff.ifds.push(mask_ifd);

    std::assert!(tiff.is_big_tiff);
    std::assert_eq!(tiff.ifd_count(), 3);
    std::assert_eq!(tiff.main_ifd().and_then(|ifd| ifd.get_dimensions()), Some((1024, 768)));

    let overviews = tiff.overviews();
    std::assert_eq!(overviews.len(), 1);
    std::assert_eq!(overviews[0].get_dimensions(), Some((512, 384)));
    std::assert_eq!(tiff.mask_count(), 1);
    std::assert_eq!(tiff.variant_name(), "BigTIFF");
}

#[test]
fn test_entry_inline_rules() {
    // Three SHORTs: 6 bytes, external in classic TIFF, inline in BigTIFF
    let entry = IFDEntry::new(258, 3, 3, 0, [0u8; 8]);
    std::assert!(!entry.is_value_inline(false));
    std::assert!(entry.is_value_inline(true));
    std::assert_eq!(entry.payload_size(), 6);
}
