//! TIFF writing utilities
//!
//! Helper functions for laying out TIFF files: word alignment and the
//! ordering rules the IFD entries have to follow.

use crate::tiff::errors::TiffResult;
use crate::tiff::ifd::IFDEntry;
use std::collections::BTreeMap;
use std::io::Write;

/// Align an offset to a 4-byte boundary
pub fn align_to_4_bytes(offset: u64) -> u64 {
    (offset + 3) & !3
}

/// Write the zero bytes that bring `data_len` up to a 4-byte boundary
pub fn write_padding(writer: &mut impl Write, data_len: usize) -> TiffResult<()> {
    let padding = (4 - (data_len % 4)) % 4;
    if padding > 0 {
        writer.write_all(&[0u8; 3][..padding])?;
    }
    Ok(())
}

/// IFD entries sorted by tag number with duplicates removed
///
/// Entries must be in ascending tag order and each tag may appear once.
/// When a tag was added several times the last occurrence wins.
pub fn get_unique_sorted_entries(entries: &[IFDEntry]) -> Vec<IFDEntry> {
    let unique: BTreeMap<u16, &IFDEntry> = entries.iter().map(|entry| (entry.tag, entry)).collect();
    unique.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        assert_eq!(align_to_4_bytes(0), 0);
        assert_eq!(align_to_4_bytes(5), 8);
        assert_eq!(align_to_4_bytes(8), 8);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let entries = vec![
            IFDEntry::new(259, 3, 1, 1, [1, 0, 0, 0, 0, 0, 0, 0]),
            IFDEntry::new(256, 4, 1, 10, [10, 0, 0, 0, 0, 0, 0, 0]),
            IFDEntry::new(259, 3, 1, 8, [8, 0, 0, 0, 0, 0, 0, 0]),
        ];
        let unique = get_unique_sorted_entries(&entries);
        assert_eq!(unique.iter().map(|e| e.tag).collect::<Vec<_>>(), vec![256, 259]);
        assert_eq!(unique[1].value_offset, 8);
    }
}
