//! Parsed TIFF container

use crate::io::byte_order::ByteOrder;
use crate::tiff::ifd::IFD;

/// Header facts and the directory chain of one TIFF file
///
/// The first directory holds the full-resolution image; later ones are
/// overviews, transparency masks or unrelated subfiles.
#[derive(Debug)]
pub struct TIFF {
    pub ifds: Vec<IFD>,
    pub is_big_tiff: bool,
    pub byte_order: ByteOrder,
}

impl TIFF {
    pub fn new(is_big_tiff: bool, byte_order: ByteOrder) -> Self {
        TIFF { ifds: Vec::new(), is_big_tiff, byte_order }
    }

    /// Directory of the full-resolution image
    pub fn main_ifd(&self) -> Option<&IFD> {
        self.ifds.first()
    }

    pub fn ifd_count(&self) -> usize {
        self.ifds.len()
    }

    /// `TIFF` or `BigTIFF`
    pub fn variant_name(&self) -> &'static str {
        if self.is_big_tiff { "BigTIFF" } else { "TIFF" }
    }

    /// Reduced-resolution subfiles, in file order
    pub fn overviews(&self) -> Vec<&IFD> {
        self.ifds.iter().skip(1).filter(|ifd| ifd.is_overview()).collect()
    }

    /// Number of transparency mask subfiles
    pub fn mask_count(&self) -> usize {
        self.ifds.iter().skip(1).filter(|ifd| ifd.is_mask()).count()
    }
}
