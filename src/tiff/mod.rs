//! TIFF file format module
//!
//! This module provides structures and functions for reading and writing
//! TIFF and BigTIFF files with GeoTIFF and GDAL extension tags.

pub mod errors;
pub mod ifd;
pub(crate) mod types;
pub mod reader;
mod tests;
pub mod geotags;
pub mod builder;
pub mod builders;
pub mod constants;
pub mod geo_key_parser;
pub(crate) mod validation;

pub use crate::io::byte_order::{BigEndianHandler, ByteOrder, ByteOrderHandler, LittleEndianHandler};
pub use errors::{TiffError, TiffResult};
pub use ifd::{IFD, IFDEntry};
pub use reader::TiffReader;
pub use types::TIFF;
pub use geotags::{CodeTable, GeoKeyEntry, get_code_name, get_crs_name, get_key_name, get_tag_name, is_geotiff_tag};
pub use geo_key_parser::{GeoInfo, GeoKeyDirectory, GeoKeyParser, GeoKeyValue};
pub use builder::TiffBuilder;
pub use builders::basic_tags::TiffLayout;
pub use builders::geo_tags::GeoKeySpec;
