//! Tag groups and the file writer used by `TiffBuilder`
//!
//! Each module adds one family of tags to an IFD under construction;
//! `writer` lays the finished directories and pixel blocks out on disk.

pub mod basic_tags;
pub mod geo_tags;
pub mod metadata_tags;
pub mod writer;
