//! Tests for the TIFF builder and writer, read back through the reader

extern crate std;

use std::io::Cursor;
use crate::tiff::builder::TiffBuilder;
use crate::tiff::builders::basic_tags::TiffLayout;
use crate::tiff::builders::geo_tags::GeoKeySpec;
use crate::tiff::constants::{sample_format, tags};
use crate::tiff::geo_key_parser::GeoKeyParser;
use crate::tiff::reader::TiffReader;
use crate::utils::xml_utils::{self, GdalMetadataItem};

fn build(is_big_tiff: bool) -> Cursor<Vec<u8>> {
    let mut builder = TiffBuilder::new(is_big_tiff);
    let ifd = builder.add_ifd();

    let layout = TiffLayout::new(4, 3, 2, 8, sample_format::UNSIGNED);
    builder.add_layout_tags(ifd, &layout).unwrap();

    // One strip per row, 4 pixels x 2 bands
    let strips: Vec<Vec<u8>> = (0..3u8).map(|row| (0..8u8).map(|i| row * 10 + i).collect()).collect();
    builder.set_strips(ifd, 1, strips).unwrap();

    builder.add_geotransform(ifd, &[100.0, 2.0, 0.0, 200.0, 0.0, -2.0]).unwrap();
    builder.add_geokeys(ifd, &GeoKeySpec { epsg: Some(32632), geographic: false, citation: None }).unwrap();
    builder.add_nodata_tag(ifd, 255.0).unwrap();
    builder.add_gdal_metadata(ifd, &[GdalMetadataItem::band_role(1, "description", "nir")]).unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    cursor
}

#[test]
fn test_written_strips_read_back() {
    for is_big_tiff in [false, true] {
        let mut cursor = build(is_big_tiff);
        let mut reader = TiffReader::new();
        let tiff = reader.read(&mut cursor).unwrap();
        std::assert_eq!(tiff.is_big_tiff, is_big_tiff);

        let ifd = tiff.main_ifd().unwrap();
        std::assert_eq!(ifd.get_dimensions(), Some((4, 3)));
        std::assert_eq!(reader.read_tag_values(&mut cursor, ifd, tags::BITS_PER_SAMPLE).unwrap(), vec![8, 8]);

        let offsets = reader.read_tag_values(&mut cursor, ifd, tags::STRIP_OFFSETS).unwrap();
        let counts = reader.read_tag_values(&mut cursor, ifd, tags::STRIP_BYTE_COUNTS).unwrap();
        std::assert_eq!(offsets.len(), 3);
        std::assert_eq!(counts, vec![8, 8, 8]);

        let data = cursor.get_ref();
        let last = offsets[2] as usize;
        std::assert_eq!(&data[last..last + 8], &[20, 21, 22, 23, 24, 25, 26, 27]);
    }
}

#[test]
fn test_written_georeferencing_read_back() {
    let mut cursor = build(false);
    let mut reader = TiffReader::new();
    let tiff = reader.read(&mut cursor).unwrap();
    let ifd = tiff.main_ifd().unwrap();

    let geo = GeoKeyParser::read_geo_info(&reader, &mut cursor, ifd).unwrap();
    std::assert_eq!(geo.geotransform(), Some([100.0, 2.0, 0.0, 200.0, 0.0, -2.0]));
    std::assert_eq!(geo.epsg_code(), Some(32632));

    std::assert_eq!(reader.read_tag_ascii(&mut cursor, ifd, tags::GDAL_NODATA).unwrap(), "255");
    let xml = reader.read_tag_ascii(&mut cursor, ifd, tags::GDAL_METADATA).unwrap();
    let items = xml_utils::parse_gdal_metadata(&xml);
    std::assert_eq!(items.len(), 1);
    std::assert_eq!(items[0].sample, Some(1));
    std::assert_eq!(items[0].value, "nir");
}

#[test]
fn test_tiles_and_invalid_ifd_index() {
    let mut builder = TiffBuilder::new(false);
    std::assert!(builder.set_strips(0, 1, vec![vec![0u8; 4]]).is_err());

    let ifd = builder.add_ifd();
    builder.add_layout_tags(ifd, &TiffLayout::new(32, 16, 1, 8, sample_format::UNSIGNED)).unwrap();
    builder.set_tiles(ifd, 16, 16, vec![vec![1u8; 256], vec![2u8; 256]]).unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();

    let mut reader = TiffReader::new();
    let tiff = reader.read(&mut cursor).unwrap();
    let ifd = tiff.main_ifd().unwrap();
    std::assert!(ifd.is_tiled());
    let offsets = reader.read_tag_values(&mut cursor, ifd, tags::TILE_OFFSETS).unwrap();
    std::assert_eq!(cursor.get_ref()[offsets[1] as usize], 2);
}

#[test]
fn test_ifd_chain_is_followed() {
    for is_big_tiff in [false, true] {
        let mut builder = TiffBuilder::new(is_big_tiff);
        for (width, height) in [(4u32, 4u32), (2, 2)] {
            let ifd = builder.add_ifd();
            let layout = TiffLayout::new(width, height, 1, 8, sample_format::UNSIGNED);
            builder.add_layout_tags(ifd, &layout).unwrap();
            builder.set_strips(ifd, height, vec![vec![7u8; (width * height) as usize]]).unwrap();
        }

        let mut cursor = Cursor::new(Vec::new());
        builder.write_to(&mut cursor).unwrap();
        let tiff = TiffReader::new().read(&mut cursor).unwrap();
        std::assert_eq!(tiff.ifd_count(), 2);
        std::assert_eq!(tiff.ifds[1].get_dimensions(), Some((2, 2)));
    }
}
