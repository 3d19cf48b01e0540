//! XML utility functions
//!
//! Reading and writing the GDAL metadata XML carried by the GDAL_METADATA
//! tag. Items look like
//! `<Item name="WAVELENGTH" sample="3" role="..." domain="...">842</Item>`.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use log::{debug, warn};
use crate::tiff::errors::{TiffError, TiffResult};

/// One `<Item>` of a GDALMetadata document
#[derive(Debug, Clone, PartialEq)]
pub struct GdalMetadataItem {
    pub name: String,
    pub value: String,
    /// Metadata domain, `None` for the default domain
    pub domain: Option<String>,
    /// Zero-based band (sample) index, `None` for dataset level items
    pub sample: Option<usize>,
    /// Item role such as `description`, `scale`, `offset` or `unittype`
    pub role: Option<String>,
}

impl GdalMetadataItem {
    /// Dataset level item in the default domain
    pub fn dataset(name: &str, value: &str) -> Self {
        GdalMetadataItem {
            name: name.to_string(),
            value: value.to_string(),
            domain: None,
            sample: None,
            role: None,
        }
    }

    /// Band level item
    pub fn band(sample: usize, name: &str, value: &str) -> Self {
        GdalMetadataItem { sample: Some(sample), ..Self::dataset(name, value) }
    }

    /// Band level item with a GDAL role (`description`, `scale`, ...)
    pub fn band_role(sample: usize, role: &str, value: &str) -> Self {
        GdalMetadataItem {
            role: Some(role.to_string()),
            ..Self::band(sample, role.to_uppercase().as_str(), value)
        }
    }
}

/// Parse GDALMetadata XML into its items
///
/// Malformed documents yield the items read before the error.
pub fn parse_gdal_metadata(xml: &str) -> Vec<GdalMetadataItem> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<GdalMetadataItem> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Item" => {
                current = Some(item_from_attributes(&e));
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Item" => {
                items.push(item_from_attributes(&e));
            }
            Ok(Event::Text(text)) => {
                if let Some(item) = current.as_mut() {
                    match text.unescape() {
                        Ok(value) => item.value.push_str(&value),
                        Err(e) => warn!("Skipping undecodable GDAL metadata text: {}", e),
                    }
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"Item" => {
                if let Some(item) = current.take() {
                    items.push(item);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("GDAL metadata XML error at position {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => {}
        }
    }

    debug!("Parsed {} GDAL metadata item(s)", items.len());
    items
}

fn xml_error<E: std::fmt::Display>(e: E) -> TiffError {
    TiffError::GenericError(format!("GDAL metadata XML: {}", e))
}

fn item_from_attributes(start: &BytesStart) -> GdalMetadataItem {
    let mut item = GdalMetadataItem::dataset("", "");

    for attr in start.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match attr.key.as_ref() {
            b"name" => item.name = value,
            b"domain" if !value.is_empty() => item.domain = Some(value),
            b"sample" => item.sample = value.trim().parse().ok(),
            b"role" => item.role = Some(value),
            _ => {}
        }
    }

    item
}

/// Serialise items to a GDALMetadata XML document
pub fn write_gdal_metadata(items: &[GdalMetadataItem]) -> TiffResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Start(BytesStart::new("GDALMetadata"))).map_err(xml_error)?;

    for item in items {
        let mut element = BytesStart::new("Item");
        element.push_attribute(("name", item.name.as_str()));
        let sample = item.sample.map(|s| s.to_string());
        if let Some(sample) = sample.as_deref() {
            element.push_attribute(("sample", sample));
        }
        if let Some(role) = item.role.as_deref() {
            element.push_attribute(("role", role));
        }
        if let Some(domain) = item.domain.as_deref() {
            element.push_attribute(("domain", domain));
        }

        writer.write_event(Event::Start(element)).map_err(xml_error)?;
        writer.write_event(Event::Text(BytesText::new(&item.value))).map_err(xml_error)?;
        writer.write_event(Event::End(BytesEnd::new("Item"))).map_err(xml_error)?;
    }

    writer.write_event(Event::End(BytesEnd::new("GDALMetadata"))).map_err(xml_error)?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| TiffError::GenericError(format!("GDAL metadata is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_band_and_dataset_items() {
        let xml = r#"<GDALMetadata>
  <Item name="SENSOR">Sentinel-2 &amp; MSI</Item>
  <Item name="DESCRIPTION" sample="3" role="description">B8 NIR</Item>
  <Item name="WAVELENGTH" sample="3">842</Item>
  <Item name="AREA_OR_POINT" domain="IMAGE_STRUCTURE">Area</Item>
</GDALMetadata>"#;

        let items = parse_gdal_metadata(xml);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].value, "Sentinel-2 & MSI");
        assert_eq!(items[1].sample, Some(3));
        assert_eq!(items[1].role.as_deref(), Some("description"));
        assert_eq!(items[3].domain.as_deref(), Some("IMAGE_STRUCTURE"));
    }

    #[test]
    fn test_written_document_parses_back() {
        let items = vec![
            GdalMetadataItem::dataset("RUN_ID", "run <7>"),
            GdalMetadataItem::band_role(0, "description", "red"),
        ];
        let xml = write_gdal_metadata(&items).unwrap();
        assert!(xml.starts_with("<GDALMetadata>"));
        assert_eq!(parse_gdal_metadata(&xml), items);
    }

    #[test]
    fn test_malformed_document_keeps_prefix() {
        let items = parse_gdal_metadata("<GDALMetadata><Item name=\"A\">1</Item><Item name=");
        assert_eq!(items.len(), 1);
    }
}
