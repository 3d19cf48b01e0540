//! Spatial extraction
//!
//! Geotransform, CRS, extent, resolution and area of a raster, plus its
//! bounds in WGS 84 where the CRS can be converted without a projection
//! library.

use log::debug;
use serde::Serialize;

use crate::coordinate::{BoundingBox, CoordinateSystemFactory, CoordinateTransformer, Corners, CrsDescription, Point};
use crate::raster::RasterHandle;

/// The affine geotransform with named coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoTransformInfo {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub column_rotation: f64,
    /// GDAL order `[origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h]`
    pub coefficients: [f64; 6],
}

impl GeoTransformInfo {
    pub fn new(gt: [f64; 6]) -> Self {
        GeoTransformInfo {
            origin_x: gt[0],
            origin_y: gt[3],
            pixel_width: gt[1],
            pixel_height: gt[5],
            row_rotation: gt[2],
            column_rotation: gt[4],
            coefficients: gt,
        }
    }

    pub fn is_rotated(&self) -> bool {
        self.row_rotation != 0.0 || self.column_rotation != 0.0
    }
}

/// Pixel size in CRS units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub x: f64,
    pub y: f64,
    pub units: String,
}

/// Spatial part of the extraction result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialReport {
    pub geotransform: Option<GeoTransformInfo>,
    pub crs: Option<CrsDescription>,
    pub bounding_box: Option<BoundingBox>,
    pub corners: Option<Corners>,
    pub center: Option<Point>,
    pub resolution: Option<Resolution>,
    /// Area of the raster footprint in square CRS units
    pub area: Option<f64>,
    pub area_units: Option<String>,
    pub wgs84_bounds: Option<BoundingBox>,
    pub pixel_is_point: bool,
}

impl SpatialReport {
    pub fn has_geotransform(&self) -> bool {
        self.geotransform.is_some()
    }

    pub fn has_projection(&self) -> bool {
        self.crs.as_ref().map_or(false, |c| c.wkt.is_some())
    }

    pub fn epsg(&self) -> Option<u32> {
        self.crs.as_ref().and_then(|c| c.epsg)
    }
}

pub struct SpatialExtractor;

impl SpatialExtractor {
    pub fn extract(handle: &RasterHandle) -> SpatialReport {
        let crs = handle.crs().cloned();
        let pixel_is_point = handle.geo_info().is_pixel_is_point();

        let Some(gt) = handle.geotransform() else {
            debug!("{} has no geotransform", handle.path().display());
            return SpatialReport {
                geotransform: None,
                crs,
                bounding_box: None,
                corners: None,
                center: None,
                resolution: None,
                area: None,
                area_units: None,
                wgs84_bounds: None,
                pixel_is_point,
            };
        };

        let (width, height) = (handle.width(), handle.height());
        let (bbox, corners) = BoundingBox::from_geotransform(&gt, width, height);
        let units = resolution_units(crs.as_ref());

        // pixel footprint is the parallelogram spanned by the two columns of the affine matrix
        let pixel_area = (gt[1] * gt[5] - gt[2] * gt[4]).abs();
        let area = pixel_area * width as f64 * height as f64;

        let wgs84_bounds = crs.as_ref()
            .and_then(|c| c.epsg)
            .map(CoordinateSystemFactory::from_epsg)
            .filter(|system| system.converts_to_wgs84())
            .and_then(|system| {
                let points = [corners.upper_left, corners.upper_right, corners.lower_left, corners.lower_right];
                CoordinateTransformer.bounds_to_wgs84(&points, &system)
            });

        debug!("Extent {:?}, resolution {} x {} {}", bbox, gt[1].abs(), gt[5].abs(), units);

        SpatialReport {
            geotransform: Some(GeoTransformInfo::new(gt)),
            crs,
            bounding_box: Some(bbox),
            corners: Some(corners),
            center: Some(bbox.center()),
            resolution: Some(Resolution {
                x: gt[1].hypot(gt[4]),
                y: gt[2].hypot(gt[5]),
                units: units.clone(),
            }),
            area: Some(area),
            area_units: Some(format!("square {}", units)),
            wgs84_bounds,
            pixel_is_point,
        }
    }
}

/// Units of the geotransform coefficients
///
/// GeoKey units win; otherwise EPSG codes from 3000 up are taken as
/// metres and lower codes as degrees.
fn resolution_units(crs: Option<&CrsDescription>) -> String {
    let Some(crs) = crs else {
        return "unknown".to_string();
    };
    let from_keys = if crs.is_geographic { crs.angular_units.clone() } else { crs.linear_units.clone() };
    if let Some(units) = from_keys {
        return units;
    }
    match crs.epsg {
        Some(code) if code >= 3000 => "metre".to_string(),
        Some(_) => "degree".to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crs(epsg: Option<u32>, geographic: bool, linear: Option<&str>, angular: Option<&str>) -> CrsDescription {
        CrsDescription {
            epsg,
            name: None,
            authority: None,
            wkt: None,
            proj4: None,
            is_geographic: geographic,
            is_projected: !geographic,
            linear_units: linear.map(str::to_string),
            angular_units: angular.map(str::to_string),
        }
    }

    #[test]
    fn test_resolution_units() {
        assert_eq!(resolution_units(None), "unknown");
        assert_eq!(resolution_units(Some(&crs(Some(32633), false, Some("metre"), None))), "metre");
        assert_eq!(resolution_units(Some(&crs(Some(2263), false, Some("US survey foot"), None))), "US survey foot");
        assert_eq!(resolution_units(Some(&crs(Some(4326), true, None, Some("degree")))), "degree");
        assert_eq!(resolution_units(Some(&crs(Some(2154), false, None, None))), "degree");
        assert_eq!(resolution_units(Some(&crs(Some(3035), false, None, None))), "metre");
    }

    #[test]
    fn test_geotransform_info() {
        let info = GeoTransformInfo::new([10.0, 2.0, 0.0, 20.0, 0.0, -2.0]);
        assert_eq!(info.origin_y, 20.0);
        assert_eq!(info.pixel_height, -2.0);
        assert!(!info.is_rotated());
    }
}
