//! Coordinate transformation functionality
//!
//! Affine pixel/map conversions plus the inverse projections needed to
//! report WGS 84 bounds for Web Mercator and UTM rasters.

use std::f64::consts::PI;

use super::bbox::BoundingBox;
use super::crs::CoordinateSystem;
use super::point::Point;

/// Map coordinates of pixel position (`col`, `row`)
///
/// Positions are continuous: (0, 0) is the outer upper-left corner and
/// (col + 0.5, row + 0.5) the centre of a pixel.
pub fn pixel_to_geo(geotransform: &[f64; 6], col: f64, row: f64) -> Point {
    Point::new(
        geotransform[0] + col * geotransform[1] + row * geotransform[2],
        geotransform[3] + col * geotransform[4] + row * geotransform[5],
    )
}

/// Transformer for converting coordinates to WGS 84
pub struct CoordinateTransformer;

impl CoordinateTransformer {
    /// Earth radius in meters
    const EARTH_RADIUS: f64 = 6378137.0;
    /// WGS 84 flattening
    const FLATTENING: f64 = 1.0 / 298.257223563;
    /// UTM scale factor on the central meridian
    const UTM_K0: f64 = 0.9996;

    /// Convert from Web Mercator (EPSG:3857) to WGS84 (EPSG:4326)
    pub fn web_mercator_to_wgs84(&self, x: f64, y: f64) -> Point {
        let lon = x * 180.0 / (Self::EARTH_RADIUS * PI);
        let lat = 180.0 / PI * (2.0 * f64::atan(f64::exp(y / Self::EARTH_RADIUS)) - PI / 2.0);

        Point::new(lon, lat)
    }

    /// Convert UTM easting/northing on WGS 84 to longitude/latitude
    ///
    /// Inverse transverse Mercator series; sub-metre accurate inside the
    /// zone.
    pub fn utm_to_wgs84(&self, easting: f64, northing: f64, zone: u8, is_northern: bool) -> Point {
        let a = Self::EARTH_RADIUS;
        let e2 = Self::FLATTENING * (2.0 - Self::FLATTENING);
        let ep2 = e2 / (1.0 - e2);
        let k0 = Self::UTM_K0;

        let x = easting - 500_000.0;
        let y = if is_northern { northing } else { northing - 10_000_000.0 };

        let m = y / k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin1, cos1, tan1) = (phi1.sin(), phi1.cos(), phi1.tan());
        let n1 = a / (1.0 - e2 * sin1 * sin1).sqrt();
        let t1 = tan1 * tan1;
        let c1 = ep2 * cos1 * cos1;
        let r1 = a * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = x / (n1 * k0);

        let lat = phi1 - (n1 * tan1 / r1) * (d * d / 2.0
            - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
            + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1) * d.powi(6) / 720.0);
        let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5) / 120.0)
            / cos1;

        Point::new(CoordinateSystem::central_meridian(zone) + lon.to_degrees(), lat.to_degrees())
    }

    /// Convert a point to WGS 84
    ///
    /// # Returns
    /// None for coordinate systems without a built-in inverse
    pub fn to_wgs84(&self, point: &Point, system: &CoordinateSystem) -> Option<Point> {
        match system {
            CoordinateSystem::WGS84 => Some(*point),
            CoordinateSystem::WebMercator => Some(self.web_mercator_to_wgs84(point.x, point.y)),
            CoordinateSystem::UTM(zone, is_northern) => Some(self.utm_to_wgs84(point.x, point.y, *zone, *is_northern)),
            CoordinateSystem::Other(_) => None,
        }
    }

    /// WGS 84 bounds of a set of corner points
    pub fn bounds_to_wgs84(&self, corners: &[Point], system: &CoordinateSystem) -> Option<BoundingBox> {
        let converted = corners.iter()
            .map(|p| self.to_wgs84(p, system))
            .collect::<Option<Vec<_>>>()?;
        BoundingBox::from_points(&converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_pixel_to_geo_with_rotation() {
        let gt = [100.0, 2.0, 0.5, 200.0, 0.25, -2.0];
        assert_eq!(pixel_to_geo(&gt, 1.0, 2.0), Point::new(103.0, 196.25));
    }

    #[test]
    fn test_web_mercator_origin_and_edge() {
        let t = CoordinateTransformer;
        let p = t.web_mercator_to_wgs84(0.0, 0.0);
        assert!(close(p.x, 0.0, 1e-9) && close(p.y, 0.0, 1e-9));
        let p = t.web_mercator_to_wgs84(20_037_508.342789244, 0.0);
        assert!(close(p.x, 180.0, 1e-6));
    }

    #[test]
    fn test_utm_central_meridian_on_equator() {
        let t = CoordinateTransformer;
        let p = t.utm_to_wgs84(500_000.0, 0.0, 33, true);
        assert!(close(p.x, 15.0, 1e-9));
        assert!(close(p.y, 0.0, 1e-9));

        // Berlin, roughly 52.52N 13.40E, in zone 33N
        let p = t.utm_to_wgs84(391_780.0, 5_820_080.0, 33, true);
        assert!(close(p.x, 13.40, 0.01), "lon {}", p.x);
        assert!(close(p.y, 52.52, 0.01), "lat {}", p.y);
    }

    #[test]
    fn test_unknown_system_has_no_wgs84_bounds() {
        let t = CoordinateTransformer;
        let corners = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        assert!(t.bounds_to_wgs84(&corners, &CoordinateSystem::Other(2154)).is_none());
        let bbox = t.bounds_to_wgs84(&corners, &CoordinateSystem::WGS84).unwrap();
        assert_eq!(bbox.max_x, 1.0);
    }
}
