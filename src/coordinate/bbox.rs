//! Bounding box of a georeferenced raster

use serde::Serialize;

use super::point::Point;
use super::transform::pixel_to_geo;

/// The four corners of a raster in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Corners {
    pub upper_left: Point,
    pub upper_right: Point,
    pub lower_left: Point,
    pub lower_right: Point,
}

/// A bounding box in a coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox { min_x, min_y, max_x, max_y }
    }

    /// Smallest box containing all `points`
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = BoundingBox::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    /// Corners and extent of a `width` x `height` raster
    ///
    /// # Arguments
    /// * `geotransform` - `[origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h]`
    /// * `width` - Raster width in pixels
    /// * `height` - Raster height in pixels
    pub fn from_geotransform(geotransform: &[f64; 6], width: usize, height: usize) -> (Self, Corners) {
        let (w, h) = (width as f64, height as f64);
        let corners = Corners {
            upper_left: pixel_to_geo(geotransform, 0.0, 0.0),
            upper_right: pixel_to_geo(geotransform, w, 0.0),
            lower_left: pixel_to_geo(geotransform, 0.0, h),
            lower_right: pixel_to_geo(geotransform, w, h),
        };
        let points = [corners.upper_left, corners.upper_right, corners.lower_left, corners.lower_right];
        let bbox = BoundingBox::from_points(&points)
            .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0));
        (bbox, corners)
    }

    /// Get the width of the bounding box
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Get the height of the bounding box
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area in square map units
    pub fn area(&self) -> f64 {
        (self.width() * self.height()).abs()
    }

    /// Get the center point of the bounding box
    pub fn center(&self) -> Point {
        Point::new(
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
        )
    }

    /// Check if this bounding box contains a point
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x &&
            point.y >= self.min_y && point.y <= self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_north_up_extent() {
        let gt = [500_000.0, 10.0, 0.0, 4_000_000.0, 0.0, -10.0];
        let (bbox, corners) = BoundingBox::from_geotransform(&gt, 100, 50);
        assert_eq!(bbox, BoundingBox::new(500_000.0, 3_999_500.0, 501_000.0, 4_000_000.0));
        assert_eq!(corners.lower_right, Point::new(501_000.0, 3_999_500.0));
        assert_eq!(bbox.area(), 500_000.0);
        assert_eq!(bbox.center(), Point::new(500_500.0, 3_999_750.0));
        assert!(bbox.contains(&Point::new(500_001.0, 3_999_999.0)));
    }
}
