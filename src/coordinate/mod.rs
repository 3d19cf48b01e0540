//! Coordinate handling for geospatial data
//!
//! This module provides structures and functionality for handling
//! coordinate systems, raster extents and the conversions used to report
//! them.

mod bbox;
mod point;
mod transform;
mod crs;

// Re-export key types
pub use self::bbox::{BoundingBox, Corners};
pub use self::point::Point;
pub use self::transform::{pixel_to_geo, CoordinateTransformer};
pub use self::crs::{angular_unit_name, linear_unit_name, CoordinateSystem, CoordinateSystemFactory, CrsDescription};
