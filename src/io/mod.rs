//! I/O primitives shared by the TIFF reader and the raster handle
//!
//! Byte order strategies, the seekable reader abstraction and the
//! deadline-aware reader that enforces per-run I/O timeouts.

pub mod byte_order;
pub mod seekable;
pub mod deadline;

pub use deadline::DeadlineReader;
