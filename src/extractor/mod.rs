//! Extraction engine
//!
//! Stages that turn an opened raster into an [`ExtractionResult`]:
//! structural, spatial and metadata extraction, NoData and role
//! detection, band statistics, spectral indices, spectral analysis and
//! quality scoring. [`ExtractionPipeline`] runs them in order.

pub mod context;
pub mod accumulate;
pub mod sampling;
pub mod nodata;
pub mod sensors;
pub mod roles;
pub mod metadata;
pub mod structural;
pub mod spatial;
pub mod statistics;
pub mod indices;
pub mod spectral;
pub mod quality;
pub mod result;
pub mod pipeline;

pub use context::{RunContext, RunRequest, StageTiming};
pub use nodata::{NoDataSource, NoDataValue};
pub use roles::{BandRole, RoleSource};
pub use sensors::Sensor;
pub use quality::QualityScore;
pub use result::{BandReport, ComputedIndices, ExtractionResult, ProcessingSummary, SpatialSummary};
pub use pipeline::ExtractionPipeline;
