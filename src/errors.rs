//! Error types for the extraction engine
//!
//! `ExtractionError` is what a run returns when it cannot produce a result
//! at all. Local failures (one band, one index) are not errors: they are
//! recorded as [`SkippedComputation`] entries in the run's skip list.

use std::fmt;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::tiff::errors::TiffError;

/// Which budget a cancelled run ran out of
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetLimit {
    /// Wall-clock budget for the whole run
    WallClock { limit_secs: f64, elapsed_secs: f64 },
    /// Memory budget for window and exact-quantile buffers
    Memory { limit_bytes: u64, requested_bytes: u64 },
    /// A raster read hit the I/O deadline
    IoTimeout,
}

impl fmt::Display for BudgetLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetLimit::WallClock { limit_secs, elapsed_secs } =>
                write!(f, "wall clock {:.1}s of {:.1}s", elapsed_secs, limit_secs),
            BudgetLimit::Memory { limit_bytes, requested_bytes } =>
                write!(f, "memory {} of {} bytes", requested_bytes, limit_bytes),
            BudgetLimit::IoTimeout => write!(f, "I/O timeout"),
        }
    }
}

/// Fatal errors of an extraction or reconstruction run
#[derive(Debug)]
pub enum ExtractionError {
    /// The file cannot be opened or its structure cannot be read
    UnreadableRaster { path: String, reason: String },
    /// Pixel layout the engine cannot decode
    UnsupportedPixelType { bits: u16, sample_format: u16, reason: String },
    /// The run was cancelled by its time, memory or I/O budget
    ResourceBudgetExceeded { run_id: String, stage: String, limit: BudgetLimit, opened: bool },
    /// A reconstruction package that cannot be rebuilt
    InvalidPackage(String),
    /// Invalid engine configuration
    Config(String),
    /// I/O error outside raster decoding (writing results, reading packages)
    Io(io::Error),
}

impl ExtractionError {
    /// Map a container-level error raised while working on `path`
    ///
    /// Read timeouts become budget errors; everything else that is not a
    /// pixel layout problem makes the raster unreadable.
    pub fn from_tiff(error: TiffError, path: &Path, run_id: &str, stage: &str, opened: bool) -> Self {
        match error {
            TiffError::IoError(e) if e.kind() == io::ErrorKind::TimedOut => ExtractionError::ResourceBudgetExceeded {
                run_id: run_id.to_string(),
                stage: stage.to_string(),
                limit: BudgetLimit::IoTimeout,
                opened,
            },
            TiffError::UnsupportedSampleLayout { bits, sample_format, reason } =>
                ExtractionError::UnsupportedPixelType { bits, sample_format, reason },
            other => ExtractionError::UnreadableRaster {
                path: path.display().to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Short machine-friendly kind, used in logs and batch summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::UnreadableRaster { .. } => "unreadable_raster",
            ExtractionError::UnsupportedPixelType { .. } => "unsupported_pixel_type",
            ExtractionError::ResourceBudgetExceeded { .. } => "resource_budget_exceeded",
            ExtractionError::InvalidPackage(_) => "invalid_package",
            ExtractionError::Config(_) => "config",
            ExtractionError::Io(_) => "io",
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::UnreadableRaster { path, reason } =>
                write!(f, "Unreadable raster {}: {}", path, reason),
            ExtractionError::UnsupportedPixelType { bits, sample_format, reason } =>
                write!(f, "Unsupported pixel type ({} bits, sample format {}): {}", bits, sample_format, reason),
            ExtractionError::ResourceBudgetExceeded { run_id, stage, limit, opened } =>
                write!(f, "Run {} exceeded its {} budget during {}{}", run_id, limit, stage,
                       if *opened { "" } else { " (raster not opened)" }),
            ExtractionError::InvalidPackage(msg) => write!(f, "Invalid reconstruction package: {}", msg),
            ExtractionError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ExtractionError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ExtractionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractionError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ExtractionError {
    fn from(error: io::Error) -> Self {
        ExtractionError::Io(error)
    }
}

impl From<serde_json::Error> for ExtractionError {
    fn from(error: serde_json::Error) -> Self {
        ExtractionError::InvalidPackage(error.to_string())
    }
}

impl From<toml::de::Error> for ExtractionError {
    fn from(error: toml::de::Error) -> Self {
        ExtractionError::Config(error.to_string())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, ExtractionError>;

/// A computation that was skipped without failing the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedComputation {
    /// Pipeline stage, e.g. `statistics` or `indices`
    pub stage: String,
    /// What was skipped, e.g. `band_3` or `ndvi`
    pub item: String,
    pub reason: String,
}

impl SkippedComputation {
    pub fn new(stage: &str, item: impl Into<String>, reason: impl Into<String>) -> Self {
        SkippedComputation { stage: stage.to_string(), item: item.into(), reason: reason.into() }
    }
}

impl fmt::Display for SkippedComputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} skipped: {}", self.stage, self.item, self.reason)
    }
}
