//! Engine configuration
//!
//! Every tunable of a run lives here, grouped by pipeline stage. The
//! configuration is read from TOML; any key that is left out falls back to
//! its default, so an empty document is a valid configuration.
//!
//! ```toml
//! [budget]
//! max_run_seconds = 120
//!
//! [reconstruction]
//! sample_fraction = 0.1
//! interpolation = "nearest"
//! ```

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineResult, ExtractionError};

/// Raster reading options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    /// Seconds after the run start after which any raster read fails
    pub io_timeout_secs: u64,
    /// Upper bound for a single read call, in seconds
    pub op_timeout_secs: Option<u64>,
    /// Minimum rows per processing window, rounded up to the block height
    pub window_rows: usize,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            io_timeout_secs: 300,
            op_timeout_secs: None,
            window_rows: 256,
        }
    }
}

/// Run budgets checked between windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_run_seconds: u64,
    pub max_memory_bytes: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig {
            max_run_seconds: 600,
            max_memory_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// NoData detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoDataConfig {
    /// Reservoir sample size per band
    pub sample_size: usize,
    /// Share of the sample a sentinel candidate (-9999, NaN) needs
    pub presence_threshold: f64,
    /// Share of the sample an ordinary value (0, type extremes) needs
    pub dominant_threshold: f64,
    pub seed: u64,
}

impl Default for NoDataConfig {
    fn default() -> Self {
        NoDataConfig {
            sample_size: 10_000,
            presence_threshold: 0.001,
            dominant_threshold: 0.10,
            seed: 42,
        }
    }
}

/// Band statistics options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Valid pixel count up to which quantiles are exact
    pub exact_quantile_cap: usize,
    /// Bins of the histogram used for approximate quantiles
    pub quantile_bins: usize,
    pub max_histogram_bins: usize,
    pub min_histogram_bins: usize,
    /// Update band accumulators in parallel
    pub parallel: bool,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        StatisticsConfig {
            exact_quantile_cap: 1_000_000,
            quantile_bins: 4096,
            max_histogram_bins: 256,
            min_histogram_bins: 8,
            parallel: true,
        }
    }
}

/// Index calculator options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicesConfig {
    /// Soil brightness correction factor of SAVI
    pub savi_l: f64,
    /// Denominators with an absolute value at or below this are undefined
    pub epsilon: f64,
    /// Compute pairwise ratio / normalized difference entries
    pub generic_pairs: bool,
    /// Band count above which generic pairs are skipped
    pub max_generic_bands: usize,
}

impl Default for IndicesConfig {
    fn default() -> Self {
        IndicesConfig {
            savi_l: 0.5,
            epsilon: 1e-10,
            generic_pairs: true,
            max_generic_bands: 32,
        }
    }
}

/// Spectral analyzer options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Common valid pixels a band pair needs for a correlation value
    pub min_correlation_samples: u64,
    /// Band count above which the correlation matrix is skipped
    pub max_correlation_bands: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        SpectralConfig {
            min_correlation_samples: 10,
            max_correlation_bands: 32,
        }
    }
}

/// Quality scoring options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Bands with a lower valid pixel ratio cost band-analysis points
    pub near_zero_valid_ratio: f64,
    /// Metadata domains that earn the full metadata score
    pub expected_metadata_domains: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            near_zero_valid_ratio: 0.01,
            expected_metadata_domains: 4,
        }
    }
}

/// How the reconstructor fills pixels between samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Inverse distance weighting over the k nearest samples
    Idw,
    /// Value of the nearest sample
    Nearest,
}

/// Reconstruction sampling and output options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub sample_fraction: f64,
    pub max_samples: usize,
    pub seed: u64,
    pub interpolation: Interpolation,
    pub k_neighbors: usize,
    pub idw_power: f64,
    /// Output compression: none, deflate, lzw, zstd or packbits
    pub compress: String,
    pub tiled: bool,
    pub block_size: u32,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        ReconstructionConfig {
            sample_fraction: 0.01,
            max_samples: 10_000,
            seed: 42,
            interpolation: Interpolation::Idw,
            k_neighbors: 8,
            idw_power: 2.0,
            compress: "deflate".to_string(),
            tiled: false,
            block_size: 256,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub reading: ReadingConfig,
    pub budget: BudgetConfig,
    pub nodata: NoDataConfig,
    pub statistics: StatisticsConfig,
    pub indices: IndicesConfig,
    pub spectral: SpectralConfig,
    pub quality: QualityConfig,
    pub reconstruction: ReconstructionConfig,
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        debug!("Parsed engine configuration: {:?}", config);
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> EngineResult<Self> {
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| ExtractionError::Config(
            format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject values no stage can work with
    pub fn validate(&self) -> EngineResult<()> {
        let fraction = self.reconstruction.sample_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ExtractionError::Config(format!(
                "reconstruction.sample_fraction must be in (0, 1], got {}", fraction)));
        }
        if self.reconstruction.k_neighbors == 0 {
            return Err(ExtractionError::Config("reconstruction.k_neighbors must be at least 1".into()));
        }
        if self.reconstruction.tiled && self.reconstruction.block_size % 16 != 0 {
            return Err(ExtractionError::Config(format!(
                "reconstruction.block_size must be a multiple of 16 for tiled output, got {}",
                self.reconstruction.block_size)));
        }
        if self.nodata.sample_size == 0 {
            return Err(ExtractionError::Config("nodata.sample_size must be at least 1".into()));
        }
        if self.statistics.min_histogram_bins == 0
            || self.statistics.min_histogram_bins > self.statistics.max_histogram_bins {
            return Err(ExtractionError::Config(
                "statistics histogram bin bounds must satisfy 0 < min <= max".into()));
        }
        if self.statistics.quantile_bins < 2 {
            return Err(ExtractionError::Config("statistics.quantile_bins must be at least 2".into()));
        }
        if self.reading.window_rows == 0 {
            return Err(ExtractionError::Config("reading.window_rows must be at least 1".into()));
        }
        if self.quality.expected_metadata_domains == 0 {
            return Err(ExtractionError::Config("quality.expected_metadata_domains must be at least 1".into()));
        }
        Ok(())
    }
}
