//! Run context
//!
//! Everything one extraction run carries through its stages: the run id,
//! the configuration, the budget, the list of skipped computations and the
//! stage timings. There is no global state; every stage receives the
//! context explicitly.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::config::{BudgetConfig, EngineConfig};
use crate::errors::{BudgetLimit, EngineResult, ExtractionError, SkippedComputation};
use crate::raster::{OpenOptions, RasterHandle, WindowData};
use crate::tiff::errors::TiffError;

/// Input of one extraction run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub path: PathBuf,
    pub run_id: String,
}

impl RunRequest {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        RunRequest { path: path.into(), run_id: run_id.into() }
    }

    /// Request whose run id is derived from the file stem
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let run_id = path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string());
        RunRequest { path, run_id }
    }
}

/// Wall-clock and memory limits of a run
#[derive(Debug, Clone)]
pub struct RunBudget {
    started: Instant,
    max_run: Duration,
    max_memory_bytes: u64,
}

impl RunBudget {
    pub fn new(config: &BudgetConfig) -> Self {
        RunBudget {
            started: Instant::now(),
            max_run: Duration::from_secs(config.max_run_seconds),
            max_memory_bytes: config.max_memory_bytes,
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fails once the wall-clock budget is spent
    pub fn check_time(&self) -> Result<(), BudgetLimit> {
        let elapsed = self.elapsed();
        if elapsed > self.max_run {
            return Err(BudgetLimit::WallClock {
                limit_secs: self.max_run.as_secs_f64(),
                elapsed_secs: elapsed.as_secs_f64(),
            });
        }
        Ok(())
    }

    /// Fails when `requested_bytes` of buffers would exceed the memory budget
    pub fn check_memory(&self, requested_bytes: u64) -> Result<(), BudgetLimit> {
        if requested_bytes > self.max_memory_bytes {
            return Err(BudgetLimit::Memory {
                limit_bytes: self.max_memory_bytes,
                requested_bytes,
            });
        }
        Ok(())
    }
}

/// Duration of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub millis: f64,
}

/// State of one extraction run
pub struct RunContext {
    pub run_id: String,
    pub config: EngineConfig,
    pub started_at: DateTime<Utc>,
    budget: RunBudget,
    skipped: Vec<SkippedComputation>,
    timings: Vec<StageTiming>,
}

impl RunContext {
    pub fn new(run_id: &str, config: EngineConfig) -> Self {
        let budget = RunBudget::new(&config.budget);
        RunContext {
            run_id: run_id.to_string(),
            config,
            started_at: Utc::now(),
            budget,
            skipped: Vec::new(),
            timings: Vec::new(),
        }
    }

    pub fn budget(&self) -> &RunBudget {
        &self.budget
    }

    /// Read limits for the raster handle of this run
    pub fn open_options(&self) -> OpenOptions {
        let reading = &self.config.reading;
        OpenOptions {
            deadline: Some(self.budget.started() + Duration::from_secs(reading.io_timeout_secs)),
            op_timeout: reading.op_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Record a computation that was skipped without failing the run
    pub fn skip(&mut self, stage: &str, item: impl Into<String>, reason: impl Into<String>) {
        let skipped = SkippedComputation::new(stage, item, reason);
        warn!("Run {}: {}", self.run_id, skipped);
        self.skipped.push(skipped);
    }

    /// Record skips collected by a stage that ran without the context
    pub fn record(&mut self, skipped: Vec<SkippedComputation>) {
        for entry in skipped {
            warn!("Run {}: {}", self.run_id, entry);
            self.skipped.push(entry);
        }
    }

    pub fn skipped(&self) -> &[SkippedComputation] {
        &self.skipped
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    /// Run `f` as stage `stage`, recording its duration
    pub fn time_stage<T>(&mut self, stage: &str, f: impl FnOnce(&mut Self) -> EngineResult<T>) -> EngineResult<T> {
        let started = Instant::now();
        let result = f(self);
        let millis = started.elapsed().as_secs_f64() * 1000.0;
        debug!("Run {}: stage {} took {:.1} ms", self.run_id, stage, millis);
        self.timings.push(StageTiming { stage: stage.to_string(), millis });
        result
    }

    /// Fail with `ResourceBudgetExceeded` once the time budget is spent
    pub fn check_time(&self, stage: &str) -> EngineResult<()> {
        self.budget.check_time().map_err(|limit| self.budget_error(stage, limit))
    }

    /// Fail with `ResourceBudgetExceeded` when `bytes` exceed the memory budget
    pub fn check_memory(&self, stage: &str, bytes: u64) -> EngineResult<()> {
        self.budget.check_memory(bytes).map_err(|limit| self.budget_error(stage, limit))
    }

    fn budget_error(&self, stage: &str, limit: BudgetLimit) -> ExtractionError {
        ExtractionError::ResourceBudgetExceeded {
            run_id: self.run_id.clone(),
            stage: stage.to_string(),
            limit,
            opened: true,
        }
    }

    /// Map a container error raised after the raster was opened
    pub fn raster_error(&self, error: TiffError, path: &Path, stage: &str) -> ExtractionError {
        ExtractionError::from_tiff(error, path, &self.run_id, stage, true)
    }

    /// Stream every window of `handle` through `f`
    ///
    /// The time and memory budgets are checked before each window is read;
    /// `extra_bytes` is added to the window buffer size for the memory
    /// check.
    pub fn scan(&self, handle: &mut RasterHandle, stage: &str, extra_bytes: u64,
                mut f: impl FnMut(&WindowData) -> EngineResult<()>) -> EngineResult<()> {
        let windows = handle.windows(self.config.reading.window_rows);
        let bands = handle.band_count() as u64;

        for window in &windows {
            self.check_time(stage)?;
            let window_bytes = window.pixels() as u64 * bands * std::mem::size_of::<f64>() as u64;
            self.check_memory(stage, window_bytes + extra_bytes)?;

            let data = handle.read_window(window)
                .map_err(|e| self.raster_error(e, handle.path(), stage))?;
            f(&data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_limits() {
        let budget = RunBudget::new(&BudgetConfig { max_run_seconds: 60, max_memory_bytes: 1000 });
        assert!(budget.check_time().is_ok());
        assert!(budget.check_memory(1000).is_ok());
        assert_eq!(budget.check_memory(1001),
                   Err(BudgetLimit::Memory { limit_bytes: 1000, requested_bytes: 1001 }));

        let expired = RunBudget::new(&BudgetConfig { max_run_seconds: 0, max_memory_bytes: 1000 });
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(expired.check_time(), Err(BudgetLimit::WallClock { .. })));
    }

    #[test]
    fn test_skips_and_timings_are_recorded() {
        let mut ctx = RunContext::new("run-7", EngineConfig::default());
        ctx.skip("indices", "ndvi", "red band has no valid pixels");
        let value = ctx.time_stage("structural", |_| Ok(3)).unwrap();
        assert_eq!(value, 3);
        assert_eq!(ctx.skipped().len(), 1);
        assert_eq!(ctx.skipped()[0].item, "ndvi");
        assert_eq!(ctx.timings()[0].stage, "structural");

        let err = ctx.check_memory("statistics", u64::MAX).unwrap_err();
        assert_eq!(err.kind(), "resource_budget_exceeded");
    }
}
