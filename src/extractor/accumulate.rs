//! Streaming accumulators
//!
//! Index summaries, RGB statistics and band correlations are computed in a
//! single windowed pass without retaining per-pixel arrays, so every value
//! goes through one of these.

use serde::Serialize;

/// Welford mean/variance accumulator with min and max
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    n: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

/// Summary of a finished accumulator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub valid_pixels: u64,
}

impl RunningStats {
    pub fn new() -> Self {
        RunningStats::default()
    }

    pub fn push(&mut self, value: f64) {
        if self.n == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation
    pub fn std(&self) -> f64 {
        if self.n == 0 { 0.0 } else { (self.m2 / self.n as f64).max(0.0).sqrt() }
    }

    /// None when no value was pushed
    pub fn summary(&self) -> Option<Summary> {
        (self.n > 0).then(|| Summary {
            mean: self.mean,
            std: self.std(),
            min: self.min,
            max: self.max,
            valid_pixels: self.n,
        })
    }
}

/// Streaming co-moment of two variables for Pearson correlation
#[derive(Debug, Clone, Copy, Default)]
pub struct CoMoments {
    n: u64,
    mean_x: f64,
    mean_y: f64,
    m2_x: f64,
    m2_y: f64,
    c_xy: f64,
}

impl CoMoments {
    pub fn push(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        let dy = y - self.mean_y;
        self.mean_y += dy / n;
        self.m2_x += dx * (x - self.mean_x);
        self.m2_y += dy * (y - self.mean_y);
        self.c_xy += dx * (y - self.mean_y);
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// Pearson correlation, None for fewer than `min_samples` pairs or a
    /// constant variable
    pub fn correlation(&self, min_samples: u64) -> Option<f64> {
        if self.n < min_samples.max(2) || self.m2_x <= 0.0 || self.m2_y <= 0.0 {
            return None;
        }
        Some((self.c_xy / (self.m2_x * self.m2_y).sqrt()).clamp(-1.0, 1.0))
    }
}
