//! Band statistics
//!
//! Streams the raster twice, window by window:
//!
//! 1. count, min, max and sum, keeping an exact copy of the valid values
//!    while it stays under the exact quantile cap
//! 2. sum of squared deviations around the pass-one mean, the display
//!    histogram and, for large bands, a fine quantile histogram
//!
//! Bands are independent, so a window's band accumulators are updated in
//! parallel when enabled; every band owns its accumulator, which keeps the
//! result independent of scheduling.

use std::collections::HashSet;

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::StatisticsConfig;
use crate::errors::EngineResult;
use crate::raster::{RasterHandle, WindowData};

use super::context::RunContext;
use super::nodata::is_valid;

const STAGE: &str = "statistics";

/// One histogram bin, `[bin_start, bin_end)` (the last bin is closed)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub count: u64,
}

/// How the quantiles were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    /// Sorted valid values with linear interpolation
    Exact,
    /// Interpolated from the quantile histogram
    Histogram,
}

/// Statistics of a band with at least one valid pixel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub quantile_method: QuantileMethod,
}

/// Everything the statistics stage knows about one band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandStatisticsOutcome {
    /// None when the band has no valid pixel
    pub statistics: Option<BandStatistics>,
    pub histogram: Vec<HistogramBin>,
    pub total_pixels: u64,
    pub valid_pixels: u64,
    pub nodata_pixels: u64,
    pub valid_pixel_ratio: f64,
}

/// Fixed-width bins over `[start, start + width * bins]`
#[derive(Debug, Clone)]
struct Histogram {
    start: f64,
    width: f64,
    counts: Vec<u64>,
}

impl Histogram {
    fn new(min: f64, max: f64, bins: usize) -> Self {
        let bins = if max > min { bins.max(1) } else { 1 };
        Histogram {
            start: min,
            width: if max > min { (max - min) / bins as f64 } else { 0.0 },
            counts: vec![0; bins],
        }
    }

    #[inline]
    fn bin_of(&self, value: f64) -> usize {
        if self.width <= 0.0 {
            return 0;
        }
        let index = ((value - self.start) / self.width).floor();
        if index <= 0.0 { 0 } else { (index as usize).min(self.counts.len() - 1) }
    }

    #[inline]
    fn add(&mut self, value: f64) {
        let bin = self.bin_of(value);
        self.counts[bin] += 1;
    }

    fn bins(&self) -> Vec<HistogramBin> {
        self.counts.iter().enumerate()
            .map(|(i, count)| HistogramBin {
                bin_start: self.start + self.width * i as f64,
                bin_end: self.start + self.width * (i + 1) as f64,
                count: *count,
            })
            .collect()
    }

    /// Value at quantile `q` of the `n` counted values
    ///
    /// Uses the same rank convention as the exact method and interpolates
    /// linearly inside the bin holding that rank.
    fn quantile(&self, q: f64, n: u64) -> f64 {
        if n == 0 {
            return self.start;
        }
        let rank = q * (n - 1) as f64;
        let mut below = 0u64;
        for (i, count) in self.counts.iter().enumerate() {
            if *count > 0 && (below + count) as f64 > rank {
                let within = (rank - below as f64 + 0.5) / *count as f64;
                return self.start + self.width * (i as f64 + within.clamp(0.0, 1.0));
            }
            below += count;
        }
        self.start + self.width * self.counts.len() as f64
    }
}

/// Quantile of sorted values with linear interpolation between ranks
pub fn exact_quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (position - lo as f64)
}

/// Histogram bin count for a band with `distinct` different values
pub fn histogram_bins(distinct: usize, config: &StatisticsConfig) -> usize {
    distinct.clamp(config.min_histogram_bins, config.max_histogram_bins)
}

/// Distinct valid values in a band sample
pub fn distinct_estimate(sample: &[f64], nodata: Option<f64>) -> usize {
    sample.iter()
        .filter(|v| is_valid(**v, nodata))
        .map(|v| v.to_bits())
        .collect::<HashSet<u64>>()
        .len()
}

/// Accumulator of one band across both passes
#[derive(Debug, Clone)]
pub struct BandAccumulator {
    nodata: Option<f64>,
    exact_cap: usize,
    seen: u64,
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
    exact: Option<Vec<f64>>,
    mean: f64,
    ssd: f64,
    histogram: Option<Histogram>,
    quantile_histogram: Option<Histogram>,
}

impl BandAccumulator {
    pub fn new(nodata: Option<f64>, exact_cap: usize) -> Self {
        BandAccumulator {
            nodata,
            exact_cap,
            seen: 0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            exact: Some(Vec::new()),
            mean: 0.0,
            ssd: 0.0,
            histogram: None,
            quantile_histogram: None,
        }
    }

    pub fn observe_first(&mut self, values: &[f64]) {
        self.seen += values.len() as u64;
        for &v in values {
            if !is_valid(v, self.nodata) {
                continue;
            }
            self.count += 1;
            self.min = self.min.min(v);
            self.max = self.max.max(v);
            self.sum += v;
            if let Some(exact) = self.exact.as_mut() {
                if exact.len() < self.exact_cap {
                    exact.push(v);
                } else {
                    self.exact = None;
                }
            }
        }
    }

    /// Bytes held by the exact value buffer
    pub fn exact_bytes(&self) -> u64 {
        self.exact.as_ref().map_or(0, |e| (e.capacity() * std::mem::size_of::<f64>()) as u64)
    }

    pub fn valid_count(&self) -> u64 {
        self.count
    }

    /// Prepare the second pass once the range is known
    pub fn begin_second(&mut self, display_bins: usize, quantile_bins: usize) {
        if self.count == 0 {
            return;
        }
        self.mean = self.sum / self.count as f64;
        self.histogram = Some(Histogram::new(self.min, self.max, display_bins));
        if self.exact.is_none() {
            self.quantile_histogram = Some(Histogram::new(self.min, self.max, quantile_bins));
        }
    }

    pub fn observe_second(&mut self, values: &[f64]) {
        if self.count == 0 {
            return;
        }
        for &v in values {
            if !is_valid(v, self.nodata) {
                continue;
            }
            let d = v - self.mean;
            self.ssd += d * d;
            if let Some(h) = self.histogram.as_mut() {
                h.add(v);
            }
            if let Some(h) = self.quantile_histogram.as_mut() {
                h.add(v);
            }
        }
    }

    pub fn finish(self) -> BandStatisticsOutcome {
        let total = self.seen;
        let ratio = if total > 0 { self.count as f64 / total as f64 } else { 0.0 };
        let histogram = self.histogram.as_ref().map(Histogram::bins).unwrap_or_default();

        let statistics = (self.count > 0).then(|| {
            let ((p25, median, p75), quantile_method) = match (self.exact, self.quantile_histogram.as_ref()) {
                (Some(mut exact), _) => {
                    exact.sort_unstable_by(f64::total_cmp);
                    let q = |p| exact_quantile(&exact, p);
                    ((q(0.25), q(0.5), q(0.75)), QuantileMethod::Exact)
                }
                (None, Some(h)) => {
                    let q = |p| h.quantile(p, self.count).clamp(self.min, self.max);
                    ((q(0.25), q(0.5), q(0.75)), QuantileMethod::Histogram)
                }
                (None, None) => ((self.mean, self.mean, self.mean), QuantileMethod::Histogram),
            };
            BandStatistics {
                min: self.min,
                max: self.max,
                mean: self.mean,
                std: (self.ssd / self.count as f64).sqrt(),
                median,
                p25,
                p75,
                quantile_method,
            }
        });

        BandStatisticsOutcome {
            statistics,
            histogram,
            total_pixels: total,
            valid_pixels: self.count,
            nodata_pixels: total - self.count,
            valid_pixel_ratio: ratio,
        }
    }
}

/// Drives the two statistics passes over a raster
pub struct StatisticsEngine<'a> {
    config: &'a StatisticsConfig,
}

impl<'a> StatisticsEngine<'a> {
    pub fn new(config: &'a StatisticsConfig) -> Self {
        StatisticsEngine { config }
    }

    /// Statistics of every band
    ///
    /// # Arguments
    /// * `ctx` - Run context; budgets are checked per window and all-NoData
    ///   bands are recorded as skipped
    /// * `handle` - Raster to stream
    /// * `nodata` - Effective NoData value per band
    /// * `samples` - Reservoir sample per band, for the bin count estimate
    ///
    /// # Returns
    /// One outcome per band, band-ordered, or the budget error that
    /// cancelled the run
    pub fn run(&self, ctx: &mut RunContext, handle: &mut RasterHandle, nodata: &[Option<f64>],
               samples: &[Vec<f64>]) -> EngineResult<Vec<BandStatisticsOutcome>> {
        let mut accumulators: Vec<BandAccumulator> = nodata.iter()
            .map(|nd| BandAccumulator::new(*nd, self.config.exact_quantile_cap))
            .collect();

        ctx.scan(handle, STAGE, 0, |data| {
            self.update(&mut accumulators, data, BandAccumulator::observe_first);
            let exact_bytes: u64 = accumulators.iter().map(BandAccumulator::exact_bytes).sum();
            ctx.check_memory(STAGE, data.byte_size() + exact_bytes)
        })?;

        for (i, acc) in accumulators.iter_mut().enumerate() {
            let distinct = samples.get(i).map_or(0, |s| distinct_estimate(s, acc.nodata));
            acc.begin_second(histogram_bins(distinct, self.config), self.config.quantile_bins);
        }

        ctx.scan(handle, STAGE, 0, |data| {
            self.update(&mut accumulators, data, BandAccumulator::observe_second);
            Ok(())
        })?;

        let outcomes: Vec<BandStatisticsOutcome> = accumulators.into_iter().map(BandAccumulator::finish).collect();
        for (i, outcome) in outcomes.iter().enumerate() {
            match outcome.statistics.as_ref() {
                Some(stats) => debug!("Band {}: min {} max {} mean {:.4} std {:.4} ({} valid)",
                                      i + 1, stats.min, stats.max, stats.mean, stats.std, outcome.valid_pixels),
                None => ctx.skip(STAGE, format!("band_{}", i + 1), "band contains only NoData pixels"),
            }
        }
        info!("Computed statistics for {} bands", outcomes.len());
        Ok(outcomes)
    }

    fn update(&self, accumulators: &mut [BandAccumulator], data: &WindowData, f: fn(&mut BandAccumulator, &[f64])) {
        if self.config.parallel && accumulators.len() > 1 {
            accumulators.par_iter_mut()
                .zip(data.bands.par_iter())
                .for_each(|(acc, values)| f(acc, values));
        } else {
            accumulators.iter_mut()
                .zip(&data.bands)
                .for_each(|(acc, values)| f(acc, values));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_band(values: &[f64], nodata: Option<f64>, cap: usize) -> BandStatisticsOutcome {
        let config = StatisticsConfig::default();
        let mut acc = BandAccumulator::new(nodata, cap);
        // two windows
        let (a, b) = values.split_at(values.len() / 2);
        acc.observe_first(a);
        acc.observe_first(b);
        acc.begin_second(histogram_bins(distinct_estimate(values, nodata), &config), config.quantile_bins);
        acc.observe_second(a);
        acc.observe_second(b);
        acc.finish()
    }

    #[test]
    fn test_constant_band() {
        let outcome = run_band(&[42.0; 100], None, 1000);
        let stats = outcome.statistics.unwrap();
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.median, 42.0);
        assert_eq!(outcome.histogram.len(), 1);
        assert_eq!(outcome.histogram[0].count, 100);
    }

    #[test]
    fn test_histogram_counts_valid_pixels() {
        let mut values: Vec<f64> = (0..1000).map(|v| (v % 97) as f64).collect();
        values.extend([-9999.0; 50]);
        values.push(f64::NAN);
        let outcome = run_band(&values, Some(-9999.0), 1_000_000);
        let hist_sum: u64 = outcome.histogram.iter().map(|b| b.count).sum();
        assert_eq!(outcome.total_pixels, 1051);
        assert_eq!(outcome.nodata_pixels, 51);
        assert_eq!(hist_sum, outcome.total_pixels - outcome.nodata_pixels);
        assert_eq!(outcome.histogram.len(), 97);
        assert!((0.0..=1.0).contains(&outcome.valid_pixel_ratio));
    }

    #[test]
    fn test_exact_quantiles_and_std() {
        let values: Vec<f64> = (1..=5).map(|v| v as f64).collect();
        let stats = run_band(&values, None, 100).statistics.unwrap();
        assert_eq!((stats.p25, stats.median, stats.p75), (2.0, 3.0, 4.0));
        assert!((stats.std - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.quantile_method, QuantileMethod::Exact);
        assert_eq!(exact_quantile(&[1.0, 2.0], 0.5), 1.5);
    }

    #[test]
    fn test_histogram_quantiles_above_cap() {
        let values: Vec<f64> = (0..10_001).map(|v| v as f64).collect();
        let stats = run_band(&values, None, 100).statistics.unwrap();
        assert_eq!(stats.quantile_method, QuantileMethod::Histogram);
        assert!((stats.median - 5000.0).abs() < 10.0, "median {}", stats.median);
        assert!((stats.p25 - 2500.0).abs() < 10.0, "p25 {}", stats.p25);
    }

    #[test]
    fn test_all_nodata_band() {
        let outcome = run_band(&[0.0; 10], Some(0.0), 100);
        assert!(outcome.statistics.is_none());
        assert!(outcome.histogram.is_empty());
        assert_eq!(outcome.valid_pixel_ratio, 0.0);
        assert_eq!(outcome.nodata_pixels, 10);
    }

    #[test]
    fn test_bin_count_bounds() {
        let config = StatisticsConfig::default();
        assert_eq!(histogram_bins(2, &config), 8);
        assert_eq!(histogram_bins(100, &config), 100);
        assert_eq!(histogram_bins(100_000, &config), 256);
    }
}
