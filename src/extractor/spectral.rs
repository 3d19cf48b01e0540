//! Spectral analysis
//!
//! Band correlations and RGB colour statistics are accumulated in the same
//! windowed pass as the indices. Profile, curve, atmospheric and material
//! analysis then work from the band statistics alone.

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::SpectralConfig;
use crate::errors::SkippedComputation;
use crate::raster::WindowData;

use super::accumulate::{CoMoments, RunningStats, Summary};
use super::nodata::is_valid;
use super::roles::{BandRole, RoleMap};
use super::statistics::BandStatistics;

const STAGE: &str = "spectral";

/// Pearson correlation of two bands over their common valid pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCorrelation {
    pub band_a: usize,
    pub band_b: usize,
    pub correlation: f64,
    pub samples: u64,
}

/// Colour statistics of the red, green and blue bands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RgbAnalysis {
    /// `scale_255` or `min_max`
    pub normalization: String,
    pub brightness: Summary,
    pub saturation: Summary,
    /// Hue in degrees
    pub hue: Summary,
}

/// Mean value of a band with its role and wavelength
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileEntry {
    pub band: usize,
    pub role: BandRole,
    pub mean: Option<f64>,
    pub wavelength_nm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SteepestChange {
    pub slope: f64,
    /// Index into `slopes`
    pub position: usize,
}

/// Band means ordered by wavelength
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralCurve {
    pub wavelengths: Vec<f64>,
    pub values: Vec<f64>,
    /// Change per nanometre between neighbouring wavelengths
    pub slopes: Vec<f64>,
    /// `increasing` or `decreasing`
    pub overall_trend: String,
    pub steepest_change: SteepestChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtmosphericAnalysis {
    pub blue_mean: Option<f64>,
    pub blue_std: Option<f64>,
    /// `high` when the blue mean exceeds twice its standard deviation
    pub haze_indicator: Option<String>,
    pub blue_nir_ratio: Option<f64>,
    /// `clear` below a blue/NIR ratio of 0.5, `hazy` otherwise
    pub clarity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialHint {
    pub material: String,
    /// `high`, `medium` or `low`
    pub confidence: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermalStatistics {
    pub band: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

/// Spectral part of the computed indices group
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpectralReport {
    pub correlations: Vec<BandCorrelation>,
    pub rgb: Option<RgbAnalysis>,
    pub profile: Vec<ProfileEntry>,
    pub curve: Option<SpectralCurve>,
    pub atmospheric: Option<AtmosphericAnalysis>,
    pub material_hints: Vec<MaterialHint>,
    pub thermal: Vec<ThermalStatistics>,
}

impl SpectralReport {
    pub fn has_correlation(&self) -> bool {
        !self.correlations.is_empty()
    }
}

/// How RGB samples are brought into [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
enum RgbNormalization {
    Scale255,
    MinMax([(f64, f64); 3]),
}

impl RgbNormalization {
    fn from_statistics(stats: [&BandStatistics; 3]) -> Self {
        if stats.iter().all(|s| s.max <= 255.0) {
            RgbNormalization::Scale255
        } else {
            RgbNormalization::MinMax(stats.map(|s| (s.min, s.max)))
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RgbNormalization::Scale255 => "scale_255",
            RgbNormalization::MinMax(_) => "min_max",
        }
    }

    #[inline]
    fn apply(&self, channel: usize, value: f64) -> f64 {
        match self {
            RgbNormalization::Scale255 => value / 255.0,
            RgbNormalization::MinMax(ranges) => {
                let (min, max) = ranges[channel];
                if max > min { (value - min) / (max - min) } else { value }
            }
        }
    }
}

/// Brightness, saturation and hue (degrees) of normalized RGB
pub fn rgb_to_bsh(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let brightness = (r + g + b) / 3.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let saturation = if max > 0.0 { delta / max } else { 0.0 };

    let hue = if delta <= 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    (brightness, saturation, hue * 60.0)
}

#[derive(Debug, Clone)]
struct PairAccumulator {
    a: usize,
    b: usize,
    moments: CoMoments,
}

#[derive(Debug, Clone)]
struct RgbAccumulator {
    bands: [usize; 3],
    normalization: RgbNormalization,
    brightness: RunningStats,
    saturation: RunningStats,
    hue: RunningStats,
}

impl RgbAccumulator {
    fn observe(&mut self, data: &WindowData, nodata: &[Option<f64>]) {
        let [r, g, b] = self.bands;
        for p in 0..data.window.pixels() {
            let values = [data.bands[r][p], data.bands[g][p], data.bands[b][p]];
            if !values.iter().zip(self.bands).all(|(v, band)| is_valid(*v, nodata[band])) {
                continue;
            }
            let n = |c: usize| self.normalization.apply(c, values[c]);
            let (brightness, saturation, hue) = rgb_to_bsh(n(0), n(1), n(2));
            if brightness.is_finite() && saturation.is_finite() && hue.is_finite() {
                self.brightness.push(brightness);
                self.saturation.push(saturation);
                self.hue.push(hue);
            }
        }
    }
}

/// Band facts the analyzer reads besides the pixels
#[derive(Debug, Clone)]
pub struct SpectralBand {
    pub role: BandRole,
    pub nodata: Option<f64>,
    pub statistics: Option<BandStatistics>,
    pub wavelength_nm: Option<f64>,
}

/// Accumulates correlations and RGB statistics, then derives the rest
pub struct SpectralAnalyzer {
    bands: Vec<SpectralBand>,
    nodata: Vec<Option<f64>>,
    roles: RoleMap,
    min_correlation_samples: u64,
    pairs: Vec<PairAccumulator>,
    rgb: Option<RgbAccumulator>,
    skipped: Vec<SkippedComputation>,
}

impl SpectralAnalyzer {
    pub fn new(config: &SpectralConfig, bands: Vec<SpectralBand>) -> Self {
        let roles = RoleMap::from_roles(&bands.iter().map(|b| b.role).collect::<Vec<_>>());
        let nodata: Vec<Option<f64>> = bands.iter().map(|b| b.nodata).collect();
        let mut skipped = Vec::new();

        let usable: Vec<usize> = (0..bands.len()).filter(|i| bands[*i].statistics.is_some()).collect();
        let pairs = if bands.len() > config.max_correlation_bands {
            skipped.push(SkippedComputation::new(STAGE, "correlation_matrix",
                format!("{} bands exceed the correlation limit of {}", bands.len(), config.max_correlation_bands)));
            Vec::new()
        } else {
            usable.iter()
                .flat_map(|a| usable.iter().filter(move |b| *b > a).map(move |b| (*a, *b)))
                .map(|(a, b)| PairAccumulator { a, b, moments: CoMoments::default() })
                .collect()
        };

        let rgb = [BandRole::Red, BandRole::Green, BandRole::Blue]
            .map(|role| roles.band(role).map(|b| b - 1));
        let rgb = match rgb {
            [Some(r), Some(g), Some(b)] => {
                match (&bands[r].statistics, &bands[g].statistics, &bands[b].statistics) {
                    (Some(rs), Some(gs), Some(bs)) => Some(RgbAccumulator {
                        bands: [r, g, b],
                        normalization: RgbNormalization::from_statistics([rs, gs, bs]),
                        brightness: RunningStats::new(),
                        saturation: RunningStats::new(),
                        hue: RunningStats::new(),
                    }),
                    _ => {
                        skipped.push(SkippedComputation::new(STAGE, "rgb_analysis",
                            "a colour band contains only NoData pixels"));
                        None
                    }
                }
            }
            _ => None,
        };

        debug!("Spectral analysis: {} band pairs, rgb {}", pairs.len(), rgb.is_some());
        SpectralAnalyzer {
            bands,
            nodata,
            roles,
            min_correlation_samples: config.min_correlation_samples,
            pairs,
            rgb,
            skipped,
        }
    }

    /// Whether any accumulator reads pixels
    pub fn needs_pixels(&self) -> bool {
        !self.pairs.is_empty() || self.rgb.is_some()
    }

    pub fn observe(&mut self, data: &WindowData) {
        let nodata = &self.nodata;
        self.pairs.par_iter_mut().for_each(|pair| {
            let (a, b) = (&data.bands[pair.a], &data.bands[pair.b]);
            for (x, y) in a.iter().zip(b) {
                if is_valid(*x, nodata[pair.a]) && is_valid(*y, nodata[pair.b]) {
                    pair.moments.push(*x, *y);
                }
            }
        });
        if let Some(rgb) = self.rgb.as_mut() {
            rgb.observe(data, nodata);
        }
    }

    pub fn finish(self) -> (SpectralReport, Vec<SkippedComputation>) {
        let correlations: Vec<BandCorrelation> = self.pairs.iter()
            .filter_map(|pair| pair.moments.correlation(self.min_correlation_samples).map(|c| BandCorrelation {
                band_a: pair.a + 1,
                band_b: pair.b + 1,
                correlation: c,
                samples: pair.moments.count(),
            }))
            .collect();

        let rgb = self.rgb.as_ref().and_then(|acc| Some(RgbAnalysis {
            normalization: acc.normalization.name().to_string(),
            brightness: acc.brightness.summary()?,
            saturation: acc.saturation.summary()?,
            hue: acc.hue.summary()?,
        }));

        let profile: Vec<ProfileEntry> = self.bands.iter().enumerate()
            .map(|(i, band)| ProfileEntry {
                band: i + 1,
                role: band.role,
                mean: band.statistics.as_ref().map(|s| s.mean),
                wavelength_nm: band.wavelength_nm,
            })
            .collect();

        let report = SpectralReport {
            curve: spectral_curve(&profile),
            atmospheric: self.atmospheric(),
            material_hints: self.material_hints(),
            thermal: self.thermal(),
            correlations,
            rgb,
            profile,
        };
        info!("Spectral analysis: {} correlations, {} material hints",
              report.correlations.len(), report.material_hints.len());
        (report, self.skipped)
    }

    fn role_statistics(&self, role: BandRole) -> Option<&BandStatistics> {
        self.roles.band(role).and_then(|b| self.bands[b - 1].statistics.as_ref())
    }

    fn atmospheric(&self) -> Option<AtmosphericAnalysis> {
        let blue = self.role_statistics(BandRole::Blue)?;
        let nir = self.role_statistics(BandRole::Nir);
        let ratio = nir.filter(|n| n.mean != 0.0).map(|n| blue.mean / n.mean);
        Some(AtmosphericAnalysis {
            blue_mean: Some(blue.mean),
            blue_std: Some(blue.std),
            haze_indicator: Some(if blue.mean > 2.0 * blue.std { "high" } else { "low" }.to_string()),
            blue_nir_ratio: ratio,
            clarity: ratio.map(|r| if r < 0.5 { "clear" } else { "hazy" }.to_string()),
        })
    }

    fn material_hints(&self) -> Vec<MaterialHint> {
        let mut hints = Vec::new();
        let hint = |material: &str, confidence: &str, reason: &str| MaterialHint {
            material: material.to_string(),
            confidence: confidence.to_string(),
            reason: reason.to_string(),
        };
        let mean = |role| self.role_statistics(role).map(|s| s.mean).filter(|m| *m != 0.0);

        let (red, nir, swir) = (mean(BandRole::Red), mean(BandRole::Nir), mean(BandRole::Swir));
        if let (Some(red), Some(nir)) = (red, nir) {
            if nir > red * 1.5 {
                hints.push(hint("healthy_vegetation", "high", "NIR exceeds red by more than half"));
            } else if nir < red {
                hints.push(hint("bare_soil_or_urban", "medium", "NIR below red"));
            }
        }
        if let (Some(nir), Some(swir)) = (nir, swir) {
            if nir < swir * 0.5 {
                hints.push(hint("water_body", "medium", "NIR below half of SWIR"));
            }
        }

        let means: Vec<f64> = self.bands.iter().filter_map(|b| b.statistics.as_ref().map(|s| s.mean)).collect();
        if means.len() >= 2 {
            let mut spread = RunningStats::new();
            means.iter().for_each(|m| spread.push(*m));
            if spread.mean() > spread.std() * 3.0 {
                hints.push(hint("bright_surface", "low", "high overall level across bands"));
            }
        }
        hints
    }

    fn thermal(&self) -> Vec<ThermalStatistics> {
        self.bands.iter().enumerate()
            .filter(|(_, b)| b.role == BandRole::Thermal)
            .filter_map(|(i, b)| b.statistics.as_ref().map(|s| ThermalStatistics {
                band: i + 1,
                mean: s.mean,
                min: s.min,
                max: s.max,
                std: s.std,
            }))
            .collect()
    }
}

/// Curve over the bands with both a wavelength and a mean, if there are
/// at least three
fn spectral_curve(profile: &[ProfileEntry]) -> Option<SpectralCurve> {
    let mut points: Vec<(f64, f64)> = profile.iter()
        .filter_map(|p| Some((p.wavelength_nm?, p.mean?)))
        .collect();
    if points.len() < 3 {
        return None;
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points.dedup_by(|a, b| a.0 == b.0);
    if points.len() < 3 {
        return None;
    }

    let slopes: Vec<f64> = points.windows(2)
        .map(|w| (w[1].1 - w[0].1) / (w[1].0 - w[0].0))
        .collect();
    let (position, slope) = slopes.iter().copied().enumerate()
        .fold((0, 0.0f64), |best, (i, s)| if s.abs() > best.1.abs() { (i, s) } else { best });

    Some(SpectralCurve {
        wavelengths: points.iter().map(|p| p.0).collect(),
        values: points.iter().map(|p| p.1).collect(),
        overall_trend: if slopes.iter().sum::<f64>() > 0.0 { "increasing" } else { "decreasing" }.to_string(),
        slopes,
        steepest_change: SteepestChange { slope, position },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::statistics::QuantileMethod;
    use crate::raster::Window;

    fn stats(min: f64, max: f64, mean: f64, std: f64) -> Option<BandStatistics> {
        Some(BandStatistics {
            min, max, mean, std,
            median: mean, p25: mean, p75: mean,
            quantile_method: QuantileMethod::Exact,
        })
    }

    fn band(role: BandRole, statistics: Option<BandStatistics>, wavelength_nm: Option<f64>) -> SpectralBand {
        SpectralBand { role, nodata: None, statistics, wavelength_nm }
    }

    #[test]
    fn test_rgb_to_bsh() {
        let (b, s, h) = rgb_to_bsh(1.0, 0.0, 0.0);
        assert!((b - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!((s, h), (1.0, 0.0));
        assert_eq!(rgb_to_bsh(0.0, 1.0, 0.0).2, 120.0);
        assert_eq!(rgb_to_bsh(0.0, 0.0, 1.0).2, 240.0);
        assert_eq!(rgb_to_bsh(1.0, 0.0, 0.5).2, 330.0);
        assert_eq!(rgb_to_bsh(0.0, 0.0, 0.0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_correlation_and_rgb_from_windows() {
        let bands = vec![
            band(BandRole::Red, stats(0.0, 255.0, 100.0, 10.0), None),
            band(BandRole::Green, stats(0.0, 255.0, 100.0, 10.0), None),
            band(BandRole::Blue, stats(0.0, 255.0, 100.0, 10.0), None),
        ];
        let mut analyzer = SpectralAnalyzer::new(&SpectralConfig::default(), bands);
        let mut data = WindowData::new(Window::new(0, 2, 10), 3);
        for p in 0..20 {
            data.bands[0][p] = p as f64;
            data.bands[1][p] = 2.0 * p as f64;
            data.bands[2][p] = 255.0 - p as f64;
        }
        analyzer.observe(&data);
        let (report, skipped) = analyzer.finish();

        assert!(skipped.is_empty());
        assert_eq!(report.correlations.len(), 3);
        let rg = &report.correlations[0];
        assert_eq!((rg.band_a, rg.band_b, rg.samples), (1, 2, 20));
        assert!((rg.correlation - 1.0).abs() < 1e-9);
        assert!((report.correlations[1].correlation + 1.0).abs() < 1e-9);
        let rgb = report.rgb.unwrap();
        assert_eq!(rgb.normalization, "scale_255");
        assert_eq!(rgb.brightness.valid_pixels, 20);
    }

    #[test]
    fn test_spectral_curve() {
        let profile = vec![
            ProfileEntry { band: 1, role: BandRole::Red, mean: Some(0.1), wavelength_nm: Some(665.0) },
            ProfileEntry { band: 2, role: BandRole::Blue, mean: Some(0.2), wavelength_nm: Some(490.0) },
            ProfileEntry { band: 3, role: BandRole::Nir, mean: Some(0.5), wavelength_nm: Some(842.0) },
        ];
        let curve = spectral_curve(&profile).unwrap();
        assert_eq!(curve.wavelengths, vec![490.0, 665.0, 842.0]);
        assert_eq!(curve.overall_trend, "increasing");
        assert_eq!(curve.steepest_change.position, 1);
        assert!(spectral_curve(&profile[..2]).is_none());
    }

    #[test]
    fn test_atmosphere_materials_and_thermal() {
        let bands = vec![
            band(BandRole::Blue, stats(0.0, 1.0, 0.1, 0.02), Some(490.0)),
            band(BandRole::Green, stats(0.0, 1.0, 0.12, 0.02), Some(560.0)),
            band(BandRole::Red, stats(0.0, 1.0, 0.08, 0.02), Some(665.0)),
            band(BandRole::Nir, stats(0.0, 1.0, 0.4, 0.05), Some(842.0)),
            band(BandRole::Thermal, stats(280.0, 310.0, 295.0, 4.0), None),
        ];
        let analyzer = SpectralAnalyzer::new(&SpectralConfig::default(), bands);
        let (report, _) = analyzer.finish();

        let atmospheric = report.atmospheric.unwrap();
        assert_eq!(atmospheric.haze_indicator.as_deref(), Some("high"));
        assert_eq!(atmospheric.clarity.as_deref(), Some("clear"));
        assert!(report.material_hints.iter().any(|h| h.material == "healthy_vegetation"));
        assert_eq!(report.thermal.len(), 1);
        assert_eq!(report.thermal[0].band, 5);
        assert!(report.curve.is_some());
        assert!(report.rgb.is_none());
    }
}
