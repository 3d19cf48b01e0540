//! Reconstruction packager
//!
//! Draws a stratified sample: the raster is cut into a grid of at most
//! `target` cells, and one pixel with at least one valid band is picked per
//! cell by a size-one reservoir. Cells are filled row by row as the windows
//! stream past, so only one row of cells is held at a time.

use chrono::Utc;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ReconstructionConfig;
use crate::coordinate::pixel_to_geo;
use crate::errors::EngineResult;
use crate::extractor::context::RunContext;
use crate::extractor::nodata::{is_valid, NoDataValue};
use crate::extractor::roles::BandRole;
use crate::raster::{PixelType, RasterHandle, WindowData};

use super::package::{BandStorage, BandSummary, CellSize, CreationOptions, Dimensions, PixelSample,
                     ReconstructionPackage, SourceFile, FORMAT_VERSION};

const STAGE: &str = "reconstruction";

/// Number of samples wanted for `valid_pixels` valid pixels
pub fn sample_target(valid_pixels: u64, fraction: f64, max_samples: usize) -> usize {
    let target = (valid_pixels as f64 * fraction).ceil() as usize;
    target.min(max_samples)
}

/// Stratification cell of a `width` x `height` raster
///
/// Starts from a square cell of the ideal area and widens it per axis, so
/// the grid never has more than `target` cells, also for strongly
/// elongated rasters.
pub fn grid_cell_size(width: usize, height: usize, target: usize) -> CellSize {
    let (width, height) = (width.max(1), height.max(1));
    if target == 0 {
        return CellSize { width, height };
    }

    let side = ((width * height) as f64 / target as f64).sqrt().ceil() as usize;
    let mut cell_height = side.clamp(1, height);
    if height.div_ceil(cell_height) > target {
        cell_height = height.div_ceil(target);
    }
    let across = (target / height.div_ceil(cell_height)).max(1);
    let cell_width = width.div_ceil(across).max(1);
    CellSize { width: cell_width, height: cell_height }
}

/// Raster facts the package carries
#[derive(Debug, Clone)]
pub struct PackageSource {
    pub width: usize,
    pub height: usize,
    pub pixel_type: PixelType,
    pub geotransform: Option<[f64; 6]>,
    pub projection_wkt: Option<String>,
    pub epsg: Option<u32>,
    pub nodata: Vec<Option<f64>>,
    pub roles: Vec<BandRole>,
    pub summaries: Vec<Option<BandSummary>>,
    /// Estimate of the pixels with at least one valid band
    pub valid_pixels: u64,
    pub file: SourceFile,
}

#[derive(Debug, Clone, Default)]
struct Cell {
    seen: u64,
    chosen: Option<(usize, usize, Vec<Option<f64>>)>,
}

/// Streams pixels into one reservoir per cell of the current cell row
struct StratifiedSampler<'a> {
    cell: CellSize,
    width: usize,
    nodata: &'a [Option<f64>],
    geotransform: Option<[f64; 6]>,
    rng: StdRng,
    current_row: usize,
    cells: Vec<Cell>,
    samples: Vec<PixelSample>,
}

impl<'a> StratifiedSampler<'a> {
    fn new(cell: CellSize, width: usize, nodata: &'a [Option<f64>], geotransform: Option<[f64; 6]>, seed: u64) -> Self {
        StratifiedSampler {
            cell,
            width,
            nodata,
            geotransform,
            rng: StdRng::seed_from_u64(seed),
            current_row: 0,
            cells: vec![Cell::default(); width.div_ceil(cell.width)],
            samples: Vec::new(),
        }
    }

    fn observe(&mut self, data: &WindowData) {
        let window = data.window;
        for r in 0..window.rows {
            let row = window.row + r;
            if row / self.cell.height != self.current_row {
                self.flush();
                self.current_row = row / self.cell.height;
            }
            for col in 0..self.width {
                let p = r * window.width + col;
                let valid = data.bands.iter().enumerate()
                    .any(|(b, values)| is_valid(values[p], self.nodata[b]));
                if !valid {
                    continue;
                }
                let slot = &mut self.cells[col / self.cell.width];
                slot.seen += 1;
                if self.rng.gen_range(0..slot.seen) == 0 {
                    let values = data.bands.iter().enumerate()
                        .map(|(b, values)| Some(values[p]).filter(|v| is_valid(*v, self.nodata[b])))
                        .collect();
                    slot.chosen = Some((col, row, values));
                }
            }
        }
    }

    fn flush(&mut self) {
        for cell in self.cells.iter_mut() {
            if let Some((col, row, band_values)) = cell.chosen.take() {
                let (cx, cy) = (col as f64 + 0.5, row as f64 + 0.5);
                let (x, y) = match self.geotransform.as_ref() {
                    Some(gt) => {
                        let point = pixel_to_geo(gt, cx, cy);
                        (point.x, point.y)
                    }
                    None => (cx, cy),
                };
                self.samples.push(PixelSample { x, y, col, row, band_values });
            }
            cell.seen = 0;
        }
    }

    fn finish(mut self) -> Vec<PixelSample> {
        self.flush();
        self.samples
    }
}

/// Builds the reconstruction package of a run
pub struct ReconstructionPackager<'a> {
    config: &'a ReconstructionConfig,
}

impl<'a> ReconstructionPackager<'a> {
    pub fn new(config: &'a ReconstructionConfig) -> Self {
        ReconstructionPackager { config }
    }

    /// Sample the raster and assemble the package
    ///
    /// # Arguments
    /// * `ctx` - Run context; supplies the run id and checks budgets per window
    /// * `handle` - Raster to sample
    /// * `source` - Facts gathered by the earlier stages
    pub fn package(&self, ctx: &RunContext, handle: &mut RasterHandle, source: PackageSource)
                   -> EngineResult<ReconstructionPackage> {
        let config = self.config;
        let target = sample_target(source.valid_pixels, config.sample_fraction, config.max_samples);
        let cell = grid_cell_size(source.width, source.height, target);
        debug!("Sampling {} of {} valid pixels with {}x{}px cells", target, source.valid_pixels,
               cell.width, cell.height);

        let pixel_samples = if target == 0 {
            Vec::new()
        } else {
            let mut sampler = StratifiedSampler::new(cell, source.width, &source.nodata,
                                                     source.geotransform, config.seed);
            ctx.scan(handle, STAGE, 0, |data| {
                sampler.observe(data);
                Ok(())
            })?;
            sampler.finish()
        };
        info!("Reconstruction package holds {} samples", pixel_samples.len());

        Ok(ReconstructionPackage {
            format_version: FORMAT_VERSION,
            run_id: ctx.run_id.clone(),
            created_at: Utc::now(),
            original_dimensions: Dimensions {
                width: source.width,
                height: source.height,
                bands: source.roles.len(),
            },
            geotransform: source.geotransform,
            projection_wkt: source.projection_wkt,
            epsg: source.epsg,
            pixel_type: source.pixel_type,
            nodata_values: source.nodata.iter().map(|v| v.map(NoDataValue)).collect(),
            band_roles: source.roles.clone(),
            band_summaries: source.summaries,
            band_storage: vec![BandStorage::new(source.width, source.height, source.pixel_type, config.block_size);
                               source.roles.len()],
            pixel_samples,
            sample_fraction: config.sample_fraction,
            grid_cell_size: cell,
            source_file: source.file,
            seed: config.seed,
            creation_options: CreationOptions {
                compress: config.compress.clone(),
                tiled: config.tiled,
                block_size: config.block_size,
                interpolation: config.interpolation,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Window;

    #[test]
    fn test_target_and_cell_size() {
        assert_eq!(sample_target(100, 0.05, 1000), 5);
        assert_eq!(sample_target(101, 0.05, 1000), 6);
        assert_eq!(sample_target(1_000_000, 0.5, 1000), 1000);
        assert_eq!(grid_cell_size(10, 10, 20), CellSize { width: 2, height: 3 });
        assert_eq!(grid_cell_size(10, 10, 100), CellSize { width: 1, height: 1 });
        assert_eq!(grid_cell_size(3, 2, 0), CellSize { width: 3, height: 2 });
    }

    fn cell_count(width: usize, height: usize, cell: CellSize) -> usize {
        width.div_ceil(cell.width) * height.div_ceil(cell.height)
    }

    #[test]
    fn test_cell_grid_never_exceeds_target() {
        for (width, height) in [(2000, 2), (2, 2000), (10, 10), (7, 3), (1, 1), (513, 97), (1, 10_000)] {
            for target in [1, 2, 5, 20, 99, 1000] {
                let cell = grid_cell_size(width, height, target);
                assert!(cell.width >= 1 && cell.height >= 1);
                assert!(cell_count(width, height, cell) <= target,
                        "{}x{} target {} gave {:?}", width, height, target, cell);
            }
        }
        // a long strip still uses most of its budget
        let cell = grid_cell_size(2000, 2, 20);
        assert_eq!(cell_count(2000, 2, cell), 20);
    }

    #[test]
    fn test_elongated_raster_respects_target() {
        let nodata = [None];
        let (width, height) = (2000, 2);
        let cell = grid_cell_size(width, height, 20);
        let mut sampler = StratifiedSampler::new(cell, width, &nodata, None, 1);
        let mut data = WindowData::new(Window::new(0, height, width), 1);
        data.bands[0] = (0..width * height).map(|v| v as f64).collect();
        sampler.observe(&data);
        let samples = sampler.finish();
        assert_eq!(samples.len(), 20);
    }

    #[test]
    fn test_one_sample_per_cell() {
        let nodata = [Some(0.0)];
        let mut sampler = StratifiedSampler::new(CellSize { width: 2, height: 2 }, 4, &nodata, None, 42);
        // two windows of two rows, rows 2-3 all NoData in the left half
        let mut top = WindowData::new(Window::new(0, 2, 4), 1);
        top.bands[0] = (1..=8).map(|v| v as f64).collect();
        let mut bottom = WindowData::new(Window::new(2, 2, 4), 1);
        bottom.bands[0] = vec![0.0, 0.0, 5.0, 6.0, 0.0, 0.0, 7.0, 8.0];
        sampler.observe(&top);
        sampler.observe(&bottom);
        let samples = sampler.finish();

        assert_eq!(samples.len(), 3);
        for sample in &samples {
            assert!(sample.band_values[0].is_some());
            assert_eq!(sample.x, sample.col as f64 + 0.5);
        }
        assert!(samples[2].col >= 2 && samples[2].row >= 2);
    }
}
