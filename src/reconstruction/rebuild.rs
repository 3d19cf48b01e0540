//! Raster reconstruction
//!
//! Rebuilds an approximation of the source raster from a reconstruction
//! package: same size, pixel type, geotransform, CRS and NoData, with every
//! pixel interpolated from the stored samples.

use std::io;
use std::path::Path;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Interpolation;
use crate::coordinate::CoordinateSystemFactory;
use crate::errors::{EngineResult, ExtractionError};
use crate::raster::{RasterSpec, RasterWriter, WriterOptions};
use crate::tiff::GeoKeySpec;
use crate::utils::xml_utils::GdalMetadataItem;

use super::package::{BandSummary, ReconstructionPackage};
use super::sample_index::{IndexedSample, Neighbor, SampleIndex};

/// What a reconstruction produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructionReport {
    pub output_path: String,
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub samples_used: usize,
    /// Bands without any sample, filled with NoData or the band mean
    pub filled_bands: Vec<usize>,
}

/// Per-pixel estimator
#[derive(Debug, Clone, Copy)]
pub struct Interpolator {
    pub method: Interpolation,
    pub k: usize,
    pub power: f64,
}

impl Interpolator {
    /// Estimate from neighbours sorted closest first
    pub fn estimate(&self, neighbors: &[Neighbor]) -> Option<f64> {
        let first = neighbors.first()?;
        if first.distance == 0.0 || self.method == Interpolation::Nearest {
            return Some(first.value);
        }
        let (weighted, weights) = neighbors.iter().fold((0.0, 0.0), |(sum, total), n| {
            let w = 1.0 / n.distance.powf(self.power);
            (sum + w * n.value, total + w)
        });
        Some(weighted / weights)
    }
}

pub struct Reconstructor {
    k_neighbors: usize,
    idw_power: f64,
}

impl Reconstructor {
    pub fn new(k_neighbors: usize, idw_power: f64) -> Self {
        Reconstructor { k_neighbors: k_neighbors.max(1), idw_power }
    }

    /// Rebuild the raster of `package` and write it to `output`
    pub fn reconstruct(&self, package: &ReconstructionPackage, output: &Path) -> EngineResult<ReconstructionReport> {
        package.validate()?;
        let dims = package.original_dimensions;
        let interpolator = Interpolator {
            method: package.creation_options.interpolation,
            k: self.k_neighbors,
            power: self.idw_power,
        };
        info!("Reconstructing {}x{}x{} raster of run {} from {} samples ({:?})",
              dims.width, dims.height, dims.bands, package.run_id, package.pixel_samples.len(), interpolator.method);

        let nodata = Self::output_nodata(package);
        let mut filled_bands = Vec::new();
        let mut bands = Vec::with_capacity(dims.bands);
        for band in 0..dims.bands {
            let samples: Vec<IndexedSample> = package.pixel_samples.iter()
                .filter_map(|s| s.band_values[band].map(|value| IndexedSample {
                    x: s.col as f64 + 0.5,
                    y: s.row as f64 + 0.5,
                    value,
                }))
                .collect();

            if samples.is_empty() {
                let fill = nodata
                    .or_else(|| package.band_summaries[band].map(|s| s.mean))
                    .unwrap_or(0.0);
                warn!("Band {} has no samples, filling with {}", band + 1, fill);
                filled_bands.push(band + 1);
                bands.push(vec![fill; dims.width * dims.height]);
                continue;
            }

            let index = SampleIndex::new(samples, dims.width, dims.height,
                                         package.grid_cell_size.width.max(package.grid_cell_size.height));
            bands.push(Self::interpolate_band(&index, &interpolator, dims.width,
                                              package.band_summaries[band], nodata));
            debug!("Band {} interpolated from {} samples", band + 1, index.len());
        }

        let spec = Self::raster_spec(package, nodata);
        let writer = RasterWriter::new(WriterOptions {
            compression: package.creation_options.compress.clone(),
            tiled: package.creation_options.tiled,
            block_size: package.creation_options.block_size as usize,
            ..WriterOptions::default()
        });
        writer.write(output, &spec, &bands).map_err(|e| ExtractionError::Io(io::Error::other(
            format!("cannot write reconstruction to {}: {}", output.display(), e))))?;

        Ok(ReconstructionReport {
            output_path: output.display().to_string(),
            width: dims.width,
            height: dims.height,
            bands: dims.bands,
            samples_used: package.pixel_samples.len(),
            filled_bands,
        })
    }

    fn interpolate_band(index: &SampleIndex, interpolator: &Interpolator, width: usize,
                        summary: Option<BandSummary>, nodata: Option<f64>) -> Vec<f64> {
        let height = index.height();
        let mut out = vec![0.0; width * height];
        let k = if interpolator.method == Interpolation::Nearest { 1 } else { interpolator.k };
        out.par_chunks_mut(width).enumerate().for_each(|(row, line)| {
            for (col, pixel) in line.iter_mut().enumerate() {
                let neighbors = index.nearest(col as f64 + 0.5, row as f64 + 0.5, k);
                let value = interpolator.estimate(&neighbors);
                *pixel = match (value, summary) {
                    (Some(v), Some(s)) => v.clamp(s.min, s.max),
                    (Some(v), None) => v,
                    (None, _) => nodata.unwrap_or(0.0),
                };
            }
        });
        out
    }

    /// The single NoData value of the output file
    ///
    /// A GeoTIFF holds one NoData value for all bands; the first band that
    /// has one decides, and every band's gaps are written with it.
    fn output_nodata(package: &ReconstructionPackage) -> Option<f64> {
        let bands = package.original_dimensions.bands;
        let shared = (0..bands).find_map(|b| package.nodata(b));
        for band in 0..bands {
            let own = package.nodata(band);
            let differs = match (own, shared) {
                (Some(a), Some(b)) => !(a == b || (a.is_nan() && b.is_nan())),
                (None, Some(_)) => true,
                _ => false,
            };
            if differs {
                warn!("Band {} NoData {:?} differs from the file NoData {:?}; its gaps use the file value",
                      band + 1, own, shared);
            }
        }
        shared
    }

    fn raster_spec(package: &ReconstructionPackage, nodata: Option<f64>) -> RasterSpec {
        let dims = package.original_dimensions;
        let mut spec = RasterSpec::new(dims.width, dims.height, package.pixel_type);
        spec.geotransform = package.geotransform;
        spec.geokeys = package.epsg.map(|epsg| GeoKeySpec {
            epsg: Some(epsg),
            geographic: CoordinateSystemFactory::from_epsg(epsg).is_geographic(),
            citation: Some(format!("Reconstructed from run {}", package.run_id)),
        });
        spec.nodata = nodata;

        spec.metadata.push(GdalMetadataItem::dataset("RECONSTRUCTED_FROM_RUN", &package.run_id));
        spec.metadata.push(GdalMetadataItem::dataset("SAMPLE_FRACTION", &package.sample_fraction.to_string()));
        spec.metadata.push(GdalMetadataItem::dataset("SAMPLE_COUNT", &package.pixel_samples.len().to_string()));
        for (band, role) in package.band_roles.iter().enumerate() {
            spec.metadata.push(GdalMetadataItem::band_role(band, "description", role.name()));
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruction::package::tests::package;
    use crate::extractor::nodata::NoDataValue;
    use crate::reconstruction::package::PixelSample;

    fn neighbor(distance: f64, value: f64) -> Neighbor {
        Neighbor { distance, value }
    }

    #[test]
    fn test_idw_estimate() {
        let idw = Interpolator { method: Interpolation::Idw, k: 8, power: 2.0 };
        assert_eq!(idw.estimate(&[neighbor(0.0, 3.0), neighbor(1.0, 9.0)]), Some(3.0));
        let mid = idw.estimate(&[neighbor(1.0, 0.0), neighbor(1.0, 10.0)]).unwrap();
        assert!((mid - 5.0).abs() < 1e-12);
        let near = idw.estimate(&[neighbor(1.0, 0.0), neighbor(2.0, 10.0)]).unwrap();
        assert!((near - 2.0).abs() < 1e-12);
        assert_eq!(idw.estimate(&[]), None);

        let nearest = Interpolator { method: Interpolation::Nearest, ..idw };
        assert_eq!(nearest.estimate(&[neighbor(1.0, 4.0), neighbor(1.5, 8.0)]), Some(4.0));
    }

    #[test]
    fn test_interpolation_is_clamped_to_band_range() {
        let samples = vec![(0, 0, 2.0), (3, 3, 20.0)].into_iter()
            .map(|(c, r, v)| IndexedSample { x: c as f64 + 0.5, y: r as f64 + 0.5, value: v })
            .collect();
        let index = SampleIndex::new(samples, 4, 4, 2);
        let interpolator = Interpolator { method: Interpolation::Idw, k: 8, power: 2.0 };
        let band = Reconstructor::interpolate_band(
            &index, &interpolator, 4, Some(BandSummary { min: 0.0, max: 10.0, mean: 5.0 }), None);
        assert_eq!(band[0], 2.0);
        assert_eq!(band[15], 10.0);
        assert!(band.iter().all(|v| (0.0..=10.0).contains(v)));
    }

    #[test]
    fn test_reconstruct_writes_raster() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rebuilt.tif");
        let samples = vec![
            PixelSample { x: 0.0, y: 0.0, col: 0, row: 0, band_values: vec![Some(1.0)] },
            PixelSample { x: 0.0, y: 0.0, col: 3, row: 3, band_values: vec![Some(9.0)] },
        ];
        let report = Reconstructor::new(8, 2.0).reconstruct(&package(4, 4, samples), &output).unwrap();
        assert!(output.exists());
        assert_eq!((report.width, report.height, report.samples_used), (4, 4, 2));
        assert!(report.filled_bands.is_empty());
    }

    #[test]
    fn test_bands_share_the_file_nodata() {
        let mut two = package(4, 4, vec![
            PixelSample { x: 0.0, y: 0.0, col: 1, row: 1, band_values: vec![Some(4.0), None] },
        ]);
        two.original_dimensions.bands = 2;
        two.nodata_values = vec![Some(NoDataValue(-9999.0)), Some(NoDataValue(0.0))];
        two.band_roles.push(two.band_roles[0]);
        two.band_summaries.push(None);
        two.band_storage.push(two.band_storage[0]);
        assert_eq!(Reconstructor::output_nodata(&two), Some(-9999.0));

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("shared.tif");
        let report = Reconstructor::new(8, 2.0).reconstruct(&two, &output).unwrap();
        assert_eq!(report.filled_bands, vec![2]);

        let mut handle = crate::raster::RasterHandle::open(&output, &Default::default()).unwrap();
        assert_eq!(handle.declared_nodata(), Some(-9999.0));
        let window = handle.windows(4)[0];
        let data = handle.read_window(&window).unwrap();
        assert!(data.bands[1].iter().all(|v| *v == -9999.0));
    }
}
