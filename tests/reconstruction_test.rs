//! Extraction to reconstruction round trips

use std::path::Path;

use rasterlens::config::{EngineConfig, Interpolation};
use rasterlens::errors::ExtractionError;
use rasterlens::extractor::RunRequest;
use rasterlens::raster::OpenOptions;
use rasterlens::reconstruction::CellSize;
use rasterlens::tiff::GeoKeySpec;
use rasterlens::{PixelType, RasterEngine, RasterHandle, RasterSpec, RasterWriter, ReconstructionPackage, WriterOptions};

const GEOTRANSFORM: [f64; 6] = [300000.0, 30.0, 0.0, 5000000.0, 0.0, -30.0];

/// 10x10 two-band linear gradient: band 1 = 100 + x + y, band 2 = 200 + 2x
fn gradient(dir: &Path) -> std::path::PathBuf {
    let (width, height) = (10, 10);
    let mut first = Vec::with_capacity(width * height);
    let mut second = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            first.push(100.0 + x as f64 + y as f64);
            second.push(200.0 + 2.0 * x as f64);
        }
    }
    let mut spec = RasterSpec::new(width, height, PixelType::F32);
    spec.geotransform = Some(GEOTRANSFORM);
    spec.geokeys = Some(GeoKeySpec { epsg: Some(32632), geographic: false, citation: None });
    spec.nodata = Some(-9999.0);

    let path = dir.join("gradient.tif");
    RasterWriter::new(WriterOptions::default()).write(&path, &spec, &[first, second]).unwrap();
    path
}

fn band_means(path: &Path) -> Vec<f64> {
    let mut handle = RasterHandle::open(path, &OpenOptions::default()).unwrap();
    let bands = handle.band_count();
    let mut sums = vec![0.0; bands];
    let mut count = 0usize;
    for window in handle.windows(4) {
        let data = handle.read_window(&window).unwrap();
        for (sum, values) in sums.iter_mut().zip(&data.bands) {
            *sum += values.iter().sum::<f64>();
        }
        count += window.pixels();
    }
    sums.into_iter().map(|s| s / count as f64).collect()
}

fn engine(sample_fraction: f64, interpolation: Interpolation) -> RasterEngine {
    let mut config = EngineConfig::default();
    config.reconstruction.sample_fraction = sample_fraction;
    config.reconstruction.interpolation = interpolation;
    RasterEngine::new(config)
}

#[test]
fn test_gradient_round_trip_keeps_band_means() {
    let dir = tempfile::tempdir().unwrap();
    let source = gradient(dir.path());
    let engine = engine(0.2, Interpolation::Idw);

    let result = engine.extract(&RunRequest::new(&source, "gradient")).unwrap();
    let package = &result.reconstruction;
    assert_eq!(package.pixel_samples.len(), 20);
    assert_eq!(package.grid_cell_size, CellSize { width: 2, height: 3 });
    assert_eq!(package.source_file.original_filename, "gradient.tif");
    assert_eq!(package.source_file.driver, "GTiff");
    assert_eq!(package.epsg, Some(32632));

    let package_path = dir.path().join("package.json");
    package.save(&package_path).unwrap();
    let output = dir.path().join("rebuilt.tif");
    let report = engine.reconstruct_file(&package_path, &output).unwrap();
    assert_eq!((report.width, report.height, report.bands), (10, 10, 2));

    let original = band_means(&source);
    let rebuilt = band_means(&output);
    for (a, b) in original.iter().zip(&rebuilt) {
        assert!((a - b).abs() / a < 0.10, "mean {} rebuilt as {}", a, b);
    }

    let handle = RasterHandle::open(&output, &OpenOptions::default()).unwrap();
    assert_eq!(handle.geotransform(), Some(GEOTRANSFORM));
    assert_eq!(handle.pixel_type(), PixelType::F32);
    assert_eq!(handle.crs().and_then(|c| c.epsg), Some(32632));
}

#[test]
fn test_nearest_rebuild_stays_in_band_range() {
    let dir = tempfile::tempdir().unwrap();
    let source = gradient(dir.path());
    let engine = engine(0.05, Interpolation::Nearest);

    let result = engine.extract(&RunRequest::new(&source, "nearest")).unwrap();
    let output = dir.path().join("nearest.tif");
    engine.reconstruct(&result.reconstruction, &output).unwrap();

    let mut handle = RasterHandle::open(&output, &OpenOptions::default()).unwrap();
    for window in handle.windows(10) {
        let data = handle.read_window(&window).unwrap();
        assert!(data.bands[0].iter().all(|v| (100.0..=118.0).contains(v)));
        assert!(data.bands[1].iter().all(|v| (200.0..=218.0).contains(v)));
    }
}

#[test]
fn test_package_json_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let source = gradient(dir.path());
    let result = engine(0.2, Interpolation::Idw).extract(&RunRequest::new(&source, "reload")).unwrap();

    let text = result.reconstruction.to_json().unwrap();
    let parsed = ReconstructionPackage::from_json(&text).unwrap();
    assert_eq!(parsed.pixel_samples, result.reconstruction.pixel_samples);
    assert_eq!(parsed.original_dimensions, result.reconstruction.original_dimensions);
    assert_eq!(parsed.geotransform, Some(GEOTRANSFORM));
    // the declared -9999 never occurs in the gradient
    assert_eq!(parsed.nodata(0), None);
    assert!(result.band(1).unwrap().declared_nodata_unused);
}

#[test]
fn test_corrupt_package_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = gradient(dir.path());
    let engine = engine(0.2, Interpolation::Idw);
    let mut package = engine.extract(&RunRequest::new(&source, "corrupt")).unwrap().reconstruction;
    package.pixel_samples[0].row = 10;

    let err = engine.reconstruct(&package, &dir.path().join("never.tif")).unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidPackage(_)));
    assert!(!dir.path().join("never.tif").exists());
}
