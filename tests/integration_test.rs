//! Integration tests for the extraction pipeline
//!
//! Every test writes a synthetic GeoTIFF with the crate's own writer into a
//! temporary directory and runs a full extraction over it.

use std::path::{Path, PathBuf};

use rasterlens::config::EngineConfig;
use rasterlens::errors::{BudgetLimit, ExtractionError};
use rasterlens::extractor::{BandRole, ExtractionResult, NoDataSource, RoleSource, RunRequest};
use rasterlens::tiff::GeoKeySpec;
use rasterlens::utils::xml_utils::GdalMetadataItem;
use rasterlens::{PixelType, RasterEngine, RasterSpec, RasterWriter, WriterOptions};

const UTM_GEOTRANSFORM: [f64; 6] = [500000.0, 10.0, 0.0, 4100000.0, 0.0, -10.0];

fn utm_spec(width: usize, height: usize, pixel_type: PixelType) -> RasterSpec {
    let mut spec = RasterSpec::new(width, height, pixel_type);
    spec.geotransform = Some(UTM_GEOTRANSFORM);
    spec.geokeys = Some(GeoKeySpec { epsg: Some(32633), geographic: false, citation: None });
    spec
}

fn write_raster(dir: &Path, name: &str, spec: &RasterSpec, bands: &[Vec<f64>]) -> PathBuf {
    write_with(dir, name, spec, bands, WriterOptions::default())
}

fn write_with(dir: &Path, name: &str, spec: &RasterSpec, bands: &[Vec<f64>], options: WriterOptions) -> PathBuf {
    let path = dir.join(name);
    RasterWriter::new(options).write(&path, spec, bands).unwrap();
    path
}

fn extract(path: &Path) -> ExtractionResult {
    RasterEngine::default().extract(&RunRequest::for_path(path)).unwrap()
}

#[test]
fn test_constant_band_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raster(dir.path(), "constant.tif", &utm_spec(20, 20, PixelType::U16), &[vec![42.0; 400]]);

    let result = extract(&path);
    let band = result.band(1).unwrap();
    let stats = band.statistics.as_ref().unwrap();
    assert_eq!(stats.std, 0.0);
    assert_eq!((stats.min, stats.max, stats.median), (42.0, 42.0, 42.0));
    assert_eq!(band.histogram.iter().filter(|b| b.count > 0).count(), 1);
    assert_eq!(band.nodata_source, NoDataSource::None);
    assert_eq!(band.valid_pixel_ratio, 1.0);
}

#[test]
fn test_histogram_covers_valid_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let (width, height) = (30, 30);
    let values: Vec<f64> = (0..width * height)
        .map(|i| if i < 2 * width { -9999.0 } else { ((i % width) * (i / width) % 50) as f64 })
        .collect();
    let mut spec = utm_spec(width, height, PixelType::F32);
    spec.nodata = Some(-9999.0);
    let path = write_raster(dir.path(), "holes.tif", &spec, &[values]);

    let result = extract(&path);
    let band = result.band(1).unwrap();
    let hist_sum: u64 = band.histogram.iter().map(|b| b.count).sum();
    assert_eq!(band.nodata_source, NoDataSource::Declared);
    assert_eq!(band.nodata_pixels, 60);
    assert_eq!(band.total_pixels, 900);
    assert_eq!(hist_sum, band.total_pixels - band.nodata_pixels);
    assert!((0.0..=1.0).contains(&band.valid_pixel_ratio));
    assert!(band.statistics.as_ref().unwrap().min >= 0.0);
}

#[test]
fn test_ndvi_of_constant_red_and_nir() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = utm_spec(16, 16, PixelType::F32);
    spec.metadata.push(GdalMetadataItem::band_role(0, "description", "Red"));
    spec.metadata.push(GdalMetadataItem::band_role(1, "description", "NIR"));
    let path = write_raster(dir.path(), "rn.tif", &spec, &[vec![100.0; 256], vec![200.0; 256]]);

    let result = extract(&path);
    assert_eq!(result.band(1).unwrap().role, BandRole::Red);
    assert_eq!(result.band(2).unwrap().role_source, RoleSource::Keyword);

    let ndvi = result.computed_indices.get("ndvi").unwrap();
    assert!((ndvi.summary.mean - 1.0 / 3.0).abs() < 1e-4);
    assert_eq!(ndvi.summary.std, 0.0);
    assert_eq!(ndvi.input_band_indices, vec![2, 1]);
    // the red/nir pair is already covered by named indices
    assert!(result.computed_indices.generic.is_empty());
}

#[test]
fn test_generic_pairs_need_common_valid_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let first: Vec<f64> = (1..=64).map(|v| v as f64).collect();
    let second: Vec<f64> = first.iter().map(|v| v * 2.0).collect();
    let path = write_raster(dir.path(), "pair.tif", &utm_spec(8, 8, PixelType::F32), &[first.clone(), second]);

    let result = extract(&path);
    assert!(result.computed_indices.named.is_empty());
    assert_eq!(result.computed_indices.generic.len(), 2);
    for index in &result.computed_indices.generic {
        assert_eq!(index.input_band_indices, vec![1, 2]);
    }

    let mut spec = utm_spec(8, 8, PixelType::F32);
    spec.nodata = Some(-9999.0);
    let path = write_raster(dir.path(), "empty_band.tif", &spec, &[first, vec![-9999.0; 64]]);
    let result = extract(&path);
    assert!(result.computed_indices.generic.is_empty());
    assert!(result.band(1).unwrap().declared_nodata_unused);
    assert_eq!(result.band(1).unwrap().nodata_value, None);
    assert!(result.band(2).unwrap().statistics.is_none());
}

#[test]
fn test_quality_score_of_all_nodata_raster() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = utm_spec(8, 8, PixelType::F32);
    spec.nodata = Some(-9999.0);
    let path = write_raster(dir.path(), "void.tif", &spec, &[vec![-9999.0; 64]]);

    let result = extract(&path);
    let score = result.quality_score();
    assert!((0.0..=110.0).contains(&score.total));
    assert_eq!(score.band_analysis, 0.0);
    let skipped = &result.processing_summary.skipped_computations;
    assert!(skipped.iter().any(|s| s.stage == "statistics" && s.item == "band_1"));
    assert!(result.reconstruction.pixel_samples.is_empty());
}

#[test]
fn test_single_band_grayscale_has_no_indices() {
    let dir = tempfile::tempdir().unwrap();
    let values: Vec<f64> = (0..256).map(|v| (v % 200 + 20) as f64).collect();
    let path = write_raster(dir.path(), "gray.tif", &utm_spec(16, 16, PixelType::U8), &[values]);

    let result = extract(&path);
    assert!(result.computed_indices.named.is_empty());
    assert!(result.computed_indices.generic.is_empty());
    assert!(result.computed_indices.spectral.rgb.is_none());
    assert_eq!(result.band(1).unwrap().role, BandRole::Unknown);
    assert_eq!(result.band(1).unwrap().color_interpretation, "Gray");
    assert_eq!(result.spatial_summary.spatial.epsg(), Some(32633));
}

#[test]
fn test_rgb_raster_uses_photometric_roles() {
    let dir = tempfile::tempdir().unwrap();
    let red: Vec<f64> = (0..100).map(|v| (v * 2) as f64).collect();
    let green: Vec<f64> = (0..100).map(|v| (v % 50 + 100) as f64).collect();
    let blue: Vec<f64> = (0..100).map(|v| (255 - v) as f64).collect();
    let path = write_raster(dir.path(), "rgb.tif", &utm_spec(10, 10, PixelType::U8), &[red, green, blue]);

    let result = extract(&path);
    let roles: Vec<BandRole> = result.band_details.iter().map(|b| b.role).collect();
    assert_eq!(roles, vec![BandRole::Red, BandRole::Green, BandRole::Blue]);
    assert_eq!(result.band(1).unwrap().role_source, RoleSource::Photometric);
    assert_eq!(result.band(3).unwrap().color_interpretation, "Blue");

    let rgb = result.computed_indices.spectral.rgb.as_ref().unwrap();
    assert_eq!(rgb.normalization, "scale_255");
    assert!((0.0..=1.0).contains(&rgb.brightness.mean));
    assert_eq!(result.computed_indices.spectral.correlations.len(), 3);
}

#[test]
fn test_tiled_and_striped_rasters_agree() {
    let dir = tempfile::tempdir().unwrap();
    let values: Vec<f64> = (0..40 * 30).map(|v| (v * 7 % 1000) as f64).collect();
    let spec = utm_spec(40, 30, PixelType::U16);
    let striped = write_raster(dir.path(), "striped.tif", &spec, &[values.clone()]);
    let tiled = write_with(dir.path(), "tiled.tif", &spec, &[values], WriterOptions {
        compression: "zstd".to_string(),
        tiled: true,
        block_size: 16,
        predictor: true,
        big_tiff: false,
    });

    let a = extract(&striped);
    let b = extract(&tiled);
    assert_eq!(a.band(1).unwrap().statistics, b.band(1).unwrap().statistics);
    assert_eq!(b.band(1).unwrap().block_width, 16);
    assert_eq!(b.spatial_summary.structural.structure.block_layout, "tile");
}

#[test]
fn test_memory_budget_cancels_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raster(dir.path(), "small.tif", &utm_spec(8, 8, PixelType::U8), &[vec![1.0; 64]]);

    let mut config = EngineConfig::default();
    config.budget.max_memory_bytes = 10;
    let err = RasterEngine::new(config).extract(&RunRequest::new(&path, "tight")).unwrap_err();
    match err {
        ExtractionError::ResourceBudgetExceeded { run_id, opened, .. } => {
            assert_eq!(run_id, "tight");
            assert!(opened);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_wall_clock_budget_cancels_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raster(dir.path(), "slow.tif", &utm_spec(8, 8, PixelType::U8), &[vec![1.0; 64]]);

    let mut config = EngineConfig::default();
    config.budget.max_run_seconds = 0;
    let err = RasterEngine::new(config).extract(&RunRequest::new(&path, "late")).unwrap_err();
    match err {
        ExtractionError::ResourceBudgetExceeded { run_id, limit, opened, .. } => {
            assert_eq!(run_id, "late");
            assert!(matches!(limit, BudgetLimit::WallClock { .. }));
            assert!(opened);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_io_deadline_cancels_run_before_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raster(dir.path(), "stalled.tif", &utm_spec(8, 8, PixelType::U8), &[vec![1.0; 64]]);

    let mut config = EngineConfig::default();
    config.reading.io_timeout_secs = 0;
    let err = RasterEngine::new(config).extract(&RunRequest::new(&path, "stalled")).unwrap_err();
    match err {
        ExtractionError::ResourceBudgetExceeded { limit, opened, .. } => {
            assert_eq!(limit, BudgetLimit::IoTimeout);
            assert!(!opened);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_elongated_raster_package_respects_sample_cap() {
    let dir = tempfile::tempdir().unwrap();
    let (width, height) = (2000, 2);
    let values: Vec<f64> = (0..width * height).map(|i| (i % 500) as f64).collect();
    let path = write_raster(dir.path(), "strip.tif", &utm_spec(width, height, PixelType::U16), &[values]);

    let mut config = EngineConfig::default();
    config.reconstruction.sample_fraction = 0.01;
    config.reconstruction.max_samples = 20;
    let result = RasterEngine::new(config).extract(&RunRequest::new(&path, "strip")).unwrap();
    let package = &result.reconstruction;
    assert_eq!(package.pixel_samples.len(), 20);
    assert_eq!(package.source_file.original_filename, "strip.tif");
    assert_eq!(package.band_storage[0].estimated_size_bytes, 8000);
    let summary = &result.spatial_summary.structural.summary;
    assert_eq!(summary.total_pixels, 4000);
    assert_eq!(summary.aspect_ratio, 1000.0);
}

#[test]
fn test_unreadable_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("notes.tif");
    std::fs::write(&text, "not a raster").unwrap();

    let engine = RasterEngine::default();
    let err = engine.extract(&RunRequest::for_path(&text)).unwrap_err();
    assert_eq!(err.kind(), "unreadable_raster");
    let err = engine.extract(&RunRequest::for_path(dir.path().join("missing.tif"))).unwrap_err();
    assert_eq!(err.kind(), "unreadable_raster");
}

#[test]
fn test_batch_keeps_request_order() {
    let dir = tempfile::tempdir().unwrap();
    let spec = utm_spec(8, 8, PixelType::U8);
    let requests = vec![
        RunRequest::new(write_raster(dir.path(), "a.tif", &spec, &[vec![1.0; 64]]), "a"),
        RunRequest::new(dir.path().join("missing.tif"), "missing"),
        RunRequest::new(write_raster(dir.path(), "c.tif", &spec, &[vec![3.0; 64]]), "c"),
    ];

    let outcomes = RasterEngine::default().extract_batch(&requests);
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].as_ref().unwrap().run_id(), "a");
    assert!(outcomes[1].is_err());
    assert_eq!(outcomes[2].as_ref().unwrap().band(1).unwrap().statistics.as_ref().unwrap().mean, 3.0);
}

#[test]
fn test_result_groups_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raster(dir.path(), "groups.tif", &utm_spec(8, 8, PixelType::U8), &[vec![5.0; 64]]);
    let result = extract(&path);

    let groups = result.groups().unwrap();
    let names: Vec<&str> = groups.keys().copied().collect();
    assert_eq!(names, vec!["band_details", "computed_indices", "processing_summary",
                           "raw_metadata", "reconstruction", "spatial_summary"]);
    assert_eq!(groups["processing_summary"]["run_id"], "groups");
    assert_eq!(groups["band_details"][0]["index"], 1);

    let written = result.write_groups(&dir.path().join("out")).unwrap();
    assert_eq!(written.len(), 6);
    assert!(written.iter().all(|p| p.exists()));
}
