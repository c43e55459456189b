mod common;

use common::{example_feature, feature_shifted, fixture_bytes, fixture_origin, test_pool};
use dristi::core::raster::{window_from_bounds, GeoTransform};
use dristi::core::reconciler::GeometryReconciler;
use dristi::utils::error::ErrorCategory;
use dristi::{
    AreaOfInterest, CogStatsPipeline, LocalArtifactStore, RasterSource, ServiceConfig, StatsEngine,
};
use httpmock::prelude::*;
use tempfile::TempDir;

fn engine_for(dir: &TempDir) -> StatsEngine<CogStatsPipeline<LocalArtifactStore>> {
    let store = LocalArtifactStore::new(dir.path());
    let pipeline = CogStatsPipeline::from_config(store, &ServiceConfig::default(), test_pool());
    StatsEngine::new(pipeline)
}

fn aoi(value: serde_json::Value) -> AreaOfInterest {
    AreaOfInterest::from_json_value(value).unwrap()
}

#[tokio::test]
async fn test_end_to_end_constant_raster() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    let cog_mock = server.mock(|when, then| {
        when.method(GET).path("/cogs/example.tif");
        then.status(200)
            .header("Content-Type", "image/tiff")
            .body(fixture_bytes(|_, _| 42.0));
    });

    let engine = engine_for(&temp_dir);
    let source = RasterSource::parse(&server.url("/cogs/example.tif")).unwrap();
    let result = engine.run(&source, aoi(example_feature())).await.unwrap();

    cog_mock.assert();
    let mean = result.mean.expect("polygon overlaps the raster");
    assert!((mean - 42.0).abs() < 1e-9, "mean was {}", mean);
    assert!(temp_dir.path().join("example.tif").exists());
}

#[tokio::test]
async fn test_repeated_request_reuses_cached_raster() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    let cog_mock = server.mock(|when, then| {
        when.method(GET).path("/cogs/cached.tif");
        then.status(200).body(fixture_bytes(|_, _| 7.0));
    });

    let engine = engine_for(&temp_dir);
    let source = RasterSource::parse(&server.url("/cogs/cached.tif")).unwrap();

    let first = engine.run(&source, aoi(example_feature())).await.unwrap();
    let second = engine.run(&source, aoi(example_feature())).await.unwrap();

    assert_eq!(first, second);
    cog_mock.assert_hits(1);
}

#[tokio::test]
async fn test_refresh_downloads_again() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    let cog_mock = server.mock(|when, then| {
        when.method(GET).path("/cogs/fresh.tif");
        then.status(200).body(fixture_bytes(|_, _| 3.0));
    });

    let engine = engine_for(&temp_dir);
    let source = RasterSource::parse(&server.url("/cogs/fresh.tif")).unwrap();
    engine.run(&source, aoi(example_feature())).await.unwrap();

    let refreshed = source.clone().with_refresh(true);
    engine.run(&refreshed, aoi(example_feature())).await.unwrap();

    cog_mock.assert_hits(2);
}

#[tokio::test]
async fn test_gradient_raster_mean_matches_window() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/cogs/gradient.tif");
        then.status(200).body(fixture_bytes(|col, _| col as f32));
    });

    // Column index is the pixel value, so the mean is the centre column of the window.
    let bounds = GeometryReconciler::default()
        .reconcile(&aoi(example_feature()))
        .unwrap();
    let (origin_x, origin_y) = fixture_origin();
    let window = window_from_bounds(
        &bounds,
        &GeoTransform::north_up(origin_x, origin_y, 1.0, 1.0),
        200,
        200,
    )
    .unwrap();
    assert!(!window.is_empty());
    let expected = window.col_off as f64 + (window.width as f64 - 1.0) / 2.0;

    let engine = engine_for(&temp_dir);
    let source = RasterSource::parse(&server.url("/cogs/gradient.tif")).unwrap();
    let result = engine.run(&source, aoi(example_feature())).await.unwrap();

    let mean = result.mean.unwrap();
    assert!((mean - expected).abs() < 1e-9, "{} != {}", mean, expected);
}

#[tokio::test]
async fn test_polygon_outside_raster_yields_null_mean() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/cogs/example.tif");
        then.status(200).body(fixture_bytes(|_, _| 42.0));
    });

    let engine = engine_for(&temp_dir);
    let source = RasterSource::parse(&server.url("/cogs/example.tif")).unwrap();
    let result = engine.run(&source, aoi(feature_shifted(0.1))).await.unwrap();

    assert!(result.mean.is_none());
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({"mean": null})
    );
}

#[tokio::test]
async fn test_fetch_failure_reports_url_and_leaves_cache_empty() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    let cog_mock = server.mock(|when, then| {
        when.method(GET).path("/cogs/missing.tif");
        then.status(404).body("not found");
    });

    let engine = engine_for(&temp_dir);
    let url = server.url("/cogs/missing.tif");
    let source = RasterSource::parse(&url).unwrap();
    let err = engine.run(&source, aoi(example_feature())).await.unwrap_err();

    cog_mock.assert_hits(1);
    assert_eq!(err.category(), ErrorCategory::Upstream);
    assert!(err.to_string().contains(&url));
    assert!(!temp_dir.path().join("missing.tif").exists());
}

#[tokio::test]
async fn test_non_tiff_download_is_raster_error() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/cogs/page.tif");
        then.status(200)
            .header("Content-Type", "text/html")
            .body("<html>maintenance</html>");
    });

    let engine = engine_for(&temp_dir);
    let source = RasterSource::parse(&server.url("/cogs/page.tif")).unwrap();
    let err = engine.run(&source, aoi(example_feature())).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Raster);
}

#[tokio::test]
async fn test_feature_without_geometry_is_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/cogs/example.tif");
        then.status(200).body(fixture_bytes(|_, _| 1.0));
    });

    let engine = engine_for(&temp_dir);
    let source = RasterSource::parse(&server.url("/cogs/example.tif")).unwrap();
    let feature = serde_json::json!({"type": "Feature", "properties": {}, "geometry": null});
    let err = engine.run(&source, aoi(feature)).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Geometry);
}
