#![allow(dead_code)]

use dristi::core::projection::project_point;
use rayon::ThreadPool;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const EXAMPLE_RING: [[f64; 2]; 5] = [
    [83.74180309481727, 28.281889569333856],
    [83.74180309481727, 28.281320507276973],
    [83.74249860235204, 28.281320507276973],
    [83.74249860235204, 28.281889569333856],
    [83.74180309481727, 28.281889569333856],
];

/// Half-width of the fixture raster around the example polygon, in metres.
pub const HALF_EXTENT: f64 = 100.0;

pub fn feature_shifted(dlon: f64) -> serde_json::Value {
    let ring: Vec<[f64; 2]> = EXAMPLE_RING.iter().map(|[x, y]| [x + dlon, *y]).collect();
    serde_json::json!({
        "type": "Feature",
        "properties": {},
        "geometry": {
            "coordinates": [ring],
            "type": "Polygon"
        }
    })
}

pub fn example_feature() -> serde_json::Value {
    feature_shifted(0.0)
}

/// Upper-left corner (EPSG:32644) of a 1 m raster centred on the example polygon.
pub fn fixture_origin() -> (f64, f64) {
    let lon = (EXAMPLE_RING[0][0] + EXAMPLE_RING[2][0]) / 2.0;
    let lat = (EXAMPLE_RING[0][1] + EXAMPLE_RING[1][1]) / 2.0;
    let (cx, cy) = project_point(4326, 32644, lon, lat).unwrap();
    ((cx - HALF_EXTENT).floor(), (cy + HALF_EXTENT).ceil())
}

/// Writes a single-band float GeoTIFF tagged as EPSG:32644 with 1 m pixels.
pub fn write_fixture_raster(path: &Path, pixel: impl Fn(u32, u32) -> f32) {
    let size = (2.0 * HALF_EXTENT) as u32;
    let (origin_x, origin_y) = fixture_origin();

    let data: Vec<f32> = (0..size)
        .flat_map(|row| (0..size).map(move |col| (col, row)))
        .map(|(col, row)| pixel(col, row))
        .collect();

    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(size, size)
        .unwrap();
    image.rows_per_strip(16).unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::ModelTiepointTag,
            &[0.0f64, 0.0, 0.0, origin_x, origin_y, 0.0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::GeoKeyDirectoryTag,
            &[1u16, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32644][..],
        )
        .unwrap();
    image.write_data(&data).unwrap();
}

pub fn fixture_bytes(pixel: impl Fn(u32, u32) -> f32) -> Vec<u8> {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("fixture.tif");
    write_fixture_raster(&path, pixel);
    std::fs::read(path).unwrap()
}

pub fn test_pool() -> Arc<ThreadPool> {
    Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap(),
    )
}
