use crate::utils::error::{Result, StatsError};
use crate::utils::validation::{validate_file_name, validate_url};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single GeoJSON feature, assumed to be authored in the source CRS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaOfInterest {
    pub feature: geojson::Feature,
}

impl AreaOfInterest {
    pub fn new(feature: geojson::Feature) -> Self {
        Self { feature }
    }

    /// Accepts either a bare Feature or the `{"geom": Feature}` request document.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let feature_value = match value {
            serde_json::Value::Object(mut obj) if obj.contains_key("geom") => {
                obj.remove("geom").unwrap_or_default()
            }
            other => other,
        };

        let feature: geojson::Feature = serde_json::from_value(feature_value)
            .map_err(|e| StatsError::geometry(format!("not a GeoJSON Feature: {}", e)))?;
        Ok(Self { feature })
    }
}

/// Remote raster named by URL. The URL basename is the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterSource {
    url: String,
    cache_key: String,
    refresh: bool,
}

impl RasterSource {
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = validate_url("cog_url", url)?;
        let cache_key = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        validate_file_name("cog_url", &cache_key)?;

        Ok(Self {
            url: url.to_string(),
            cache_key,
            refresh: false,
        })
    }

    /// Ignore any cached copy and download again.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn refresh(&self) -> bool {
        self.refresh
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub key: String,
    pub path: PathBuf,
}

impl LocalArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Axis-aligned box in the raster CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReprojectedBounds {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl ReprojectedBounds {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn col_end(&self) -> usize {
        self.col_off + self.width
    }

    pub fn row_end(&self) -> usize {
        self.row_off + self.height
    }
}

/// Response payload: `{"mean": <float|null>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticResult {
    pub mean: Option<f64>,
}

impl StatisticResult {
    pub fn mean(value: f64) -> Self {
        Self { mean: Some(value) }
    }

    pub fn empty() -> Self {
        Self { mean: None }
    }
}
