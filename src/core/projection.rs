//! EPSG-coded coordinate transformation in pure Rust (proj4rs + crs-definitions).

use crate::utils::error::{Result, StatsError};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

/// PROJ4 definition for an EPSG code, if the bundled database knows it.
#[inline]
pub fn get_proj_string(epsg: u16) -> Option<&'static str> {
    crs_definitions::from_code(epsg).map(|def| def.proj4)
}

/// True for lon/lat systems; proj4rs expects radians for those.
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: u16) -> bool {
    match get_proj_string(epsg) {
        Some(proj_str) => proj_str.contains("+proj=longlat"),
        None => epsg == 4326 || (4000..5000).contains(&epsg),
    }
}

fn build_proj(epsg: u16) -> Result<Proj> {
    let proj_str = get_proj_string(epsg).ok_or_else(|| StatsError::ProjectionError {
        message: format!("EPSG:{epsg} is not in the crs-definitions database"),
    })?;
    Proj::from_proj_string(proj_str).map_err(|e| StatsError::ProjectionError {
        message: format!("Invalid projection EPSG:{epsg}: {e:?}"),
    })
}

/// A resolved source → target transformation, built once and applied per coordinate.
pub struct Projector {
    source_epsg: u16,
    target_epsg: u16,
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl Projector {
    pub fn new(source_epsg: u16, target_epsg: u16) -> Result<Self> {
        Ok(Self {
            source_epsg,
            target_epsg,
            source: build_proj(source_epsg)?,
            target: build_proj(target_epsg)?,
            source_geographic: is_geographic_crs(source_epsg),
            target_geographic: is_geographic_crs(target_epsg),
        })
    }

    pub fn source_epsg(&self) -> u16 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u16 {
        self.target_epsg
    }

    pub fn project(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.source_epsg == self.target_epsg {
            return Ok((x, y));
        }

        let mut point = if self.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(&self.source, &self.target, &mut point).map_err(|e| {
            StatsError::ProjectionError {
                message: format!(
                    "Transform of ({x}, {y}) from EPSG:{} to EPSG:{} failed: {e:?}",
                    self.source_epsg, self.target_epsg
                ),
            }
        })?;

        let (out_x, out_y) = if self.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(StatsError::ProjectionError {
                message: format!(
                    "({x}, {y}) has no finite image in EPSG:{}",
                    self.target_epsg
                ),
            });
        }

        Ok((out_x, out_y))
    }
}

/// One-off point projection between two EPSG codes.
pub fn project_point(source_epsg: u16, target_epsg: u16, x: f64, y: f64) -> Result<(f64, f64)> {
    Projector::new(source_epsg, target_epsg)?.project(x, y)
}
