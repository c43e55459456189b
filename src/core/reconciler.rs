use crate::core::projection::Projector;
use crate::domain::model::{AreaOfInterest, ReprojectedBounds};
use crate::utils::error::{Result, StatsError};
use geo::{BoundingRect, Coord, Geometry, GeometryCollection, MapCoords};

pub const DEFAULT_SOURCE_EPSG: u16 = 4326;
pub const DEFAULT_TARGET_EPSG: u16 = 32644;

/// Reprojects an area of interest into the raster CRS and reports its extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryReconciler {
    source_epsg: u16,
    target_epsg: u16,
}

impl Default for GeometryReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_EPSG, DEFAULT_TARGET_EPSG)
    }
}

impl GeometryReconciler {
    pub fn new(source_epsg: u16, target_epsg: u16) -> Self {
        Self {
            source_epsg,
            target_epsg,
        }
    }

    pub fn source_epsg(&self) -> u16 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u16 {
        self.target_epsg
    }

    pub fn reconcile(&self, aoi: &AreaOfInterest) -> Result<ReprojectedBounds> {
        let geometry = aoi
            .feature
            .geometry
            .clone()
            .ok_or_else(|| StatsError::geometry("feature has no geometry"))?;
        let geometry = Geometry::<f64>::try_from(geometry)?;
        let collection = GeometryCollection::from(vec![geometry]);

        let projector = Projector::new(self.source_epsg, self.target_epsg)?;
        let projected = collection.try_map_coords(|coord: Coord<f64>| {
            projector
                .project(coord.x, coord.y)
                .map(|(x, y)| Coord { x, y })
        })?;

        let rect = projected
            .bounding_rect()
            .ok_or_else(|| StatsError::geometry("geometry has no coordinates"))?;

        let bounds = ReprojectedBounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);
        tracing::debug!(
            "Reprojected AOI EPSG:{} -> EPSG:{}: {:?}",
            self.source_epsg,
            self.target_epsg,
            bounds
        );
        Ok(bounds)
    }
}
