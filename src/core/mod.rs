pub mod engine;
pub mod fetcher;
pub mod pipeline;
pub mod projection;
pub mod raster;
pub mod reconciler;
pub mod reducer;

pub use crate::domain::model::{
    AreaOfInterest, LocalArtifact, PixelWindow, RasterSource, ReprojectedBounds, StatisticResult,
};
pub use crate::domain::ports::{ArtifactStore, ConfigProvider, StatsPipeline};
pub use crate::utils::error::Result;
