use crate::domain::model::{
    AreaOfInterest, LocalArtifact, RasterSource, ReprojectedBounds, StatisticResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Flat, key-addressed file store backing the artifact cache.
pub trait ArtifactStore: Send + Sync {
    fn locate(&self, key: &str) -> PathBuf;
    fn contains(&self, key: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn write_artifact(
        &self,
        key: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<LocalArtifact>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn static_dir(&self) -> &str;
    fn default_cog_url(&self) -> &str;
    fn source_epsg(&self) -> u16;
    fn target_epsg(&self) -> u16;
    fn max_cache_bytes(&self) -> Option<u64>;
    fn workers(&self) -> usize;
}

#[async_trait]
pub trait StatsPipeline: Send + Sync {
    async fn fetch(&self, source: &RasterSource) -> Result<LocalArtifact>;
    async fn reconcile(
        &self,
        aoi: AreaOfInterest,
        artifact: &LocalArtifact,
    ) -> Result<ReprojectedBounds>;
    async fn reduce(
        &self,
        artifact: &LocalArtifact,
        bounds: ReprojectedBounds,
    ) -> Result<StatisticResult>;
}
