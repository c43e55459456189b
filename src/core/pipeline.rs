use crate::core::fetcher::ArtifactFetcher;
use crate::core::raster::GeoTiffRaster;
use crate::core::reconciler::GeometryReconciler;
use crate::core::reducer::WindowedReducer;
use crate::core::{
    AreaOfInterest, ArtifactStore, ConfigProvider, LocalArtifact, RasterSource, ReprojectedBounds,
    StatisticResult, StatsPipeline,
};
use crate::utils::error::Result;
use rayon::ThreadPool;
use std::sync::Arc;

/// Fetch → reconcile → reduce over a downloaded Cloud-Optimized GeoTIFF.
pub struct CogStatsPipeline<S: ArtifactStore> {
    fetcher: ArtifactFetcher<S>,
    reconciler: GeometryReconciler,
    reducer: WindowedReducer,
}

impl<S: ArtifactStore> CogStatsPipeline<S> {
    pub fn new(
        fetcher: ArtifactFetcher<S>,
        reconciler: GeometryReconciler,
        reducer: WindowedReducer,
    ) -> Self {
        Self {
            fetcher,
            reconciler,
            reducer,
        }
    }

    pub fn from_config<C: ConfigProvider>(store: S, config: &C, pool: Arc<ThreadPool>) -> Self {
        Self::new(
            ArtifactFetcher::new(store),
            GeometryReconciler::new(config.source_epsg(), config.target_epsg()),
            WindowedReducer::new(pool),
        )
    }
}

#[async_trait::async_trait]
impl<S: ArtifactStore> StatsPipeline for CogStatsPipeline<S> {
    async fn fetch(&self, source: &RasterSource) -> Result<LocalArtifact> {
        self.fetcher.fetch(source).await
    }

    async fn reconcile(
        &self,
        aoi: AreaOfInterest,
        artifact: &LocalArtifact,
    ) -> Result<ReprojectedBounds> {
        let reconciler = self.reconciler;
        let path = artifact.path.clone();

        tokio::task::spawn_blocking(move || {
            // the declared CRS is only reported, never enforced
            let raster = GeoTiffRaster::open(&path)?;
            if let Some(epsg) = raster.epsg() {
                if epsg != reconciler.target_epsg() {
                    tracing::warn!(
                        "{} declares EPSG:{} but bounds are computed in EPSG:{}",
                        path.display(),
                        epsg,
                        reconciler.target_epsg()
                    );
                }
            }
            reconciler.reconcile(&aoi)
        })
        .await?
    }

    async fn reduce(
        &self,
        artifact: &LocalArtifact,
        bounds: ReprojectedBounds,
    ) -> Result<StatisticResult> {
        let reducer = self.reducer.clone();
        let path = artifact.path.clone();

        tokio::task::spawn_blocking(move || reducer.reduce_file(&path, &bounds)).await?
    }
}
