use crate::core::{AreaOfInterest, RasterSource, StatisticResult, StatsPipeline};
use crate::utils::error::Result;
use std::time::Instant;

pub struct StatsEngine<P: StatsPipeline> {
    pipeline: P,
}

impl<P: StatsPipeline> StatsEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self, source: &RasterSource, aoi: AreaOfInterest) -> Result<StatisticResult> {
        let started = Instant::now();

        // Fetch
        let artifact = self.pipeline.fetch(source).await?;
        tracing::debug!(
            "Fetched {} in {:?}",
            artifact.path.display(),
            started.elapsed()
        );

        // Reconcile
        let bounds = self.pipeline.reconcile(aoi, &artifact).await?;
        tracing::info!(
            "Bounds: {} {} {} {}",
            bounds.minx,
            bounds.miny,
            bounds.maxx,
            bounds.maxy
        );

        // Reduce
        let reduce_started = Instant::now();
        let result = self.pipeline.reduce(&artifact, bounds).await?;
        tracing::debug!("Reduced window in {:?}", reduce_started.elapsed());

        tracing::info!(
            "Computation time: {:.3} s (mean = {:?})",
            started.elapsed().as_secs_f64(),
            result.mean
        );
        Ok(result)
    }
}
