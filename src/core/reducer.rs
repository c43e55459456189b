use crate::core::raster::GeoTiffRaster;
use crate::domain::model::{ReprojectedBounds, StatisticResult};
use crate::utils::error::{Result, StatsError};
use ndarray::{s, ArrayView2};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::path::Path;
use std::sync::Arc;

/// Edge length of the square blocks the mean is reduced over.
pub const CHUNK_EDGE: usize = 1024;

const BAND: u16 = 1;

/// Reads band 1 under a bounding box and reduces it to its mean on a shared pool.
#[derive(Clone)]
pub struct WindowedReducer {
    pool: Arc<ThreadPool>,
    chunk_edge: usize,
}

impl std::fmt::Debug for WindowedReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedReducer")
            .field("threads", &self.pool.current_num_threads())
            .field("chunk_edge", &self.chunk_edge)
            .finish()
    }
}

impl WindowedReducer {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool,
            chunk_edge: CHUNK_EDGE,
        }
    }

    pub fn with_chunk_edge(mut self, chunk_edge: usize) -> Self {
        self.chunk_edge = chunk_edge.max(1);
        self
    }

    pub fn chunk_edge(&self) -> usize {
        self.chunk_edge
    }

    pub fn reduce_file(&self, path: &Path, bounds: &ReprojectedBounds) -> Result<StatisticResult> {
        let mut raster = GeoTiffRaster::open(path)?;
        self.reduce(&mut raster, bounds)
    }

    pub fn reduce(
        &self,
        raster: &mut GeoTiffRaster,
        bounds: &ReprojectedBounds,
    ) -> Result<StatisticResult> {
        let window = raster.window_for_bounds(bounds)?;
        tracing::debug!("Pixel window for {:?}: {:?}", bounds, window);

        if window.is_empty() {
            tracing::info!("Bounds do not overlap {}", raster.path().display());
            return Ok(StatisticResult::empty());
        }

        let array = raster.read_band_window(BAND, &window)?;
        Ok(StatisticResult {
            mean: self.chunked_mean(array.view())?,
        })
    }

    /// Mean over fixed-size blocks summed in parallel. `None` for an empty array.
    pub fn chunked_mean(&self, array: ArrayView2<'_, f64>) -> Result<Option<f64>> {
        if array.is_empty() {
            return Ok(None);
        }

        let (rows, cols) = array.dim();
        let edge = self.chunk_edge;
        let blocks: Vec<(usize, usize)> = (0..rows)
            .step_by(edge)
            .flat_map(|r| (0..cols).step_by(edge).map(move |c| (r, c)))
            .collect();

        let (sum, count) = self.pool.install(|| {
            blocks
                .par_iter()
                .map(|&(r, c)| {
                    let block = array.slice(s![r..(r + edge).min(rows), c..(c + edge).min(cols)]);
                    (block.sum(), block.len())
                })
                .reduce(|| (0.0, 0usize), |a, b| (a.0 + b.0, a.1 + b.1))
        });

        if count == 0 {
            return Ok(None);
        }
        let mean = sum / count as f64;
        if !mean.is_finite() {
            return Err(StatsError::compute(format!(
                "mean over {} pixels is not finite",
                count
            )));
        }
        Ok(Some(mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn pool(threads: usize) -> Arc<ThreadPool> {
        Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_constant_array_mean() {
        let reducer = WindowedReducer::new(pool(2));
        let array = Array2::from_elem((37, 53), 7.25);
        let mean = reducer.chunked_mean(array.view()).unwrap().unwrap();
        assert!((mean - 7.25).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_mean_across_many_chunks() {
        // value = col, so the mean is (cols - 1) / 2 regardless of blocking
        let reducer = WindowedReducer::new(pool(4)).with_chunk_edge(16);
        let array = Array2::from_shape_fn((100, 250), |(_, c)| c as f64);
        let mean = reducer.chunked_mean(array.view()).unwrap().unwrap();
        assert!((mean - 124.5).abs() < 1e-9);
    }

    #[test]
    fn test_chunked_matches_serial_mean() {
        let reducer = WindowedReducer::new(pool(3)).with_chunk_edge(7);
        let array = Array2::from_shape_fn((45, 31), |(r, c)| ((r * 31 + c) % 13) as f64 * 0.5);
        let expected = array.sum() / array.len() as f64;
        let mean = reducer.chunked_mean(array.view()).unwrap().unwrap();
        assert!((mean - expected).abs() < 1e-12);
    }

    #[test]
    fn test_default_chunk_edge() {
        assert_eq!(WindowedReducer::new(pool(1)).chunk_edge(), 1024);
        assert_eq!(WindowedReducer::new(pool(1)).with_chunk_edge(0).chunk_edge(), 1);
    }

    #[test]
    fn test_empty_array_has_no_mean() {
        let reducer = WindowedReducer::new(pool(1));
        let array = Array2::<f64>::zeros((0, 12));
        assert_eq!(reducer.chunked_mean(array.view()).unwrap(), None);
    }

    #[test]
    fn test_non_finite_mean_is_compute_error() {
        let reducer = WindowedReducer::new(pool(1));
        let array = Array2::from_elem((2, 2), f64::NAN);
        assert!(matches!(
            reducer.chunked_mean(array.view()),
            Err(StatsError::ComputeError { .. })
        ));
    }
}
