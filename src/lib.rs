pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::http::{router, AppState};
pub use adapters::storage::LocalArtifactStore;
pub use config::{CliConfig, ServiceConfig};
pub use core::{engine::StatsEngine, pipeline::CogStatsPipeline};
pub use domain::model::{AreaOfInterest, RasterSource, StatisticResult};
pub use utils::error::{Result, StatsError};
