pub mod toml_config;

pub use toml_config::ServiceConfig;

use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "dristi")]
#[command(about = "Mean pixel value of a Cloud-Optimized GeoTIFF inside a polygon, over HTTP")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Directory holding downloaded rasters (served under /static)
    #[arg(long)]
    pub static_dir: Option<String>,

    /// Raster used when a request carries no cog_url
    #[arg(long)]
    pub default_cog_url: Option<String>,

    /// Threads used for the chunked reduction
    #[arg(long)]
    pub workers: Option<usize>,

    /// Evict oldest cached rasters beyond this many bytes
    #[arg(long)]
    pub max_cache_bytes: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    /// Defaults < config file < environment < command line.
    pub fn resolve(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut ServiceConfig) {
        if let Some(addr) = &self.listen_addr {
            config.server.listen_addr = addr.clone();
        }
        if let Some(dir) = &self.static_dir {
            config.cache.static_dir = dir.clone();
        }
        if let Some(url) = &self.default_cog_url {
            config.compute.default_cog_url = url.clone();
        }
        if let Some(workers) = self.workers {
            config.compute.workers = Some(workers);
        }
        if let Some(max_bytes) = self.max_cache_bytes {
            config.cache.max_bytes = Some(max_bytes);
        }
        config.logging.verbose |= self.verbose;
        config.logging.json |= self.json_logs;
    }
}
