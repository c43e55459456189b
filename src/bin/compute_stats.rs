use anyhow::Context;
use clap::Parser;
use dristi::core::ConfigProvider;
use dristi::utils::{logger, validation::Validate};
use dristi::{
    AreaOfInterest, CogStatsPipeline, LocalArtifactStore, RasterSource, ServiceConfig, StatsEngine,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "compute_stats")]
#[command(about = "Compute the mean of a COG inside a GeoJSON polygon, once")]
struct Args {
    /// GeoJSON file holding a Feature or a {"geom": Feature} document
    #[arg(short, long)]
    geojson: String,

    /// Raster to sample; defaults to the configured default COG
    #[arg(long)]
    cog_url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Directory holding downloaded rasters
    #[arg(long)]
    static_dir: Option<String>,

    /// Download again even if a cached copy exists
    #[arg(long)]
    refresh: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let mut config = match &args.config {
        Some(path) => match ServiceConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => ServiceConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(dir) = &args.static_dir {
        config.cache.static_dir = dir.clone();
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let content = std::fs::read_to_string(&args.geojson)
        .with_context(|| format!("reading {}", args.geojson))?;
    let document: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {} as JSON", args.geojson))?;
    let aoi = AreaOfInterest::from_json_value(document)?;

    let cog_url = args
        .cog_url
        .clone()
        .unwrap_or_else(|| config.default_cog_url().to_string());
    let source = RasterSource::parse(&cog_url)?.with_refresh(args.refresh);

    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers())
            .build()
            .context("building reduction thread pool")?,
    );
    let store = LocalArtifactStore::new(config.static_dir()).with_max_bytes(config.max_cache_bytes());
    let engine = StatsEngine::new(CogStatsPipeline::from_config(store, &config, pool));

    match engine.run(&source, aoi).await {
        Ok(result) => {
            println!("{}", serde_json::to_string(&result)?);
        }
        Err(e) => {
            tracing::error!(
                "❌ Computation failed: {} (Category: {:?})",
                e,
                e.category()
            );
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(2);
        }
    }

    Ok(())
}
