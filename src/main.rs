use anyhow::Context;
use clap::Parser;
use dristi::adapters::http::{router, shutdown_signal, AppState};
use dristi::core::ConfigProvider;
use dristi::utils::{logger, validation::Validate};
use dristi::{CliConfig, CogStatsPipeline, LocalArtifactStore, StatsEngine};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    logger::init_logger(config.logging.verbose, config.logging.json);
    tracing::info!("Starting dristi");
    tracing::debug!("Resolved config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let store = LocalArtifactStore::new(config.static_dir()).with_max_bytes(config.max_cache_bytes());
    store
        .ensure_root()
        .await
        .with_context(|| format!("creating static directory {}", config.static_dir()))?;

    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers())
            .thread_name(|i| format!("dristi-reduce-{}", i))
            .build()
            .context("building reduction thread pool")?,
    );
    tracing::info!(
        "Reduction pool: {} threads; CRS EPSG:{} -> EPSG:{}",
        pool.current_num_threads(),
        config.source_epsg(),
        config.target_epsg()
    );

    let pipeline = CogStatsPipeline::from_config(store, &config, Arc::clone(&pool));
    let state = AppState::new(StatsEngine::new(pipeline), config.default_cog_url());
    let app = router(state, config.static_dir());

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr))?;
    tracing::info!("Listening on {}", config.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    drop(pool);
    tracing::info!("Server stopped");
    Ok(())
}
