use song_catalog_api::{AppConfig, AppState, router, seed, storage};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first: the profile decides the default log level
    let config = AppConfig::load()?;

    let default_level = if config.profile.debug() { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Starting Song Catalog API Server");
    info!("📋 Configuration loaded");
    info!("   - Profile: {}", config.profile);
    info!("   - Database: {} ({})", config.database.name, config.database.uri);
    info!("   - Server: {}:{}", config.server.host, config.server.port);

    // Connect MongoDB
    info!("💾 Connecting to MongoDB...");
    let store = storage::connect(&config.database).await?;
    info!("✅ Document store ready");

    // Seed empty collections
    let report = seed::seed_missing(store.clone(), &config.seed).await?;
    if report.songs > 0 || report.ratings > 0 {
        info!(
            "🌱 Seeded {} songs and {} ratings",
            report.songs, report.ratings
        );
    }

    let state = AppState::new(store, config.profile);
    if state.is_test_mode() {
        warn!("⚠️  Running with the testing profile");
    }
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET  /health                      - Health check");
    info!("   GET  /songs                       - List songs (limit, page)");
    info!("   POST /songs/add                   - Add new song");
    info!("   GET  /songs/avg/difficulty        - Songs by level");
    info!("   GET  /songs/search                - Search songs");
    info!("   POST /songs/rating                - Rate a song");
    info!("   GET  /rating                      - List ratings");
    info!("   GET  /songs/avg/rating/{{song_id}}  - Rating statistics");
    info!("");
    info!("✨ Server is ready to accept requests!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutting down gracefully");

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
