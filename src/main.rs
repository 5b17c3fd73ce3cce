use slotkeeper::config::Config;
use slotkeeper::services::{AuditLog, Backend, GameService, MemoryStore, RedisStore};
use slotkeeper::{app, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bound on waiting for deferred work at shutdown.
const DRAIN_LIMIT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotkeeper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Slotkeeper server on {}:{}", config.host, config.port);

    let backend = match config.redis_url {
        Some(ref redis_url) => {
            let store = RedisStore::new(redis_url).await;
            if !store.is_connected().await {
                warn!("Redis unreachable; spins will fail until it comes back");
            }
            Backend::Redis(store)
        }
        None => {
            warn!("REDIS_URL not set, keeping game state in memory");
            let store = MemoryStore::new();
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                loop {
                    interval.tick().await;
                    sweeper.cleanup();
                }
            });
            Backend::Memory(store)
        }
    };
    info!("Using {} store", backend.name());

    let game = Arc::new(GameService::new(
        Arc::new(backend),
        config.game.clone(),
        Arc::new(AuditLog),
    ));

    let state = AppState {
        config: config.clone(),
        game: game.clone(),
    };

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Slotkeeper server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let aborted = game.deferred().drain(DRAIN_LIMIT).await;
    info!("Shutdown complete ({} deferred tasks aborted)", aborted);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
