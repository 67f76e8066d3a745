use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warbler::{
    api::{create_router, AppState},
    config::Config,
    db::{self, SessionRepository},
    error::AppError,
};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

async fn purge_expired_sessions(db: &SqlitePool) -> Result<u64, AppError> {
    let mut conn = db.acquire().await?;
    SessionRepository::cleanup_expired(&mut conn).await
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warbler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Warbler v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!("✅ Configuration loaded");

    // Connect and run migrations
    let db = db::connect(&config).await?;
    tracing::info!("✅ Database connected: {}", config.database_url);
    tracing::info!("✅ Database migrations completed");

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
    };

    // Spawn background task for session cleanup
    {
        let db_clone = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                match purge_expired_sessions(&db_clone).await {
                    Ok(purged) => tracing::debug!("🧹 Purged {} expired sessions", purged),
                    Err(e) => tracing::error!("❌ Session cleanup failed: {}", e),
                }
            }
        });
        tracing::info!("✅ Session cleanup task started (runs hourly)");
    }

    let app = create_router(state);

    // Bind and serve
    let addr = config.server_address();
    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
