//! RO-DBT web server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rodbt::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxJournalRepository, SqlxQuestionRepository, SqlxSessionRepository,
            SqlxUserRepository,
        },
    },
    services::{EntryService, UserService},
    theme::PageRenderer,
};

/// Seconds between expired-session sweeps
const SESSION_SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rodbt=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RO-DBT...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let user_service = Arc::new(UserService::with_session_expiration(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
        config.session.expiration_days,
    ));
    let entry_service = Arc::new(EntryService::new(
        SqlxJournalRepository::boxed(pool.clone()),
        SqlxQuestionRepository::boxed(pool.clone()),
    ));

    let renderer = PageRenderer::new(config.site.clone())?;
    tracing::info!("Page templates loaded");

    // Expired session sweep
    {
        let users = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
                SESSION_SWEEP_INTERVAL_SECS,
            ));
            loop {
                interval.tick().await;
                match users.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Removed {} expired sessions", removed),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        pool,
        config: Arc::new(config),
        user_service,
        entry_service,
        renderer: Arc::new(renderer),
    };

    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
