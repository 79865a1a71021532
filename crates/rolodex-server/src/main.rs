mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use rolodex_api::auth::{AppState, AppStateInner};
use rolodex_cache::{MemoryUserCache, RedisUserCache, UserCache, UserDirectory};
use rolodex_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rolodex=debug,rolodex_api=debug,rolodex_cache=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let cache: Arc<dyn UserCache> = match &config.redis_url {
        Some(url) => Arc::new(RedisUserCache::connect(url).await?),
        None => {
            warn!("ROLODEX_REDIS_URL not set, using in-process user cache");
            Arc::new(MemoryUserCache::new())
        }
    };
    let users = UserDirectory::new(db.clone(), cache, config.user_cache_ttl);

    let state: AppState = Arc::new(AppStateInner {
        db,
        users,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = rolodex_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Rolodex server listening on {}", config.addr);
    info!("User cache TTL: {}s", config.user_cache_ttl.as_secs());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
