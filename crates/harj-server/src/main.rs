mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use harj_api::AppStateInner;
use harj_chat::{CounterpartResponder, MessagingService, SilentResponder, SimulatedResponder};
use harj_db::SqliteStore;
use harj_gateway::Dispatcher;
use harj_store::{ConversationStore, MemoryDirectory, MemoryStore};
use harj_types::{UserId, UserProfile};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harj=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn ConversationStore> = match &config.db_path {
        Some(path) => {
            info!("Persisting conversations in {}", path.display());
            Arc::new(SqliteStore::open(path)?)
        }
        None => {
            info!("Keeping conversations in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let directory = load_directory(&config)?;
    info!("User directory holds {} users", directory.len());

    let responder: Arc<dyn CounterpartResponder> = if config.auto_reply {
        info!(
            "Simulated counterpart replies after {:?}..{:?}",
            config.reply_min, config.reply_max
        );
        Arc::new(SimulatedResponder::new(config.reply_min, config.reply_max))
    } else {
        Arc::new(SilentResponder)
    };

    let service = MessagingService::new(store, Arc::new(directory), responder, Dispatcher::new());

    let app = harj_api::router(AppStateInner::new(service.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Harj chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

fn load_directory(config: &Config) -> anyhow::Result<MemoryDirectory> {
    let Some(path) = &config.users_file else {
        let mut owner = UserProfile::new(UserId(1), "مالك الموقع");
        owner.is_verified = true;
        owner.is_premium = true;
        return Ok(MemoryDirectory::with_users([owner]));
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read users file {}", path.display()))?;
    MemoryDirectory::from_json(&raw)
        .with_context(|| format!("users file {} is not a JSON array of profiles", path.display()))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
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
