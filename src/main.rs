//! RadioWatch Analysis Engine
//!
//! Batch engine that periodically scores every observed transmitter for
//! threat behavior, groups transmitters into multi-radio devices by address
//! prefix, and flags address families that look like one device rotating
//! its MAC.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  RADIOWATCH ANALYSIS ENGINE                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────────────────────────┐   │
//! │  │  Admin    │   │  Scheduler (every N hours)           │   │
//! │  │  Surface  │──▶│  scorer ─▶ grouper ─▶ randomization  │   │
//! │  │  (Axum)   │   │                                      │   │
//! │  └─────┬─────┘   └────────────────┬─────────────────────┘   │
//! │        └────────────┬─────────────┘                         │
//! │                     ▼                                       │
//! │              ┌─────────────┐                                │
//! │              │ PostgreSQL  │  observations (read-only)      │
//! │              └─────────────┘  scores/groups/suspects (owned)│
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod models;
mod jobs;
mod handlers;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobs::scheduler::AnalysisScheduler;

pub use error::{EngineError, EngineResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "radiowatch_engine=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("RadioWatch analysis engine starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .context("failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .context("failed to run migrations")?;

    // Start the recurring analysis job
    let scheduler = Arc::new(AnalysisScheduler::new(pool, config.clone()));
    scheduler.initialize();

    // Build application state
    let state = AppState {
        config: config.clone(),
        scheduler: scheduler.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start admin server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Admin surface listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await
        .context("failed to bind admin port")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await
        .context("admin server error")?;

    Ok(())
}

async fn shutdown_signal(scheduler: Arc<AnalysisScheduler>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown requested");
    scheduler.shutdown();
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub scheduler: Arc<AnalysisScheduler>,
}

/// Create the admin router
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/analysis/run", post(handlers::analysis::run))
        .route("/api/v1/analysis/status", get(handlers::analysis::status))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
