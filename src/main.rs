//! economy-gateway server entry point.
//!
//! Loads configuration, opens the storage backend, and starts the Axum
//! HTTP server with the REST, health, and OpenAPI routes.

use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use economy_gateway::api;
use economy_gateway::app_state::AppState;
use economy_gateway::config::{EconomyConfig, LogFormat};
use economy_gateway::openapi;
use economy_gateway::persistence::{MemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EconomyConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting economy-gateway");

    let store = open_store(&config).await?;
    let app_state = AppState::new(store, &config);

    let app = Router::new()
        .merge(api::build_router())
        .merge(openapi::routes())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn open_store(config: &EconomyConfig) -> anyhow::Result<Store> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled; using the in-memory store");
        return Ok(Store::Memory(MemoryStore::new()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("connecting to PostgreSQL")?;

    if config.run_migrations {
        sqlx::migrate!()
            .run(&pool)
            .await
            .context("running database migrations")?;
        tracing::info!("database migrations applied");
    }

    Ok(Store::Postgres(PostgresStore::new(pool)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
