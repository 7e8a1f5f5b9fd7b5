//! HTTP service: media resolution, download proxy and raw metadata passthrough.
//!
//! Every request is handled independently; the only shared state is the
//! immutable resolver and a pooled HTTP client.

mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::media::MediaResolver;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<MediaResolver>,
    pub http: reqwest::Client,
    pub user_agent: Arc<str>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        let resolver = MediaResolver::from_config(&config.upstream, http.clone())
            .context("Failed to initialize media resolver")?;

        Ok(Self {
            resolver: Arc::new(resolver),
            http,
            user_agent: Arc::from(config.upstream.user_agent.as_str()),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/media", get(handlers::resolve_media))
        .route("/download", get(handlers::download_proxy))
        .route("/vx", get(handlers::raw_status))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
