// src/serve.rs
//! Read-only HTTP front for the generated files.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::feed::feed_path;
use crate::metrics::Metrics;
use crate::registry::{is_url_safe_slug, ZoneKey};

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

const RSS_CONTENT_TYPE: &str = "application/rss+xml";

const PLACEHOLDER_INDEX: &str = "<html><body><h1>Avalanche Forecast RSS Feeds</h1>\
<p>Index page not yet generated. Run <code>avalanche-feeds generate-index</code> to create it.</p>\
</body></html>";

#[derive(Clone)]
pub struct AppState {
    feeds_dir: Arc<PathBuf>,
    index_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(feeds_dir: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            feeds_dir: Arc::new(feeds_dir.into()),
            index_path: Arc::new(index_path.into()),
        }
    }
}

pub fn router(state: AppState, metrics: &Metrics) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/feed/{center}/{zone}", get(serve_feed))
        .merge(metrics.router())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(state.index_path.as_path()).await {
        Ok(body) => Html(body).into_response(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Html(PLACEHOLDER_INDEX).into_response(),
        Err(e) => {
            tracing::error!(path = %state.index_path.display(), error = %e, "cannot read index");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn serve_feed(
    State(state): State<AppState>,
    Path((center, zone)): Path<(String, String)>,
) -> Response {
    if !is_url_safe_slug(&center) || !is_url_safe_slug(&zone) {
        counter!("feed_requests_total", "status" => "404").increment(1);
        return StatusCode::NOT_FOUND.into_response();
    }

    let key = ZoneKey::new(center, zone);
    let path = feed_path(&state.feeds_dir, &key);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            counter!("feed_requests_total", "status" => "200").increment(1);
            ([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], bytes).into_response()
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            counter!("feed_requests_total", "status" => "404").increment(1);
            (StatusCode::NOT_FOUND, format!("Feed not found for {key}")).into_response()
        }
        Err(e) => {
            counter!("feed_requests_total", "status" => "500").increment(1);
            tracing::error!(zone = %key, path = %path.display(), error = %e, "cannot read feed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Bind and serve until Ctrl-C.
pub async fn run(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "serving feeds");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("http server")?;
    Ok(())
}
