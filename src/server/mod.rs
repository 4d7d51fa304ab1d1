//! HTTP/WebSocket front end
//!
//! Bridges network clients to a shared [`Registry`]: publishing clients get
//! one [`Publisher`](crate::Publisher) per connection, subscribing clients
//! one [`ChannelSubscriber`](crate::ChannelSubscriber). The engine itself
//! knows nothing about sockets or JSON framing.
//!
//! ## Routes
//!
//! - `GET /status` — liveness
//! - `GET /topic/:topic` — whether the topic exists, plus WebSocket URLs
//! - `GET /topic/:topic/publish` — WebSocket, publish frames
//! - `GET /topic/:topic/subscribe` — WebSocket, delivered events

pub mod protocol;
mod websocket;

use crate::config::ServerConfig;
use crate::error::{PubSubError, Result};
use crate::registry::Registry;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use protocol::{StatusResponse, TopicInfo};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state handed to every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Build state with a fresh registry configured from `config`
    pub fn new(config: ServerConfig) -> Self {
        let registry = Registry::with_config(config.registry());
        Self::with_registry(Arc::new(registry), config)
    }

    /// Build state around an existing registry
    pub fn with_registry(registry: Arc<Registry>, config: ServerConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Create the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/topic/:topic", get(topic_info))
        .route("/topic/:topic/publish", get(websocket::publish_upgrade))
        .route("/topic/:topic/subscribe", get(websocket::subscribe_upgrade))
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn run(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(PubSubError::from)
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let listener = TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        multi_publisher = config.multi_publisher,
        subscriber_capacity = config.subscriber_capacity,
        "Pub/sub server listening"
    );

    run(listener, AppState::new(config), async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;

    tracing::info!("Shutting down...");
    Ok(())
}

async fn status() -> impl IntoResponse {
    Json(StatusResponse {
        status: 200,
        message: "It works!".to_string(),
    })
}

async fn topic_info(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let base = ws_url(&headers, &format!("/topic/{}/", name));
    Json(TopicInfo {
        active: state.registry().contains(&name),
        publish_ws: format!("{}publish", base),
        subscribe_ws: format!("{}subscribe", base),
    })
}

/// WebSocket URL for `path` as seen by the client
fn ws_url(headers: &HeaderMap, path: &str) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let secure = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));
    let scheme = if secure { "wss" } else { "ws" };
    format!("{}://{}{}", scheme, host, path)
}
