use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::{Json, Response},
    routing::get,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::session::Bridge;
use super::websocket::handle_websocket;
use crate::config::BridgeConfig;
use crate::engine::EngineHandle;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    browser_connected: bool,
}

#[derive(Clone)]
struct AppState {
    bridge: Bridge,
    engine: EngineHandle,
}

#[derive(Clone)]
pub struct BridgeServer {
    pub port: u16,
    pub host: String,
    bridge: Bridge,
    engine: EngineHandle,
}

impl BridgeServer {
    pub fn new(config: &BridgeConfig, bridge: Bridge, engine: EngineHandle) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            bridge,
            engine,
        }
    }

    pub async fn start(&self) -> Result<()> {
        // Convert localhost to 127.0.0.1 for proper parsing
        let host = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            &self.host
        };
        let addr: SocketAddr = format!("{}:{}", host, self.port)
            .parse()
            .with_context(|| format!("Invalid bridge address {}:{}", self.host, self.port))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind page bridge to {}", addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(
            "🚀 Page bridge listening on ws://{}/bridge",
            listener.local_addr()?
        );
        axum::serve(listener, self.create_app()).await?;
        Ok(())
    }

    pub fn create_app(&self) -> Router {
        Router::new()
            .route("/bridge", get(bridge_handler))
            .route("/health", get(health))
            .with_state(AppState {
                bridge: self.bridge.clone(),
                engine: self.engine.clone(),
            })
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        browser_connected: state.bridge.is_connected(),
    })
}

async fn bridge_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("🔌 Browser bridge upgrade request received");
    ws.on_upgrade(move |socket| handle_websocket(socket, state.bridge, state.engine))
}
