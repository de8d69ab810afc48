//! Taskgraph Server — HTTP adapter exposing the orchestrator's REST surface
//! over `taskgraph-core`.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use taskgraph_core::db::Database;
use taskgraph_core::state::{AppState, AppStateInner};
use taskgraph_core::EngineConfig;

/// Configuration for the orchestrator's HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            engine: EngineConfig::from_env(),
        }
    }
}

/// Create a shared `AppState` from resolved engine configuration.
///
/// Useful when the state needs to be shared between the HTTP server and
/// another consumer (a CLI command, an embedded test harness).
pub async fn create_app_state(engine: EngineConfig) -> Result<AppState, String> {
    let db = Database::open(&engine.db_path).map_err(|e| format!("failed to open database: {e}"))?;
    let state = AppStateInner::new(engine, db).map_err(|e| format!("failed to build app state: {e}"))?;
    Ok(Arc::new(state))
}

/// Start the HTTP server, building a fresh `AppState` from `config.engine`.
///
/// Returns the address actually bound (useful when `port` is 0).
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskgraph=info,tower_http=info".into()),
        )
        .try_init()
        .ok();

    tracing::info!(host = %config.host, port = config.port, "starting taskgraph server");

    let host = config.host.clone();
    let port = config.port;
    let state = create_app_state(config.engine).await?;

    start_server_with_state(&host, port, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(host: &str, port: u16, state: AppState) -> Result<SocketAddr, String> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app: Router = Router::new()
        .merge(api::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("invalid address: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind to {addr}: {e}"))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("failed to get local address: {e}"))?;

    tracing::info!(addr = %local_addr, "taskgraph server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok(local_addr)
}
