mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use harmony_gateway::session::Session;
use harmony_gateway::{auth, connection};
use harmony_store::SqliteStore;

use crate::config::ServerConfig;

#[derive(Clone)]
struct ServerState {
    store: Arc<SqliteStore>,
    config: Arc<ServerConfig>,
}

#[derive(Deserialize)]
struct GatewayParams {
    #[serde(default)]
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harmony=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init store
    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    info!("Store opened at {}", config.db_path.display());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = ServerState {
        store,
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Harmony server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(params): Query<GatewayParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let user = match auth::verify_token(&state.config.jwt_secret, &params.token) {
        Ok(user) => user,
        Err(e) => {
            warn!("Rejected gateway upgrade: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let session = Session::new(state.store.clone(), user);
    let seed_defaults = state.config.seed_defaults;
    ws.on_upgrade(move |socket| connection::handle_connection(socket, session, seed_defaults))
}
