use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::{ConnectInfo, State, WebSocketUpgrade},
        response::{IntoResponse, Json},
        routing::get,
    },
    tokio::net::TcpListener,
    tower_http::cors::{Any, CorsLayer},
    tracing::{info, warn},
};

use {
    wayfinder_config::WayfinderConfig,
    wayfinder_protocol::{MAX_PAYLOAD_BYTES, PROTOCOL_VERSION},
    wayfinder_session::{Capabilities, SessionRegistry, SessionSettings},
};

use crate::{state::GatewayState, ws::handle_connection};

/// Frames between [`MAX_PAYLOAD_BYTES`] and this bound are answered with an
/// `error` event; anything larger drops the socket.
const MAX_WS_MESSAGE_BYTES: usize = MAX_PAYLOAD_BYTES * 4;

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_upgrade_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve `state` on an already-bound listener until `shutdown` resolves, then
/// tear down every remaining session.
pub async fn serve(
    listener: TcpListener,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_app(Arc::clone(&state));
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    state.registry.shutdown().await;
    info!("gateway stopped");
    Ok(())
}

/// Start the gateway HTTP + WebSocket server and run until Ctrl-C.
pub async fn start(config: &WayfinderConfig, capabilities: Capabilities) -> anyhow::Result<()> {
    let generator = capabilities.generator.name().to_string();
    let registry = Arc::new(SessionRegistry::new(
        capabilities,
        SessionSettings::from_config(config),
    ));
    let state = GatewayState::new(registry);

    let listener = TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;
    let addr = listener.local_addr()?;

    let lines = [
        format!("wayfinder gateway v{}", state.version),
        format!("protocol v{PROTOCOL_VERSION}, listening on ws://{addr}/ws"),
        format!("generator: {generator}"),
        format!(
            "browser: {}",
            if config.browser.headless {
                "headless"
            } else {
                "headed"
            }
        ),
        format!("home: {}", config.session.home_url),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!(error = %e, "failed to listen for shutdown signal"),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let sessions = state.registry.len().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "protocol": PROTOCOL_VERSION,
        "sessions": sessions,
        "connections": state.connection_count(),
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_WS_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_connection(socket, state, addr))
}
