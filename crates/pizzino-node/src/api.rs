use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use pizzino_shared::constants::PROTOCOL_VERSION;
use pizzino_shared::UserId;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::node::Node;

#[derive(Clone)]
pub struct AppState {
    pub node: Arc<Node>,
    pub config: Arc<NodeConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(node_info))
        .route(
            "/messages",
            get(fetch_messages).post(upload_messages).delete(ack_messages),
        )
        .route("/handshake", get(node_handshake).post(client_handshake))
        .route("/handshake/bundle", put(publish_bundle).delete(revoke_bundle))
        .route("/handshake/:user_id", get(fetch_key_exchange))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct NodeInfoResponse {
    name: String,
    version: &'static str,
    protocol: &'static str,
    relay_running: bool,
    stored_datagrams: usize,
    inboxes: usize,
    bundles: usize,
    outbox: usize,
}

#[derive(Serialize)]
struct HandshakeResponse {
    user_id: String,
}

/// Raw binary response body.
fn octets(data: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], data).into_response()
}

/// Counts travel as a little-endian `u32`.
fn count(n: usize) -> Response {
    let n = u32::try_from(n).unwrap_or(u32::MAX);
    octets(n.to_le_bytes().to_vec())
}

async fn caller(state: &AppState, headers: &HeaderMap) -> Result<UserId, NodeError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .map(|v| {
            v.to_str()
                .map_err(|_| NodeError::UpstreamAuthFailure("malformed authorization header".into()))
        })
        .transpose()?;
    state.node.authenticate(auth).await
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn node_info(State(state): State<AppState>) -> Result<Json<NodeInfoResponse>, NodeError> {
    let status = state.node.status().await?;
    Ok(Json(NodeInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        protocol: PROTOCOL_VERSION,
        relay_running: state.node.relay_running().await,
        stored_datagrams: status.stored_datagrams,
        inboxes: status.inboxes,
        bundles: status.bundles,
        outbox: status.outbox,
    }))
}

async fn upload_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, NodeError> {
    let user = caller(&state, &headers).await?;
    let accepted = state.node.receive(&user, &body).await?;
    Ok(count(accepted))
}

async fn fetch_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, NodeError> {
    let user = caller(&state, &headers).await?;
    Ok(octets(state.node.deliver(&user).await?))
}

async fn ack_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, NodeError> {
    let user = caller(&state, &headers).await?;
    let removed = state.node.acknowledge(&user, &body).await?;
    Ok(count(removed))
}

async fn node_handshake(State(state): State<AppState>) -> Result<Response, NodeError> {
    Ok(octets(state.node.node_key_exchange().await?))
}

async fn client_handshake(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<HandshakeResponse>, NodeError> {
    let user = state.node.open_session(&body).await?;
    Ok(Json(HandshakeResponse {
        user_id: user.to_hex(),
    }))
}

async fn fetch_key_exchange(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Response, NodeError> {
    caller(&state, &headers).await?;
    let target = UserId::from_hex(&user_id)
        .map_err(|_| NodeError::BadRequest("user id must be 64 hex chars".into()))?;
    Ok(octets(state.node.fetch_key_exchange(&target).await?))
}

async fn publish_bundle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, NodeError> {
    let user = caller(&state, &headers).await?;
    state.node.publish_bundle(&user, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_bundle(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, NodeError> {
    let user = caller(&state, &headers).await?;
    state.node.revoke_bundle(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
