//! # pizzino-node
//!
//! Store-and-forward relay node for the Pizzino network.
//!
//! This binary provides:
//! - **Datagram ingestion**: encrypted batches are classified and either
//!   stored for their receivers or queued for relay
//! - **Inbox delivery** with seen-marking and explicit acknowledgement
//! - **Prekey distribution** from published key-exchange bundles
//! - **Relay worker** that periodically drains the outbox
//! - **REST API** (axum) exposing all of the above

mod api;
mod config;
mod error;
mod ingest;
mod node;
mod relay;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pizzino_shared::constants::APP_NAME;
use pizzino_shared::{BincodeCodec, TransparentSession};
use pizzino_store::Database;

use crate::api::AppState;
use crate::config::NodeConfig;
use crate::node::Node;
use crate::relay::UnroutedTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pizzino_node=debug")),
        )
        .init();

    info!("Starting {APP_NAME} node v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = NodeConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open storage and collaborators
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?.into_shared();
    info!(path = %config.database_path.display(), "Database opened");

    warn!("Using the transparent session provider: payloads are NOT encrypted");
    let session = Arc::new(TransparentSession::new(config.node_public_key.clone()));
    let node = Arc::new(Node::new(
        db,
        config.store_layout,
        session,
        Arc::new(BincodeCodec),
    ));

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------
    node.start_relay(Arc::new(UnroutedTransport), config.relay_interval)
        .await;

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server until it fails or Ctrl+C arrives
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState {
        node: node.clone(),
        config: Arc::new(config),
    };

    let outcome = tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = &result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    node.shutdown().await;
    outcome
}
