//! Node configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the node can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use pizzino_shared::constants::{
    DEFAULT_DATABASE_FILE, DEFAULT_HTTP_PORT, MAX_BODY_SIZE, RELAY_INTERVAL_SECS,
};
use pizzino_shared::PublicKey;
use pizzino_store::RecordLayout;

/// Record layout of the collections whose values carry their own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLayout {
    Tupled,
    Projected,
}

impl StoreLayout {
    /// Layout for the datagram store (values are `StoredMessage`).
    pub fn datagrams(self) -> RecordLayout {
        match self {
            StoreLayout::Tupled => RecordLayout::Tupled,
            StoreLayout::Projected => RecordLayout::projected("datagram.id"),
        }
    }

    /// Layout for the outbox (values are `Datagram`).
    pub fn outbox(self) -> RecordLayout {
        match self {
            StoreLayout::Tupled => RecordLayout::Tupled,
            StoreLayout::Projected => RecordLayout::projected("id"),
        }
    }
}

impl std::str::FromStr for StoreLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tupled" => Ok(StoreLayout::Tupled),
            "projected" => Ok(StoreLayout::Projected),
            other => Err(format!("unknown store layout: {other}")),
        }
    }
}

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./pizzino.db`
    pub database_path: PathBuf,

    /// Period between two outbox drains.
    /// Env: `RELAY_INTERVAL_SECS`
    /// Default: `5`
    pub relay_interval: Duration,

    /// Env: `STORE_LAYOUT` (`tupled` / `projected`)
    /// Default: `tupled`
    pub store_layout: StoreLayout,

    /// Human-readable name for this node.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Largest accepted request body in bytes.
    /// Env: `MAX_BODY_SIZE`
    pub max_body_size: usize,

    /// The node's own public key, handed to clients opening a session.
    /// Env: `NODE_PUBLIC_KEY` (hex)
    /// Default: all-zeros (development only).
    pub node_public_key: PublicKey,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from(".").join(DEFAULT_DATABASE_FILE),
            relay_interval: Duration::from_secs(RELAY_INTERVAL_SECS),
            store_layout: StoreLayout::Tupled,
            instance_name: "Pizzino Node".to_string(),
            max_body_size: MAX_BODY_SIZE,
            node_public_key: PublicKey(vec![0u8; 32]),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("RELAY_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.relay_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid RELAY_INTERVAL_SECS, using default"),
            }
        }

        if let Some(val) = lookup("STORE_LAYOUT") {
            match val.parse::<StoreLayout>() {
                Ok(layout) => config.store_layout = layout,
                Err(e) => tracing::warn!(error = %e, "Invalid STORE_LAYOUT, using default"),
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = lookup("MAX_BODY_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_body_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BODY_SIZE, using default"),
            }
        }

        if let Some(hex_key) = lookup("NODE_PUBLIC_KEY") {
            match PublicKey::from_hex(&hex_key) {
                Ok(key) if !key.0.is_empty() => config.node_public_key = key,
                _ => tracing::warn!("Invalid NODE_PUBLIC_KEY, using default (dev-only)"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}
