/// Protocol version advertised by `/info`
pub const PROTOCOL_VERSION: &str = "/pizzino/1.0.0";

/// Application name
pub const APP_NAME: &str = "Pizzino";

/// Default period between two outbox drains, in seconds
pub const RELAY_INTERVAL_SECS: u64 = 5;

/// Maximum request body accepted by the node (8 MiB)
pub const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default SQLite database file
pub const DEFAULT_DATABASE_FILE: &str = "pizzino.db";
