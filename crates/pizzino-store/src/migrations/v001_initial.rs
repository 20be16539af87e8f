//! v001 -- Initial schema creation.
//!
//! One table per collection. Every table has the same shape: `key` holds the
//! canonical JSON encoding of the record key and is unique, `document` holds
//! the stored JSON document, and `seq` preserves insertion order for scans.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Datagrams held for their receivers
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS datagrams (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    key      TEXT NOT NULL UNIQUE,            -- DatagramId
    document TEXT NOT NULL                    -- StoredMessage
);

-- ----------------------------------------------------------------
-- Per-receiver inbox index
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS inbox (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    key      TEXT NOT NULL UNIQUE,            -- UserId
    document TEXT NOT NULL                    -- ordered DatagramId list
);

-- ----------------------------------------------------------------
-- Key-exchange bundles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS bundles (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    key      TEXT NOT NULL UNIQUE,            -- UserId
    document TEXT NOT NULL                    -- KeyExchangeDataBundle
);

-- ----------------------------------------------------------------
-- Datagrams awaiting relay to another node
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS outbox (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    key      TEXT NOT NULL UNIQUE,            -- DatagramId
    document TEXT NOT NULL                    -- Datagram
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
