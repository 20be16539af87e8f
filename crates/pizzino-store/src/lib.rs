//! # pizzino-store
//!
//! Persistent state of a Pizzino node, backed by SQLite.
//!
//! Every collection is a [`KeyValueStore`] over one table of a shared
//! [`Database`]. On top of it sit the four typed collections the node routes
//! datagrams through: [`DatagramStore`], [`InboxIndex`], [`KeyBundlePool`]
//! and [`OutboxQueue`]. Multi-step updates are serialized per key with
//! [`KeyLocks`].

pub mod bundles;
pub mod database;
pub mod datagrams;
pub mod inbox;
pub mod kv;
pub mod locks;
pub mod migrations;
pub mod outbox;
pub mod records;

mod error;

pub use bundles::KeyBundlePool;
pub use database::{Database, SharedDatabase};
pub use datagrams::DatagramStore;
pub use error::{Result, StoreError};
pub use inbox::InboxIndex;
pub use kv::{Collection, KeyValueStore, RecordLayout};
pub use locks::KeyLocks;
pub use outbox::OutboxQueue;
pub use records::Table;
