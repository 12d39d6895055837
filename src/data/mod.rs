//! Data persistence layer
//!
//! Provides SQLite-backed and in-memory key/value storage for serialized event logs.

mod database;
mod kv;
mod migrations;
mod sqlite_kv;

pub use database::{Database, DatabaseError};
pub use kv::{KvStore, MemoryKvStore, StorageError};
pub use sqlite_kv::SqliteKvStore;
