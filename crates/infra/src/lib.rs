//! Storage adapters: an in-memory store for tests and development, and a
//! Postgres store backed by `sqlx`.
//!
//! Both implement every storage contract the domain crates define
//! (`GrantSource`, `GrantStore`, the directories, `SoftDeleteStore`,
//! `AuditSink`, `AuditLogReader`).

pub mod config;
pub mod memory;
pub mod postgres;

pub use config::{ConfigError, StoreConfig};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
