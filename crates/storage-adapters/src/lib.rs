//! messageboard/crates/storage-adapters/src/lib.rs
//!
//! Implementations of the storage ports: an in-memory store that is always
//! compiled, and a Postgres store behind the `db-postgres` feature.

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
