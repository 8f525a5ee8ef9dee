//! messageboard/crates/domains/src/lib.rs
//!
//! Domain models, error types and port definitions for the messageboard.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
