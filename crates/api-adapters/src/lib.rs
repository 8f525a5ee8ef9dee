//! messageboard/crates/api-adapters/src/lib.rs
//!
//! The HTTP surface of the messageboard. Framework-free pieces (flash
//! encoding, cookies, pagination, presenters) always compile; the axum
//! router and its middleware chain live behind the `web-axum` feature.

pub mod cookies;
pub mod flash;
pub mod paginate;
pub mod views;

#[cfg(feature = "web-axum")]
pub mod cache;
#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod state;

#[cfg(feature = "web-axum")]
pub use cache::CountsCache;
#[cfg(feature = "web-axum")]
pub use router::build_router;
#[cfg(feature = "web-axum")]
pub use state::{AppState, WebConfig};
