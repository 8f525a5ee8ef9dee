//! messageboard/crates/services/src/lib.rs
//!
//! Use cases of the messageboard: authorization rules, rate limiting, input
//! validation and the account and message flows built on top of the ports.

pub mod accounts;
pub mod board;
pub mod cancan;
pub mod error;
pub mod ratelimit;
pub mod validation;

pub use accounts::{AccountService, LoginForm, RegisterForm, UserUpdateForm};
pub use board::{BoardService, MessageUpdateForm};
pub use error::{ServiceError, ServiceResult};
pub use ratelimit::{RateLimitError, RateLimitSettings, RateLimiter};
