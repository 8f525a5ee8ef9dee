//! messageboard/crates/auth-adapters/src/lib.rs
//!
//! Identity adapters: argon2 password hashing and, behind the `recaptcha`
//! feature, the reCAPTCHA human-test verifier.

pub mod passwords;
#[cfg(feature = "recaptcha")]
pub mod recaptcha;

pub use passwords::Argon2Passwords;
#[cfg(feature = "recaptcha")]
pub use recaptcha::RecaptchaVerifier;
