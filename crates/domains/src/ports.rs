//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Mock implementations are generated for tests and for the `testing` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{
    BumpOutcome, Message, MessagePatch, MessageWithAuthor, NewMessage, NewSession, NewUser, Page,
    Role, Session, Stats, User, UserPatch, UserSummary,
};

/// Persistence contract for user accounts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Case-insensitive lookup.
    async fn get_user_by_uname(&self, uname: &str) -> Result<Option<User>>;

    /// Resolves an *active* session to its user and bumps `last_online_at`.
    async fn get_user_by_session_id(&self, session_id: Uuid) -> Result<Option<User>>;

    /// `new_user.digest` must already be hashed. Fails with `Conflict` when
    /// the uname is taken.
    async fn insert_user(&self, new_user: NewUser) -> Result<User>;

    async fn update_user(&self, user_id: i64, patch: UserPatch) -> Result<Option<User>>;

    async fn update_user_role(&self, user_id: i64, role: Role) -> Result<Option<User>>;

    /// Newest users first, each with its count of visible messages.
    async fn list_users(&self, page: Page) -> Result<Vec<UserSummary>>;

    async fn count_users(&self) -> Result<i64>;
}

/// Persistence contract for login sessions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, new_session: NewSession) -> Result<Session>;

    /// Marks the session as logged out. Only affects sessions owned by `user_id`.
    async fn logout_session(&self, user_id: i64, session_id: Uuid) -> Result<()>;
}

/// Persistence contract for messages.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn get_message_by_id(&self, message_id: i64) -> Result<Option<Message>>;

    async fn get_message_with_author(&self, message_id: i64) -> Result<Option<MessageWithAuthor>>;

    async fn insert_message(&self, new_message: NewMessage) -> Result<Message>;

    async fn update_message(&self, message_id: i64, patch: MessagePatch) -> Result<Option<Message>>;

    /// Newest visible messages.
    async fn list_recent_messages(&self, limit: i64) -> Result<Vec<MessageWithAuthor>>;

    /// Newest visible messages authored by `user_id`.
    async fn list_recent_messages_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageWithAuthor>>;

    /// Newest first. Hidden messages are only returned when `include_hidden`.
    async fn list_messages(&self, page: Page, include_hidden: bool) -> Result<Vec<MessageWithAuthor>>;

    /// Counts visible messages only.
    async fn count_messages(&self) -> Result<i64>;

    /// Hard-deletes every hidden message, returning how many rows went away.
    async fn delete_hidden_messages(&self) -> Result<u64>;
}

/// The ratelimit log.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RatelimitRepository: Send + Sync {
    /// Runs one serializable transaction: reads the newest stamp for
    /// `ip_root` and, unless it is newer than `max_date`, appends a new stamp.
    ///
    /// Serialization failures and deadlocks must be reported as
    /// `DomainError::TransactionConflict` so the caller can retry.
    async fn bump(
        &self,
        ip_address: &str,
        ip_root: &str,
        max_date: DateTime<Utc>,
    ) -> Result<BumpOutcome>;
}

/// Queries that only back the admin panel.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn get_stats(&self) -> Result<Stats>;
}

/// Password hashing contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PasswordService: Send + Sync {
    /// Returns a self-describing digest suitable for the `users.digest` column.
    async fn hash_password(&self, password: &str) -> Result<String>;

    /// Compares plaintext against a stored digest. Malformed digests never match.
    async fn check_password(&self, password: &str, digest: &str) -> bool;
}

/// Human-test verification contract (e.g. reCAPTCHA).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// `Ok(false)` means the provider rejected the response.
    async fn verify(&self, response: &str, remote_ip: &str) -> Result<bool>;
}
