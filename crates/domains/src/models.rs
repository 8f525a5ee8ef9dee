//! # Domain Models
//!
//! These structs represent the core entities of the messageboard.
//! Users and messages use database-assigned integer ids; sessions use UUID v4
//! so the id can double as an unguessable cookie value.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// The closed set of roles an authenticated user can hold.
///
/// Guests have no role at all; they are represented by the absence of a
/// [`User`], never by a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Mod,
    #[default]
    Member,
    Banned,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Mod, Role::Member, Role::Banned];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Mod => "MOD",
            Role::Member => "MEMBER",
            Role::Banned => "BANNED",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "MOD" => Ok(Role::Mod),
            "MEMBER" => Ok(Role::Member),
            "BANNED" => Ok(Role::Banned),
            other => Err(DomainError::ValidationError(format!("invalid role: {other}"))),
        }
    }
}

/// A registered account. Also the shape of an authenticated actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Unique, compared case-insensitively
    pub uname: String,
    pub email: Option<String>,
    /// Password hash in PHC string format
    #[serde(skip_serializing, default)]
    pub digest: String,
    pub role: Role,
    pub last_online_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn url(&self) -> String {
        format!("/users/{}", self.uname)
    }
}

/// A user row together with its count of visible messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user: User,
    pub messages_count: i64,
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Absent for messages posted by guests
    pub user_id: Option<i64>,
    pub markup: String,
    /// Soft-delete flag; hidden messages stay in storage
    pub is_hidden: bool,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn url(&self) -> String {
        format!("/messages/{}", self.id)
    }
}

/// A message joined with its author, as listings need it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWithAuthor {
    pub message: Message,
    pub author: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i64,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub expired_at: DateTime<Utc>,
    pub logged_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.logged_out_at.is_none() && self.expired_at > now
    }
}

/// One admitted rate-limited action. The table is an append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratelimit {
    pub id: i64,
    pub ip_address: String,
    /// Coarsened form of `ip_address` that groups neighbouring clients
    pub ip_root: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a single ratelimit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpOutcome {
    /// A new stamp was inserted and committed.
    Admitted,
    /// The latest stamp for the root is newer than the allowed maximum;
    /// nothing was written.
    TooRecent { last_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub users_count: i64,
    /// Hidden messages are effectively deleted and not counted
    pub messages_count: i64,
}

// ── Write models ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub uname: String,
    pub email: Option<String>,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub user_id: Option<i64>,
    pub markup: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub user_id: i64,
    pub ip_address: String,
    pub user_agent: Option<String>,
    /// How long the session lives from now
    pub lifetime: chrono::Duration,
}

/// Partial update of a message; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub is_hidden: Option<bool>,
    pub markup: Option<String>,
}

/// Partial update of a user; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub per_page: i64,
}

impl Page {
    pub fn new(number: i64, per_page: i64) -> Self {
        Self {
            number: number.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Saturates for absurd page numbers; such pages are simply empty.
    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.per_page)
    }

    /// Number of pages needed for `total` items, never less than one.
    pub fn total_pages(&self, total: i64) -> i64 {
        ((total + self.per_page - 1) / self.per_page).max(1)
    }
}

/// Where a request came from, as recorded on messages and sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: Option<String>,
}
