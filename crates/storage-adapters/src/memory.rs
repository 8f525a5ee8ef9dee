//! # In-memory store
//!
//! Implements every storage port on top of `DashMap`s. Used when no
//! database is configured and by the HTTP integration tests.
//!
//! Ratelimit admission locks the address-root's log through the map entry,
//! so a read-then-append is atomic per root.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    AdminRepository, BumpOutcome, DomainError, Message, MessagePatch, MessageRepository,
    MessageWithAuthor, NewMessage, NewSession, NewUser, Page, RatelimitRepository, Ratelimit,
    Role, Session, SessionRepository, Stats, User, UserPatch, UserRepository, UserSummary,
};
use uuid::Uuid;

type Result<T> = domains::Result<T>;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    /// lower(uname) -> user id
    unames: DashMap<String, i64>,
    sessions: DashMap<Uuid, Session>,
    messages: DashMap<i64, Message>,
    /// ip_root -> stamps, oldest first
    ratelimits: DashMap<String, Vec<Ratelimit>>,
    user_seq: AtomicI64,
    message_seq: AtomicI64,
    ratelimit_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stamp with an explicit timestamp, bypassing admission.
    pub fn stamp_ratelimit(&self, ip_address: &str, ip_root: &str, created_at: DateTime<Utc>) {
        let id = next_id(&self.ratelimit_seq);
        self.ratelimits
            .entry(ip_root.to_string())
            .or_default()
            .push(Ratelimit {
                id,
                ip_address: ip_address.to_string(),
                ip_root: ip_root.to_string(),
                created_at,
            });
    }

    pub fn ratelimit_count(&self, ip_root: &str) -> usize {
        self.ratelimits.get(ip_root).map(|log| log.len()).unwrap_or(0)
    }

    fn with_author(&self, message: Message) -> MessageWithAuthor {
        let author = message
            .user_id
            .and_then(|id| self.users.get(&id).map(|u| u.clone()));
        MessageWithAuthor { message, author }
    }

    /// Newest first, filtered.
    fn messages_where(&self, keep: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| keep(m.value()))
            .map(|m| m.value().clone())
            .collect();
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        messages
    }
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset().max(0) as usize)
        .take(page.per_page.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_user_by_uname(&self, uname: &str) -> Result<Option<User>> {
        let Some(id) = self.unames.get(&uname.to_lowercase()).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_user_by_session_id(&self, session_id: Uuid) -> Result<Option<User>> {
        let now = Utc::now();
        let user_id = match self.sessions.get(&session_id) {
            Some(session) if session.is_active(now) => session.user_id,
            _ => return Ok(None),
        };
        Ok(self.users.get_mut(&user_id).map(|mut user| {
            user.last_online_at = Some(now);
            user.clone()
        }))
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User> {
        match self.unames.entry(new_user.uname.to_lowercase()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "uname {} is taken",
                new_user.uname
            ))),
            Entry::Vacant(slot) => {
                let user = User {
                    id: next_id(&self.user_seq),
                    uname: new_user.uname,
                    email: new_user.email,
                    digest: new_user.digest,
                    role: Role::Member,
                    last_online_at: None,
                    created_at: Utc::now(),
                };
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    async fn update_user(&self, user_id: i64, patch: UserPatch) -> Result<Option<User>> {
        Ok(self.users.get_mut(&user_id).map(|mut user| {
            if let Some(email) = patch.email {
                user.email = Some(email);
            }
            if let Some(role) = patch.role {
                user.role = role;
            }
            user.clone()
        }))
    }

    async fn update_user_role(&self, user_id: i64, role: Role) -> Result<Option<User>> {
        Ok(self.users.get_mut(&user_id).map(|mut user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn list_users(&self, page: Page) -> Result<Vec<UserSummary>> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(paginate(users, page)
            .into_iter()
            .map(|user| {
                let messages_count = self
                    .messages
                    .iter()
                    .filter(|m| m.user_id == Some(user.id) && !m.is_hidden)
                    .count() as i64;
                UserSummary {
                    user,
                    messages_count,
                }
            })
            .collect())
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.users.len() as i64)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, new_session: NewSession) -> Result<Session> {
        if !self.users.contains_key(&new_session.user_id) {
            return Err(DomainError::NotFound(
                "User".into(),
                new_session.user_id.to_string(),
            ));
        }
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: new_session.user_id,
            ip_address: new_session.ip_address,
            user_agent: new_session.user_agent,
            expired_at: now + new_session.lifetime,
            logged_out_at: None,
            created_at: now,
        };
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn logout_session(&self, user_id: i64, session_id: Uuid) -> Result<()> {
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            if session.user_id == user_id {
                session.logged_out_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn get_message_by_id(&self, message_id: i64) -> Result<Option<Message>> {
        Ok(self.messages.get(&message_id).map(|m| m.clone()))
    }

    async fn get_message_with_author(&self, message_id: i64) -> Result<Option<MessageWithAuthor>> {
        let message = self.messages.get(&message_id).map(|m| m.clone());
        Ok(message.map(|m| self.with_author(m)))
    }

    async fn insert_message(&self, new_message: NewMessage) -> Result<Message> {
        let message = Message {
            id: next_id(&self.message_seq),
            user_id: new_message.user_id,
            markup: new_message.markup,
            is_hidden: false,
            ip_address: new_message.ip_address,
            user_agent: new_message.user_agent,
            created_at: Utc::now(),
        };
        self.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn update_message(&self, message_id: i64, patch: MessagePatch) -> Result<Option<Message>> {
        Ok(self.messages.get_mut(&message_id).map(|mut message| {
            if let Some(is_hidden) = patch.is_hidden {
                message.is_hidden = is_hidden;
            }
            if let Some(markup) = patch.markup {
                message.markup = markup;
            }
            message.clone()
        }))
    }

    async fn list_recent_messages(&self, limit: i64) -> Result<Vec<MessageWithAuthor>> {
        Ok(self
            .messages_where(|m| !m.is_hidden)
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|m| self.with_author(m))
            .collect())
    }

    async fn list_recent_messages_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageWithAuthor>> {
        Ok(self
            .messages_where(|m| !m.is_hidden && m.user_id == Some(user_id))
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|m| self.with_author(m))
            .collect())
    }

    async fn list_messages(&self, page: Page, include_hidden: bool) -> Result<Vec<MessageWithAuthor>> {
        let messages = self.messages_where(|m| include_hidden || !m.is_hidden);
        Ok(paginate(messages, page)
            .into_iter()
            .map(|m| self.with_author(m))
            .collect())
    }

    async fn count_messages(&self) -> Result<i64> {
        Ok(self.messages.iter().filter(|m| !m.is_hidden).count() as i64)
    }

    async fn delete_hidden_messages(&self) -> Result<u64> {
        let mut removed = 0u64;
        self.messages.retain(|_, m| {
            if m.is_hidden {
                removed += 1;
            }
            !m.is_hidden
        });
        Ok(removed)
    }
}

#[async_trait]
impl RatelimitRepository for MemoryStore {
    async fn bump(
        &self,
        ip_address: &str,
        ip_root: &str,
        max_date: DateTime<Utc>,
    ) -> Result<BumpOutcome> {
        // The entry guard holds the shard lock until the stamp is pushed
        let mut log = self.ratelimits.entry(ip_root.to_string()).or_default();
        if let Some(last) = log.last() {
            if last.created_at > max_date {
                return Ok(BumpOutcome::TooRecent {
                    last_at: last.created_at,
                });
            }
        }
        log.push(Ratelimit {
            id: next_id(&self.ratelimit_seq),
            ip_address: ip_address.to_string(),
            ip_root: ip_root.to_string(),
            created_at: Utc::now(),
        });
        Ok(BumpOutcome::Admitted)
    }
}

#[async_trait]
impl AdminRepository for MemoryStore {
    async fn get_stats(&self) -> Result<Stats> {
        Ok(Stats {
            users_count: self.count_users().await?,
            messages_count: self.count_messages().await?,
        })
    }
}
