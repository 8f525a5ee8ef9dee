//! # Postgres adapter
//!
//! Runtime-checked `sqlx` queries against the schema in `sql/schema.sql`.
//! `inet` columns are written with an explicit cast and read back through
//! `host()` so the domain only ever sees plain strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    AdminRepository, BumpOutcome, DomainError, Message, MessagePatch, MessageRepository,
    MessageWithAuthor, NewMessage, NewSession, NewUser, Page, RatelimitRepository, Role, Session,
    SessionRepository, Stats, User, UserPatch, UserRepository, UserSummary,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

type Result<T> = domains::Result<T>;

/// The full schema. Running it drops every existing table.
pub const SCHEMA: &str = include_str!("../sql/schema.sql");

const USER_COLUMNS: &str = "id, uname, email, digest, role, last_online_at, created_at";

const MESSAGE_COLUMNS: &str =
    "id, user_id, markup, is_hidden, host(ip_address) AS ip_address, user_agent, created_at";

const SESSION_COLUMNS: &str =
    "id, user_id, host(ip_address) AS ip_address, user_agent, expired_at, logged_out_at, created_at";

const MESSAGES_WITH_AUTHOR: &str = r#"
SELECT
  m.id, m.user_id, m.markup, m.is_hidden, host(m.ip_address) AS ip_address,
  m.user_agent, m.created_at,
  u.id             AS author_id,
  u.uname          AS author_uname,
  u.email          AS author_email,
  u.digest         AS author_digest,
  u.role           AS author_role,
  u.last_online_at AS author_last_online_at,
  u.created_at     AS author_created_at
FROM messages m
LEFT JOIN users u ON u.id = m.user_id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Drops and recreates every table.
    pub async fn reset_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

/// Serialization failures and deadlocks become `TransactionConflict`, unique
/// violations become `Conflict`, everything else is `Internal`.
pub fn db_err(err: sqlx::Error) -> DomainError {
    if let Some(db) = err.as_database_error() {
        match db.code().as_deref() {
            Some("40001") | Some("40P01") => {
                return DomainError::TransactionConflict(db.message().to_string())
            }
            Some("23505") => return DomainError::Conflict(db.message().to_string()),
            _ => {}
        }
    }
    DomainError::Internal(err.to_string())
}

fn parse_role(raw: &str) -> std::result::Result<Role, sqlx::Error> {
    raw.parse::<Role>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Reads a user from columns named `{prefix}id`, `{prefix}uname`, ...
fn user_from_row(row: &PgRow, prefix: &str) -> std::result::Result<User, sqlx::Error> {
    let col = |name: &str| format!("{prefix}{name}");
    let role: String = row.try_get(col("role").as_str())?;
    Ok(User {
        id: row.try_get(col("id").as_str())?,
        uname: row.try_get(col("uname").as_str())?,
        email: row.try_get(col("email").as_str())?,
        digest: row.try_get(col("digest").as_str())?,
        role: parse_role(&role)?,
        last_online_at: row.try_get(col("last_online_at").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
    })
}

fn message_from_row(row: &PgRow) -> std::result::Result<Message, sqlx::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        markup: row.try_get("markup")?,
        is_hidden: row.try_get("is_hidden")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
    })
}

fn message_with_author_from_row(row: &PgRow) -> std::result::Result<MessageWithAuthor, sqlx::Error> {
    let author_id: Option<i64> = row.try_get("author_id")?;
    let author = match author_id {
        Some(_) => Some(user_from_row(row, "author_")?),
        None => None,
    };
    Ok(MessageWithAuthor {
        message: message_from_row(row)?,
        author,
    })
}

fn session_from_row(row: &PgRow) -> std::result::Result<Session, sqlx::Error> {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        expired_at: row.try_get("expired_at")?,
        logged_out_at: row.try_get("logged_out_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn many<T>(
    rows: Vec<PgRow>,
    map: impl Fn(&PgRow) -> std::result::Result<T, sqlx::Error>,
) -> Result<Vec<T>> {
    rows.iter().map(|row| map(row).map_err(db_err)).collect()
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get_user_by_uname(&self, uname: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(uname) = lower($1)");
        let row = sqlx::query(&sql)
            .bind(uname)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| user_from_row(&r, "")).transpose().map_err(db_err)
    }

    async fn get_user_by_session_id(&self, session_id: Uuid) -> Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET last_online_at = NOW()
            WHERE id = (
              SELECT user_id
              FROM sessions
              WHERE id = $1
                AND logged_out_at IS NULL
                AND expired_at > NOW()
            )
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| user_from_row(&r, "")).transpose().map_err(db_err)
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (uname, email, digest) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&new_user.uname)
            .bind(&new_user.email)
            .bind(&new_user.digest)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        user_from_row(&row, "").map_err(db_err)
    }

    async fn update_user(&self, user_id: i64, patch: UserPatch) -> Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET
              email = COALESCE($2, email),
              role  = COALESCE($3, role)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(patch.email)
            .bind(patch.role.map(|r| r.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| user_from_row(&r, "")).transpose().map_err(db_err)
    }

    async fn update_user_role(&self, user_id: i64, role: Role) -> Result<Option<User>> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| user_from_row(&r, "")).transpose().map_err(db_err)
    }

    async fn list_users(&self, page: Page) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
              u.id, u.uname, u.email, u.digest, u.role, u.last_online_at, u.created_at,
              (
                SELECT COUNT(*)
                FROM messages
                WHERE user_id = u.id AND is_hidden = false
              ) AS messages_count
            FROM users u
            ORDER BY u.id DESC
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(page.offset())
        .bind(page.per_page)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        many(rows, |row| {
            Ok(UserSummary {
                user: user_from_row(row, "")?,
                messages_count: row.try_get("messages_count")?,
            })
        })
    }

    async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, new_session: NewSession) -> Result<Session> {
        let sql = format!(
            r#"
            INSERT INTO sessions (id, user_id, ip_address, user_agent, expired_at)
            VALUES ($1, $2, $3::inet, $4, $5)
            RETURNING {SESSION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new_session.user_id)
            .bind(&new_session.ip_address)
            .bind(&new_session.user_agent)
            .bind(Utc::now() + new_session.lifetime)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        session_from_row(&row).map_err(db_err)
    }

    async fn logout_session(&self, user_id: i64, session_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET logged_out_at = NOW()
            WHERE user_id = $1
              AND id = $2
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for PgStore {
    async fn get_message_by_id(&self, message_id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| message_from_row(&r)).transpose().map_err(db_err)
    }

    async fn get_message_with_author(&self, message_id: i64) -> Result<Option<MessageWithAuthor>> {
        let sql = format!("{MESSAGES_WITH_AUTHOR} WHERE m.id = $1");
        let row = sqlx::query(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| message_with_author_from_row(&r))
            .transpose()
            .map_err(db_err)
    }

    async fn insert_message(&self, new_message: NewMessage) -> Result<Message> {
        let sql = format!(
            r#"
            INSERT INTO messages (user_id, markup, ip_address, user_agent)
            VALUES ($1, $2, $3::inet, $4)
            RETURNING {MESSAGE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(new_message.user_id)
            .bind(&new_message.markup)
            .bind(&new_message.ip_address)
            .bind(&new_message.user_agent)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        message_from_row(&row).map_err(db_err)
    }

    async fn update_message(&self, message_id: i64, patch: MessagePatch) -> Result<Option<Message>> {
        let sql = format!(
            r#"
            UPDATE messages
            SET
              is_hidden = COALESCE($2, is_hidden),
              markup    = COALESCE($3, markup)
            WHERE id = $1
            RETURNING {MESSAGE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(message_id)
            .bind(patch.is_hidden)
            .bind(patch.markup)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| message_from_row(&r)).transpose().map_err(db_err)
    }

    async fn list_recent_messages(&self, limit: i64) -> Result<Vec<MessageWithAuthor>> {
        let sql = format!("{MESSAGES_WITH_AUTHOR} WHERE m.is_hidden = false ORDER BY m.id DESC LIMIT $1");
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        many(rows, message_with_author_from_row)
    }

    async fn list_recent_messages_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageWithAuthor>> {
        let sql = format!(
            "{MESSAGES_WITH_AUTHOR} WHERE m.is_hidden = false AND m.user_id = $1 ORDER BY m.id DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        many(rows, message_with_author_from_row)
    }

    async fn list_messages(&self, page: Page, include_hidden: bool) -> Result<Vec<MessageWithAuthor>> {
        let sql = format!(
            "{MESSAGES_WITH_AUTHOR} WHERE ($1 OR m.is_hidden = false) ORDER BY m.id DESC OFFSET $2 LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(include_hidden)
            .bind(page.offset())
            .bind(page.per_page)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        many(rows, message_with_author_from_row)
    }

    async fn count_messages(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE is_hidden = false")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn delete_hidden_messages(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE is_hidden = true")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RatelimitRepository for PgStore {
    async fn bump(
        &self,
        ip_address: &str,
        ip_root: &str,
        max_date: DateTime<Utc>,
    ) -> Result<BumpOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let last_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT created_at
            FROM ratelimits
            WHERE ip_root = $1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(ip_root)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        if let Some(last_at) = last_at.filter(|at| *at > max_date) {
            tx.rollback().await.map_err(db_err)?;
            return Ok(BumpOutcome::TooRecent { last_at });
        }

        sqlx::query("INSERT INTO ratelimits (ip_address, ip_root) VALUES ($1::inet, $2)")
            .bind(ip_address)
            .bind(ip_root)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        // Serialization failures can also surface at commit
        tx.commit().await.map_err(db_err)?;
        debug!(ip_root, "ratelimit stamp inserted");
        Ok(BumpOutcome::Admitted)
    }
}

#[async_trait]
impl AdminRepository for PgStore {
    async fn get_stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT
              (SELECT COUNT(*) FROM users) AS users_count,
              (SELECT COUNT(*) FROM messages WHERE is_hidden = false) AS messages_count
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Stats {
            users_count: row.try_get("users_count").map_err(db_err)?,
            messages_count: row.try_get("messages_count").map_err(db_err)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_internal() {
        assert!(matches!(db_err(sqlx::Error::RowNotFound), DomainError::Internal(_)));
        assert!(matches!(db_err(sqlx::Error::PoolTimedOut), DomainError::Internal(_)));
    }

    #[test]
    fn schema_creates_every_table() {
        for table in ["users", "sessions", "messages", "ratelimits"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE {table}")), "{table}");
        }
    }
}
