//! Account use cases: registration, login sessions and profile updates.

use std::sync::Arc;

use chrono::Duration;
use domains::{
    ClientInfo, DomainError, NewSession, NewUser, Page, PasswordService, Session, SessionRepository,
    User, UserPatch, UserRepository, UserSummary,
};
use tracing::info;
use uuid::Uuid;

use crate::cancan::{authorize, Action};
use crate::error::{ServiceError, ServiceResult};
use crate::validation;

/// Lifetime of sessions created by registration and "remember me" logins.
pub fn long_session() -> Duration {
    Duration::days(365)
}

/// Lifetime of ordinary login sessions.
pub fn short_session() -> Duration {
    Duration::days(14)
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub uname: String,
    pub password1: String,
    pub password2: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub uname: String,
    pub password: String,
    pub remember_me: bool,
}

/// Fields of `PUT /users/{uname}`; `None` (or blank) means "not submitted".
#[derive(Debug, Clone, Default)]
pub struct UserUpdateForm {
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    passwords: Arc<dyn PasswordService>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        passwords: Arc<dyn PasswordService>,
    ) -> Self {
        Self {
            users,
            sessions,
            passwords,
        }
    }

    /// Resolves a session cookie to its user. Unknown, expired and logged-out
    /// sessions all yield `None`.
    pub async fn current_user(&self, session_id: Uuid) -> ServiceResult<Option<User>> {
        Ok(self.users.get_user_by_session_id(session_id).await?)
    }

    /// Creates the account and logs it in with a long-lived session.
    pub async fn register(
        &self,
        form: RegisterForm,
        client: ClientInfo,
    ) -> ServiceResult<(User, Session)> {
        let uname = validation::validate_uname(&form.uname)?;
        if self.users.get_user_by_uname(&uname).await?.is_some() {
            return Err(ServiceError::Validation("Username taken".into()));
        }
        validation::validate_password(&form.password1, &form.password2)?;
        let email = validation::validate_email(form.email.as_deref())?;

        let digest = self.passwords.hash_password(&form.password1).await?;
        let user = match self
            .users
            .insert_user(NewUser {
                uname,
                email,
                digest,
            })
            .await
        {
            Ok(user) => user,
            // Lost a race with a concurrent registration
            Err(DomainError::Conflict(_)) => {
                return Err(ServiceError::Validation("Username taken".into()))
            }
            Err(err) => return Err(err.into()),
        };
        info!(user_id = user.id, uname = %user.uname, "user registered");

        let session = self.open_session(&user, client, long_session()).await?;
        Ok((user, session))
    }

    /// Checks credentials. Every failure reads the same so unames can't be probed.
    pub async fn login(&self, form: LoginForm, client: ClientInfo) -> ServiceResult<(User, Session)> {
        let invalid = || ServiceError::Validation("Invalid creds".into());

        let uname = form.uname.trim();
        if uname.is_empty() || form.password.is_empty() {
            return Err(invalid());
        }
        let user = self.users.get_user_by_uname(uname).await?.ok_or_else(invalid)?;
        if !self.passwords.check_password(&form.password, &user.digest).await {
            return Err(invalid());
        }

        let lifetime = if form.remember_me {
            long_session()
        } else {
            short_session()
        };
        let session = self.open_session(&user, client, lifetime).await?;
        Ok((user, session))
    }

    pub async fn logout(&self, actor: Option<&User>, session_id: Uuid) -> ServiceResult<()> {
        let user = actor.ok_or(ServiceError::NotFound)?;
        self.sessions.logout_session(user.id, session_id).await?;
        Ok(())
    }

    async fn open_session(
        &self,
        user: &User,
        client: ClientInfo,
        lifetime: Duration,
    ) -> ServiceResult<Session> {
        let session = self
            .sessions
            .insert_session(NewSession {
                user_id: user.id,
                ip_address: client.ip_address,
                user_agent: client.user_agent,
                lifetime,
            })
            .await?;
        Ok(session)
    }

    pub async fn user_by_uname(&self, uname: &str) -> ServiceResult<User> {
        self.users
            .get_user_by_uname(uname)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// The user behind `/users/{uname}/edit`, if `actor` may edit it.
    pub async fn edit_user(&self, actor: Option<&User>, uname: &str) -> ServiceResult<User> {
        let user = self.user_by_uname(uname).await?;
        authorize(actor, Action::UpdateUserAny(&user))?;
        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: Option<&User>,
        uname: &str,
        form: UserUpdateForm,
    ) -> ServiceResult<User> {
        let user = self.user_by_uname(uname).await?;
        authorize(actor, Action::UpdateUserAny(&user))?;

        let mut patch = UserPatch::default();
        if let Some(role) = validation::submitted(form.role.as_deref()) {
            authorize(actor, Action::UpdateUserRole(&user))?;
            patch.role = Some(validation::parse_role(role)?);
        }
        if let Some(email) = validation::submitted(form.email.as_deref()) {
            authorize(actor, Action::UpdateUserSettings(&user))?;
            patch.email = validation::validate_email(Some(email))?;
        }

        let updated = self
            .users
            .update_user(user.id, patch)
            .await?
            .ok_or(ServiceError::NotFound)?;
        info!(user_id = updated.id, "user updated");
        Ok(updated)
    }

    pub async fn update_role(
        &self,
        actor: Option<&User>,
        uname: &str,
        role: &str,
    ) -> ServiceResult<User> {
        let user = self.user_by_uname(uname).await?;
        authorize(actor, Action::UpdateUserRole(&user))?;
        let role = validation::parse_role(role)?;

        let updated = self
            .users
            .update_user_role(user.id, role)
            .await?
            .ok_or(ServiceError::NotFound)?;
        info!(user_id = updated.id, role = %updated.role, "role changed");
        Ok(updated)
    }

    pub async fn list_users(&self, page: Page) -> ServiceResult<Vec<UserSummary>> {
        Ok(self.users.list_users(page).await?)
    }

    pub async fn count_users(&self) -> ServiceResult<i64> {
        Ok(self.users.count_users().await?)
    }
}
