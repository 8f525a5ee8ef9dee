//! Message use cases. Every entry point takes the actor and runs the
//! authorization check before touching storage.

use std::sync::Arc;

use domains::{
    AdminRepository, ClientInfo, Message, MessagePatch, MessageRepository, MessageWithAuthor,
    NewMessage, Page, Stats, User,
};
use tracing::info;

use crate::cancan::{authorize, is_admin, is_staff, Action};
use crate::error::{ServiceError, ServiceResult};
use crate::validation;

/// How many messages the homepage and profiles show.
pub const RECENT_LIMIT: i64 = 25;

/// Fields of `PUT /messages/{id}`; `None` (or blank) means "not submitted".
#[derive(Debug, Clone, Default)]
pub struct MessageUpdateForm {
    pub is_hidden: Option<String>,
    pub markup: Option<String>,
}

#[derive(Clone)]
pub struct BoardService {
    messages: Arc<dyn MessageRepository>,
    admin: Arc<dyn AdminRepository>,
}

impl BoardService {
    pub fn new(messages: Arc<dyn MessageRepository>, admin: Arc<dyn AdminRepository>) -> Self {
        Self { messages, admin }
    }

    pub async fn recent(&self) -> ServiceResult<Vec<MessageWithAuthor>> {
        Ok(self.messages.list_recent_messages(RECENT_LIMIT).await?)
    }

    pub async fn recent_for_user(&self, user: &User) -> ServiceResult<Vec<MessageWithAuthor>> {
        Ok(self
            .messages
            .list_recent_messages_for_user(user.id, RECENT_LIMIT)
            .await?)
    }

    /// Staff also see hidden messages.
    pub async fn list(&self, actor: Option<&User>, page: Page) -> ServiceResult<Vec<MessageWithAuthor>> {
        Ok(self.messages.list_messages(page, is_staff(actor)).await?)
    }

    pub async fn show(&self, actor: Option<&User>, id: i64) -> ServiceResult<MessageWithAuthor> {
        let item = self
            .messages
            .get_message_with_author(id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        authorize(actor, Action::ReadMessage(&item.message))?;
        Ok(item)
    }

    pub async fn create(
        &self,
        actor: Option<&User>,
        markup: &str,
        client: ClientInfo,
    ) -> ServiceResult<Message> {
        authorize(actor, Action::CreateMessage)?;
        let markup = validation::validate_markup(markup)?;

        let message = self
            .messages
            .insert_message(NewMessage {
                user_id: actor.map(|u| u.id),
                markup,
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            })
            .await?;
        info!(message_id = message.id, user_id = ?message.user_id, "message created");
        Ok(message)
    }

    pub async fn update(
        &self,
        actor: Option<&User>,
        id: i64,
        form: MessageUpdateForm,
    ) -> ServiceResult<Message> {
        let message = self.find(id).await?;
        authorize(actor, Action::UpdateMessage(&message))?;

        let mut patch = MessagePatch::default();
        if let Some(is_hidden) = validation::submitted(form.is_hidden.as_deref()) {
            authorize(actor, Action::UpdateMessageState(&message))?;
            patch.is_hidden = Some(validation::parse_bool(is_hidden)?);
        }
        if let Some(markup) = validation::submitted(form.markup.as_deref()) {
            authorize(actor, Action::UpdateMessageMarkup(&message))?;
            patch.markup = Some(validation::validate_markup(markup)?);
        }

        let updated = self
            .messages
            .update_message(message.id, patch)
            .await?
            .ok_or(ServiceError::NotFound)?;
        info!(message_id = updated.id, is_hidden = updated.is_hidden, "message updated");
        Ok(updated)
    }

    /// Soft delete.
    pub async fn hide(&self, actor: Option<&User>, id: i64) -> ServiceResult<Message> {
        let message = self.find(id).await?;
        authorize(actor, Action::DeleteMessage(&message))?;

        let patch = MessagePatch {
            is_hidden: Some(true),
            markup: None,
        };
        let hidden = self
            .messages
            .update_message(message.id, patch)
            .await?
            .ok_or(ServiceError::NotFound)?;
        info!(message_id = hidden.id, "message hidden");
        Ok(hidden)
    }

    pub async fn count_visible(&self) -> ServiceResult<i64> {
        Ok(self.messages.count_messages().await?)
    }

    pub async fn stats(&self, actor: Option<&User>) -> ServiceResult<Stats> {
        require_admin(actor)?;
        Ok(self.admin.get_stats().await?)
    }

    /// Hard-deletes every hidden message. Admin only.
    pub async fn purge_hidden(&self, actor: Option<&User>) -> ServiceResult<u64> {
        require_admin(actor)?;
        let deleted = self.messages.delete_hidden_messages().await?;
        info!(deleted, "hidden messages purged");
        Ok(deleted)
    }

    async fn find(&self, id: i64) -> ServiceResult<Message> {
        self.messages
            .get_message_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound)
    }
}

fn require_admin(actor: Option<&User>) -> ServiceResult<()> {
    if is_admin(actor) {
        Ok(())
    } else {
        Err(ServiceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{MockAdminRepository, MockMessageRepository, Role};

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            uname: format!("user{id}"),
            email: None,
            digest: String::new(),
            role,
            last_online_at: None,
            created_at: Utc::now(),
        }
    }

    fn message(id: i64, user_id: Option<i64>, is_hidden: bool) -> Message {
        Message {
            id,
            user_id,
            markup: "hello world".into(),
            is_hidden,
            ip_address: "10.0.0.1".into(),
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    fn service(messages: MockMessageRepository) -> BoardService {
        BoardService::new(Arc::new(messages), Arc::new(MockAdminRepository::new()))
    }

    fn with_message(msg: Message) -> MockMessageRepository {
        let mut repo = MockMessageRepository::new();
        let joined = msg.clone();
        repo.expect_get_message_by_id()
            .returning(move |id| Ok((id == msg.id).then(|| msg.clone())));
        repo.expect_get_message_with_author().returning(move |id| {
            Ok((id == joined.id).then(|| MessageWithAuthor {
                message: joined.clone(),
                author: None,
            }))
        });
        repo
    }

    #[tokio::test]
    async fn hidden_messages_are_not_found_for_non_staff() {
        let svc = service(with_message(message(1, Some(2), true)));
        let owner = user(2, Role::Member);
        let moderator = user(3, Role::Mod);

        assert_eq!(svc.show(None, 1).await, Err(ServiceError::NotFound));
        assert_eq!(svc.show(Some(&owner), 1).await, Err(ServiceError::NotFound));
        assert!(svc.show(Some(&moderator), 1).await.is_ok());
        assert_eq!(svc.show(Some(&moderator), 99).await, Err(ServiceError::NotFound));
    }

    #[tokio::test]
    async fn listing_includes_hidden_only_for_staff() {
        let mut repo = MockMessageRepository::new();
        repo.expect_list_messages()
            .withf(|_, include_hidden| !*include_hidden)
            .times(2)
            .returning(|_, _| Ok(vec![]));
        repo.expect_list_messages()
            .withf(|_, include_hidden| *include_hidden)
            .times(2)
            .returning(|_, _| Ok(vec![]));
        let svc = service(repo);
        let page = Page::new(1, 10);

        svc.list(None, page).await.unwrap();
        svc.list(Some(&user(1, Role::Member)), page).await.unwrap();
        svc.list(Some(&user(2, Role::Mod)), page).await.unwrap();
        svc.list(Some(&user(3, Role::Admin)), page).await.unwrap();
    }

    #[tokio::test]
    async fn guests_post_anonymously() {
        let mut repo = MockMessageRepository::new();
        repo.expect_insert_message()
            .withf(|m| m.user_id.is_none() && m.markup == "hi there" && m.ip_address == "1.2.3.4")
            .times(1)
            .returning(|m| {
                let mut msg = message(5, None, false);
                msg.markup = m.markup;
                Ok(msg)
            });

        let client = ClientInfo {
            ip_address: "1.2.3.4".into(),
            user_agent: None,
        };
        let msg = service(repo).create(None, "  hi there \n", client).await.unwrap();
        assert_eq!(msg.markup, "hi there");
    }

    #[tokio::test]
    async fn banned_users_cannot_post() {
        let mut repo = MockMessageRepository::new();
        repo.expect_insert_message().never();
        let banned = user(1, Role::Banned);
        assert_eq!(
            service(repo).create(Some(&banned), "hello", ClientInfo::default()).await,
            Err(ServiceError::NotFound)
        );
    }

    #[tokio::test]
    async fn short_markup_is_rejected() {
        let err = service(MockMessageRepository::new())
            .create(None, "hi", ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Validation("Message must be 3-300 chars".into()));
    }

    #[tokio::test]
    async fn owners_edit_markup_but_cannot_unhide() {
        let mut repo = with_message(message(1, Some(2), false));
        repo.expect_update_message()
            .withf(|id, patch| *id == 1 && patch.markup.as_deref() == Some("edited") && patch.is_hidden.is_none())
            .times(1)
            .returning(|_, patch| {
                let mut msg = message(1, Some(2), false);
                msg.markup = patch.markup.unwrap_or_default();
                Ok(Some(msg))
            });
        let svc = service(repo);
        let owner = user(2, Role::Member);

        let form = MessageUpdateForm {
            is_hidden: None,
            markup: Some("edited".into()),
        };
        assert_eq!(svc.update(Some(&owner), 1, form).await.unwrap().markup, "edited");

        let form = MessageUpdateForm {
            is_hidden: Some("false".into()),
            markup: None,
        };
        assert_eq!(svc.update(Some(&owner), 1, form).await, Err(ServiceError::NotFound));
    }

    #[tokio::test]
    async fn blank_fields_are_not_submitted() {
        let mut repo = with_message(message(1, Some(2), false));
        repo.expect_update_message()
            .withf(|id, patch| *id == 1 && patch.markup.as_deref() == Some("new text") && patch.is_hidden.is_none())
            .times(1)
            .returning(|_, patch| {
                let mut msg = message(1, Some(2), false);
                msg.markup = patch.markup.unwrap_or_default();
                Ok(Some(msg))
            });
        let owner = user(2, Role::Member);

        let form = MessageUpdateForm {
            is_hidden: Some("".into()),
            markup: Some("new text".into()),
        };
        let updated = service(repo).update(Some(&owner), 1, form).await.unwrap();
        assert_eq!(updated.markup, "new text");
        assert!(!updated.is_hidden);
    }

    #[tokio::test]
    async fn strangers_cannot_update() {
        let svc = service(with_message(message(1, Some(2), false)));
        let stranger = user(9, Role::Member);
        let form = MessageUpdateForm {
            is_hidden: None,
            markup: Some("mine now".into()),
        };
        assert_eq!(svc.update(Some(&stranger), 1, form).await, Err(ServiceError::NotFound));
    }

    #[tokio::test]
    async fn hide_is_a_soft_delete() {
        let mut repo = with_message(message(1, Some(2), false));
        repo.expect_update_message()
            .withf(|id, patch| *id == 1 && patch.is_hidden == Some(true) && patch.markup.is_none())
            .times(1)
            .returning(|_, _| Ok(Some(message(1, Some(2), true))));
        let svc = service(repo);

        assert!(svc.hide(Some(&user(2, Role::Member)), 1).await.unwrap().is_hidden);
        assert_eq!(svc.hide(None, 1).await, Err(ServiceError::NotFound));
    }

    #[tokio::test]
    async fn admin_only_operations() {
        let mut admin_repo = MockAdminRepository::new();
        admin_repo.expect_get_stats().times(1).returning(|| {
            Ok(Stats {
                users_count: 3,
                messages_count: 10,
            })
        });
        let mut repo = MockMessageRepository::new();
        repo.expect_delete_hidden_messages().times(1).returning(|| Ok(4));
        let svc = BoardService::new(Arc::new(repo), Arc::new(admin_repo));

        let moderator = user(1, Role::Mod);
        let admin = user(2, Role::Admin);
        assert_eq!(svc.stats(Some(&moderator)).await, Err(ServiceError::NotFound));
        assert_eq!(svc.purge_hidden(None).await, Err(ServiceError::NotFound));
        assert_eq!(svc.stats(Some(&admin)).await.unwrap().users_count, 3);
        assert_eq!(svc.purge_hidden(Some(&admin)).await, Ok(4));
    }
}
