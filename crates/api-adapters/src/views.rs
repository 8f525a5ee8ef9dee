//! Askama pages and the presenters that feed them.
//!
//! Presenters decide every affordance up front (which buttons a viewer
//! sees, whether hidden content shows) by asking `cancan`; templates only
//! branch on the precomputed flags.

use askama::Template;
use chrono::{DateTime, Utc};
use domains::{MessageWithAuthor, Role, Stats, User, UserSummary};
use services::cancan::{can, is_admin, Action};
use uuid::Uuid;

use crate::flash::Flash;
use crate::paginate::PageLink;

/// Layout data shared by every page.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub title: String,
    /// Empty for guests
    pub viewer_uname: String,
    pub viewer_url: String,
    pub session_id: String,
    pub is_admin: bool,
    pub flash_kind: String,
    pub flash_text: String,
    pub flash: Flash,
    pub recaptcha_sitekey: String,
}

impl PageContext {
    pub fn new(
        title: &str,
        viewer: Option<&User>,
        session_id: Option<Uuid>,
        flash: &Flash,
        recaptcha_sitekey: Option<&str>,
    ) -> Self {
        let (flash_kind, flash_text) = match &flash.message {
            Some(m) => (m.kind.as_str().to_string(), m.text.clone()),
            None => (String::new(), String::new()),
        };
        Self {
            title: title.to_string(),
            viewer_uname: viewer.map(|u| u.uname.clone()).unwrap_or_default(),
            viewer_url: viewer.map(User::url).unwrap_or_default(),
            session_id: session_id.map(|id| id.to_string()).unwrap_or_default(),
            is_admin: is_admin(viewer),
            flash_kind,
            flash_text,
            flash: flash.clone(),
            recaptcha_sitekey: recaptcha_sitekey.unwrap_or_default().to_string(),
        }
    }

    pub fn signed_in(&self) -> bool {
        !self.viewer_uname.is_empty()
    }

    pub fn has_flash(&self) -> bool {
        !self.flash_text.is_empty()
    }

    pub fn has_recaptcha(&self) -> bool {
        !self.recaptcha_sitekey.is_empty()
    }

    /// A value the previous (rejected) form submission carried.
    pub fn param(&self, key: &str) -> &str {
        self.flash.param(key)
    }
}

#[derive(Debug, Clone)]
pub struct MessageView {
    pub id: i64,
    pub url: String,
    pub markup: String,
    pub is_hidden: bool,
    /// Empty for anonymous messages
    pub author_uname: String,
    pub author_url: String,
    pub created_at: String,
    pub created_ago: String,
    pub can_delete: bool,
    pub can_change_state: bool,
    pub can_edit_markup: bool,
}

impl MessageView {
    pub fn present(item: &MessageWithAuthor, viewer: Option<&User>, now: DateTime<Utc>) -> Self {
        let message = &item.message;
        Self {
            id: message.id,
            url: message.url(),
            markup: message.markup.clone(),
            is_hidden: message.is_hidden,
            author_uname: item.author.as_ref().map(|a| a.uname.clone()).unwrap_or_default(),
            author_url: item.author.as_ref().map(User::url).unwrap_or_default(),
            created_at: message.created_at.to_rfc3339(),
            created_ago: timeago(message.created_at, now),
            can_delete: can(viewer, Action::DeleteMessage(message)),
            can_change_state: can(viewer, Action::UpdateMessageState(message)),
            can_edit_markup: can(viewer, Action::UpdateMessageMarkup(message)),
        }
    }

    pub fn present_all(items: &[MessageWithAuthor], viewer: Option<&User>) -> Vec<Self> {
        let now = Utc::now();
        items.iter().map(|m| Self::present(m, viewer, now)).collect()
    }

    pub fn is_anonymous(&self) -> bool {
        self.author_uname.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UserView {
    pub uname: String,
    pub url: String,
    pub role: String,
    pub email: String,
    pub created_ago: String,
    pub last_online_ago: String,
    pub messages_count: i64,
    pub can_edit: bool,
    pub can_change_role: bool,
    pub can_change_settings: bool,
}

impl UserView {
    pub fn present(user: &User, messages_count: i64, viewer: Option<&User>, now: DateTime<Utc>) -> Self {
        Self {
            uname: user.uname.clone(),
            url: user.url(),
            role: user.role.as_str().to_string(),
            email: user.email.clone().unwrap_or_default(),
            created_ago: timeago(user.created_at, now),
            last_online_ago: user
                .last_online_at
                .map(|at| timeago(at, now))
                .unwrap_or_else(|| "never".to_string()),
            messages_count,
            can_edit: can(viewer, Action::UpdateUserAny(user)),
            can_change_role: can(viewer, Action::UpdateUserRole(user)),
            can_change_settings: can(viewer, Action::UpdateUserSettings(user)),
        }
    }

    pub fn present_all(items: &[UserSummary], viewer: Option<&User>) -> Vec<Self> {
        let now = Utc::now();
        items
            .iter()
            .map(|s| Self::present(&s.user, s.messages_count, viewer, now))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RoleOption {
    pub value: &'static str,
    pub selected: bool,
}

pub fn role_options(current: Role) -> Vec<RoleOption> {
    Role::ALL
        .iter()
        .map(|r| RoleOption {
            value: r.as_str(),
            selected: *r == current,
        })
        .collect()
}

/// Coarse relative time, e.g. `"3 hours ago"`.
pub fn timeago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;

    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if secs < 45 {
        "just now".to_string()
    } else if mins < 45 {
        plural(mins.max(1), "minute")
    } else if hours < 22 {
        plural(hours.max(1), "hour")
    } else if days < 26 {
        plural(days.max(1), "day")
    } else if days < 320 {
        plural((days / 30).max(1), "month")
    } else {
        plural((days / 365).max(1), "year")
    }
}

// ── Pages ────────────────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "homepage.html")]
pub struct HomePage {
    pub ctx: PageContext,
    pub messages: Vec<MessageView>,
    pub can_post: bool,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "messages_list.html")]
pub struct MessagesListPage {
    pub ctx: PageContext,
    pub messages: Vec<MessageView>,
    pub paginator: Vec<PageLink>,
    pub total: i64,
}

#[derive(Template)]
#[template(path = "messages_show.html")]
pub struct MessageShowPage {
    pub ctx: PageContext,
    pub message: MessageView,
}

#[derive(Template)]
#[template(path = "users_list.html")]
pub struct UsersListPage {
    pub ctx: PageContext,
    pub users: Vec<UserView>,
    pub paginator: Vec<PageLink>,
    pub total: i64,
}

#[derive(Template)]
#[template(path = "users_show.html")]
pub struct UserShowPage {
    pub ctx: PageContext,
    pub user: UserView,
    pub messages: Vec<MessageView>,
}

#[derive(Template)]
#[template(path = "users_edit.html")]
pub struct UserEditPage {
    pub ctx: PageContext,
    pub user: UserView,
    pub roles: Vec<RoleOption>,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminPage {
    pub ctx: PageContext,
    pub stats: Stats,
}

#[derive(Template, Default)]
#[template(path = "not_found.html")]
pub struct NotFoundPage {
    pub ctx: PageContext,
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::Message;

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

    fn message(user_id: Option<i64>, is_hidden: bool) -> MessageWithAuthor {
        MessageWithAuthor {
            message: Message {
                id: 7,
                user_id,
                markup: "<b>hi</b>".into(),
                is_hidden,
                ip_address: "1.2.3.4".into(),
                user_agent: None,
                created_at: Utc::now(),
            },
            author: user_id.map(|id| user(id, Role::Member)),
        }
    }

    #[test]
    fn timeago_buckets() {
        let now = Utc::now();
        let ago = |secs: i64| timeago(now - chrono::Duration::seconds(secs), now);
        assert_eq!(ago(5), "just now");
        assert_eq!(ago(60), "1 minute ago");
        assert_eq!(ago(10 * 60), "10 minutes ago");
        assert_eq!(ago(3 * 3600), "3 hours ago");
        assert_eq!(ago(24 * 3600), "1 day ago");
        assert_eq!(ago(60 * 86_400), "2 months ago");
        assert_eq!(ago(800 * 86_400), "2 years ago");
        assert_eq!(ago(-30), "just now");
    }

    #[test]
    fn owners_get_their_buttons() {
        let owner = user(1, Role::Member);
        let view = MessageView::present(&message(Some(1), false), Some(&owner), Utc::now());
        assert!(view.can_delete);
        assert!(view.can_edit_markup);
        assert!(!view.can_change_state);
        assert_eq!(view.author_uname, "user1");
    }

    #[test]
    fn guests_get_no_buttons() {
        let view = MessageView::present(&message(None, false), None, Utc::now());
        assert!(view.is_anonymous());
        assert!(!view.can_delete && !view.can_edit_markup && !view.can_change_state);
    }

    #[test]
    fn staff_may_toggle_state() {
        let moderator = user(2, Role::Mod);
        let view = MessageView::present(&message(Some(1), true), Some(&moderator), Utc::now());
        assert!(view.can_change_state);
        assert!(view.can_delete);
    }

    #[test]
    fn markup_is_escaped_when_rendered() {
        let page = MessageShowPage {
            ctx: PageContext::default(),
            message: MessageView::present(&message(None, false), None, Utc::now()),
        };
        let html = page.render().unwrap();
        assert!(html.contains("&lt;b&gt;hi"));
        assert!(!html.contains("<b>hi</b>"));
    }

    #[test]
    fn role_options_mark_the_current_role() {
        let options = role_options(Role::Mod);
        assert_eq!(options.len(), 4);
        assert!(options.iter().filter(|o| o.selected).all(|o| o.value == "MOD"));
    }

    #[test]
    fn layout_shows_the_flash() {
        let flash = Flash::success("Message created!");
        let page = NotFoundPage {
            ctx: PageContext::new("Not Found", None, None, &flash, None),
        };
        let html = page.render().unwrap();
        assert!(html.contains("Message created!"));
        assert!(html.contains("class=\"alert alert-success\""));
    }
}
