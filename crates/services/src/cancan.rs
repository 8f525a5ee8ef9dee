//! # cancan
//!
//! The authorization rule table. Every decision is a pure function of
//! `(actor, action)`: no I/O, no hidden state, same answer every time.
//!
//! `actor` is `Some(user)` for a logged-in user and `None` for a guest.
//! Target-bearing actions carry their target inside the [`Action`] variant,
//! so a missing target cannot be expressed through the typed API. Callers
//! that only know an action by name go through [`can_named`], which reports
//! malformed calls as a [`ContractViolation`] instead of a denial.
//!
//! Usage:
//!
//! ```ignore
//! can(current_user, Action::ReadMessage(&message));
//! can(current_user, Action::CreateMessage);
//! ```

use std::fmt;
use std::str::FromStr;

use domains::{Message, Role, User};
use thiserror::Error;
use tracing::{debug, warn};

/// The closed vocabulary of action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ReadMessage,
    CreateMessage,
    DeleteMessage,
    UpdateMessage,
    UpdateMessageState,
    UpdateMessageMarkup,
    UpdateUserAny,
    UpdateUserSettings,
    UpdateUserRole,
}

/// What an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Message,
    User,
}

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::ReadMessage,
        ActionKind::CreateMessage,
        ActionKind::DeleteMessage,
        ActionKind::UpdateMessage,
        ActionKind::UpdateMessageState,
        ActionKind::UpdateMessageMarkup,
        ActionKind::UpdateUserAny,
        ActionKind::UpdateUserSettings,
        ActionKind::UpdateUserRole,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::ReadMessage => "READ_MESSAGE",
            ActionKind::CreateMessage => "CREATE_MESSAGE",
            ActionKind::DeleteMessage => "DELETE_MESSAGE",
            ActionKind::UpdateMessage => "UPDATE_MESSAGE",
            ActionKind::UpdateMessageState => "UPDATE_MESSAGE_STATE",
            ActionKind::UpdateMessageMarkup => "UPDATE_MESSAGE_MARKUP",
            ActionKind::UpdateUserAny => "UPDATE_USER_*",
            ActionKind::UpdateUserSettings => "UPDATE_USER_SETTINGS",
            ActionKind::UpdateUserRole => "UPDATE_USER_ROLE",
        }
    }

    /// The kind of target the action requires, if any.
    pub fn target_kind(&self) -> Option<TargetKind> {
        match self {
            ActionKind::CreateMessage => None,
            ActionKind::ReadMessage
            | ActionKind::DeleteMessage
            | ActionKind::UpdateMessage
            | ActionKind::UpdateMessageState
            | ActionKind::UpdateMessageMarkup => Some(TargetKind::Message),
            ActionKind::UpdateUserAny
            | ActionKind::UpdateUserSettings
            | ActionKind::UpdateUserRole => Some(TargetKind::User),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ContractViolation::UnknownAction(s.to_string()))
    }
}

/// An entity an action is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Message(&'a Message),
    User(&'a User),
}

impl Target<'_> {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Message(_) => TargetKind::Message,
            Target::User(_) => TargetKind::User,
        }
    }
}

/// An action together with its target.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    ReadMessage(&'a Message),
    CreateMessage,
    DeleteMessage(&'a Message),
    /// Umbrella: may the actor make *any* of the message updates?
    UpdateMessage(&'a Message),
    /// May the actor change `is_hidden`?
    UpdateMessageState(&'a Message),
    UpdateMessageMarkup(&'a Message),
    /// Umbrella: may the actor change *anything* about the target user?
    UpdateUserAny(&'a User),
    UpdateUserSettings(&'a User),
    UpdateUserRole(&'a User),
}

impl<'a> Action<'a> {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ReadMessage(_) => ActionKind::ReadMessage,
            Action::CreateMessage => ActionKind::CreateMessage,
            Action::DeleteMessage(_) => ActionKind::DeleteMessage,
            Action::UpdateMessage(_) => ActionKind::UpdateMessage,
            Action::UpdateMessageState(_) => ActionKind::UpdateMessageState,
            Action::UpdateMessageMarkup(_) => ActionKind::UpdateMessageMarkup,
            Action::UpdateUserAny(_) => ActionKind::UpdateUserAny,
            Action::UpdateUserSettings(_) => ActionKind::UpdateUserSettings,
            Action::UpdateUserRole(_) => ActionKind::UpdateUserRole,
        }
    }

    /// Pairs a kind with a target, rejecting combinations the rule table
    /// cannot evaluate. Actions without a target ignore whatever is passed.
    pub fn from_parts(kind: ActionKind, target: Option<Target<'a>>) -> Result<Self, ContractViolation> {
        let Some(expected) = kind.target_kind() else {
            return Ok(Action::CreateMessage);
        };
        let target = target.ok_or(ContractViolation::MissingTarget(kind))?;
        let action = match (kind, target) {
            (ActionKind::ReadMessage, Target::Message(m)) => Action::ReadMessage(m),
            (ActionKind::DeleteMessage, Target::Message(m)) => Action::DeleteMessage(m),
            (ActionKind::UpdateMessage, Target::Message(m)) => Action::UpdateMessage(m),
            (ActionKind::UpdateMessageState, Target::Message(m)) => Action::UpdateMessageState(m),
            (ActionKind::UpdateMessageMarkup, Target::Message(m)) => Action::UpdateMessageMarkup(m),
            (ActionKind::UpdateUserAny, Target::User(u)) => Action::UpdateUserAny(u),
            (ActionKind::UpdateUserSettings, Target::User(u)) => Action::UpdateUserSettings(u),
            (ActionKind::UpdateUserRole, Target::User(u)) => Action::UpdateUserRole(u),
            (kind, target) => {
                return Err(ContractViolation::WrongTarget {
                    action: kind,
                    expected,
                    got: target.kind(),
                })
            }
        };
        Ok(action)
    }
}

/// A programming error in the caller, distinct from a denial.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("unsupported cancan action: {0:?}")]
    UnknownAction(String),

    #[error("{0} requires a target")]
    MissingTarget(ActionKind),

    #[error("{action} expects a {expected:?} target, got {got:?}")]
    WrongTarget {
        action: ActionKind,
        expected: TargetKind,
        got: TargetKind,
    },
}

/// Returned by [`authorize`] when the rule table says no.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("not authorized to {action}")]
pub struct Denied {
    pub action: ActionKind,
}

/// Decides whether `actor` may perform `action`.
pub fn can(actor: Option<&User>, action: Action<'_>) -> bool {
    let allowed = decide(actor, action);
    debug!(
        actor = actor.map(|u| u.uname.as_str()).unwrap_or("<Guest>"),
        action = action.kind().name(),
        allowed,
        "cancan"
    );
    allowed
}

/// Like [`can`], but for callers holding an action name and an optional target.
///
/// Unknown names and missing or mismatched targets are reported as errors and
/// never count as authorized.
pub fn can_named(
    actor: Option<&User>,
    action: &str,
    target: Option<Target<'_>>,
) -> Result<bool, ContractViolation> {
    let parsed = action
        .parse::<ActionKind>()
        .and_then(|kind| Action::from_parts(kind, target));
    match parsed {
        Ok(action) => Ok(can(actor, action)),
        Err(violation) => {
            warn!(%violation, "cancan called incorrectly");
            Err(violation)
        }
    }
}

/// [`can`] as a `Result`, for `?` in request handlers.
pub fn authorize(actor: Option<&User>, action: Action<'_>) -> Result<(), Denied> {
    if can(actor, action) {
        Ok(())
    } else {
        Err(Denied {
            action: action.kind(),
        })
    }
}

pub fn is_admin(actor: Option<&User>) -> bool {
    matches!(actor.map(|u| u.role), Some(Role::Admin))
}

/// Admins and mods.
pub fn is_staff(actor: Option<&User>) -> bool {
    matches!(actor.map(|u| u.role), Some(Role::Admin | Role::Mod))
}

fn owns(user: &User, message: &Message) -> bool {
    message.user_id == Some(user.id)
}

fn decide(actor: Option<&User>, action: Action<'_>) -> bool {
    match action {
        Action::ReadMessage(message) => !message.is_hidden || is_staff(actor),

        Action::CreateMessage => match actor {
            None => true,
            Some(user) => user.role != Role::Banned,
        },

        Action::DeleteMessage(message) => match actor {
            None => false,
            Some(user) if user.role == Role::Banned => false,
            Some(user) if owns(user, message) => true,
            Some(user) => matches!(user.role, Role::Admin | Role::Mod),
        },

        Action::UpdateMessage(message) => {
            decide(actor, Action::UpdateMessageState(message))
                || decide(actor, Action::UpdateMessageMarkup(message))
        }

        Action::UpdateMessageState(_) => is_staff(actor),

        Action::UpdateMessageMarkup(message) => match actor {
            None => false,
            Some(user) => match user.role {
                Role::Admin | Role::Mod => true,
                Role::Member => owns(user, message),
                Role::Banned => false,
            },
        },

        Action::UpdateUserAny(target) => {
            decide(actor, Action::UpdateUserSettings(target))
                || decide(actor, Action::UpdateUserRole(target))
        }

        Action::UpdateUserSettings(target) => match actor {
            None => false,
            Some(user) => match user.role {
                Role::Banned => false,
                Role::Admin => true,
                // Mods can manage everyone except admins
                Role::Mod => target.role != Role::Admin,
                Role::Member => target.id == user.id,
            },
        },

        Action::UpdateUserRole(_) => is_admin(actor),
    }
}
