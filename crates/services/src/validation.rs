//! Input normalisation and validation for user-submitted fields.
//!
//! Every function returns the cleaned value or a [`ServiceError::Validation`]
//! carrying the message shown to the user.

use domains::Role;

use crate::error::ServiceError;

pub const MARKUP_MIN_CHARS: usize = 3;
pub const MARKUP_MAX_CHARS: usize = 300;

fn invalid<T>(msg: &str) -> Result<T, ServiceError> {
    Err(ServiceError::Validation(msg.to_string()))
}

/// Light processing of message markup before it is stored:
/// `\r\n` becomes `\n` and runs of three or more newlines collapse to two.
pub fn transform_markup(s: &str) -> String {
    let normalized = s.replace("\r\n", "\n");
    let mut out = String::with_capacity(normalized.len());
    let mut newlines = 0;
    for ch in normalized.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(ch);
    }
    out
}

pub fn validate_markup(raw: &str) -> Result<String, ServiceError> {
    let markup = transform_markup(raw.trim());
    if markup.is_empty() {
        return invalid("Must provide a message");
    }
    let len = markup.chars().count();
    if !(MARKUP_MIN_CHARS..=MARKUP_MAX_CHARS).contains(&len) {
        return invalid("Message must be 3-300 chars");
    }
    Ok(markup)
}

pub fn validate_uname(raw: &str) -> Result<String, ServiceError> {
    let uname = raw.trim();
    if uname.is_empty() {
        return invalid("Username required");
    }
    if !(3..=15).contains(&uname.chars().count()) {
        return invalid("Username must be 3-15 chars");
    }
    if !uname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return invalid("Username must only contain a-z, 0-9, underscore (_), or hypen (-)");
    }
    if !uname.chars().any(|c| c.is_ascii_alphabetic()) {
        return invalid("Username must contain at least one letter (a-z)");
    }
    Ok(uname.to_string())
}

/// Checks a new password against its confirmation.
pub fn validate_password(password: &str, confirmation: &str) -> Result<(), ServiceError> {
    if confirmation.is_empty() {
        return invalid("Password confirmation is required");
    }
    if password.is_empty() {
        return invalid("Password is required");
    }
    if !(6..=100).contains(&password.chars().count()) {
        return invalid("Password must be 6-100 chars");
    }
    if password != confirmation {
        return invalid("Password must match confirmation");
    }
    Ok(())
}

/// Email is optional; a blank value means "not provided".
pub fn validate_email(raw: Option<&str>) -> Result<Option<String>, ServiceError> {
    let email = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(email) => email,
    };
    if !looks_like_email(email) {
        return invalid("Invalid email address");
    }
    if email.chars().count() > 140 {
        return invalid("Email is too long");
    }
    Ok(Some(email.to_string()))
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub fn parse_role(raw: &str) -> Result<Role, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return invalid("Must provide a role");
    }
    raw.parse::<Role>()
        .or_else(|_| invalid("Invalid role"))
}

/// Parses the `'true' | 'false'` strings HTML forms submit.
pub fn parse_bool(raw: &str) -> Result<bool, ServiceError> {
    match raw.trim() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => invalid("Invalid boolean"),
    }
}

/// Blank form fields count as not submitted.
pub fn submitted(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Only same-site paths are accepted as redirect targets. Defaults to `/`.
pub fn redirect_target(raw: Option<&str>) -> Result<String, ServiceError> {
    match raw.map(str::trim) {
        None | Some("") => Ok("/".to_string()),
        Some(path) if path.starts_with('/') && !path.starts_with("//") => Ok(path.to_string()),
        Some(_) => invalid("Invalid redirect"),
    }
}
