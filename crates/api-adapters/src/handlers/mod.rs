//! Route handlers, grouped by resource.

pub mod admin;
pub mod auth;
pub mod fallback;
pub mod messages;
pub mod users;

use std::collections::BTreeMap;

use askama::Template;
use axum::response::Html;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{CurrentSession, CurrentUser, IncomingFlash};
use crate::state::AppState;
use crate::views::PageContext;

/// `?page=N`; anything unparseable reads as the first page.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1)
    }
}

/// Body of forms that only say where to go next.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectInput {
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

pub(crate) fn page_ctx(
    state: &AppState,
    title: &str,
    viewer: &CurrentUser,
    session: CurrentSession,
    flash: &IncomingFlash,
) -> PageContext {
    PageContext::new(
        title,
        viewer.user(),
        session.0,
        &flash.0,
        state.config.recaptcha_sitekey.as_deref(),
    )
}

pub(crate) fn render<T: Template>(page: T) -> ApiResult<Html<String>> {
    Ok(Html(page.render()?))
}

/// Form values to echo back on a validation failure.
pub(crate) fn params<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
