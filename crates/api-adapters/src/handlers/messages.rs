use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{Html, Response};
use axum::Form;
use domains::Page;
use serde::Deserialize;
use services::cancan::{can, Action};
use services::validation::redirect_target;
use services::MessageUpdateForm;

use super::{page_ctx, params, render, PageQuery, RedirectInput};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Client, ClientIp, CurrentSession, CurrentUser, IncomingFlash};
use crate::flash::Flash;
use crate::middleware::{ensure_recaptcha, redirect_with_flash};
use crate::paginate::make_paginator;
use crate::state::AppState;
use crate::views::{HomePage, MessageShowPage, MessageView, MessagesListPage};

#[derive(Debug, Default, Deserialize)]
pub struct MessageInput {
    #[serde(default)]
    pub markup: String,
    #[serde(rename = "g-recaptcha-response")]
    pub recaptcha: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageUpdateInput {
    pub is_hidden: Option<String>,
    pub markup: Option<String>,
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

pub async fn homepage(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
) -> ApiResult<Html<String>> {
    let recent = state.board.recent().await?;
    render(HomePage {
        ctx: page_ctx(&state, "Home", &viewer, session, &flash),
        messages: MessageView::present_all(&recent, viewer.user()),
        can_post: can(viewer.user(), Action::CreateMessage),
    })
}

pub async fn list(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Html<String>> {
    let number = query.map(|Query(q)| q.number()).unwrap_or(1);
    let per_page = state.config.messages_per_page;
    let messages = state
        .board
        .list(viewer.user(), Page::new(number, per_page))
        .await?;
    let total = state.counts.messages();

    render(MessagesListPage {
        ctx: page_ctx(&state, "All Messages", &viewer, session, &flash),
        messages: MessageView::present_all(&messages, viewer.user()),
        paginator: make_paginator(number, total, per_page),
        total,
    })
}

pub async fn show(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    let id = parse_id(&id)?;
    let item = state.board.show(viewer.user(), id).await?;

    render(MessageShowPage {
        ctx: page_ctx(&state, &format!("Message #{id}"), &viewer, session, &flash),
        message: MessageView::present(&item, viewer.user(), chrono::Utc::now()),
    })
}

pub async fn create(
    State(state): State<AppState>,
    viewer: CurrentUser,
    ClientIp(ip): ClientIp,
    Client(client): Client,
    form: Result<Form<MessageInput>, FormRejection>,
) -> ApiResult<Response> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let echo = params([("markup", form.markup.as_str())]);

    ensure_recaptcha(&state, form.recaptcha.as_deref(), &ip)
        .await
        .map_err(|e| e.with_params(echo.clone()))?;
    state
        .board
        .create(viewer.user(), &form.markup, client)
        .await
        .map_err(|e| ApiError::from(e).with_params(echo))?;

    Ok(redirect_with_flash("/", Flash::success("Message created!")))
}

pub async fn update(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<MessageUpdateInput>, FormRejection>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let target = redirect_target(form.redirect_to.as_deref()).map_err(ApiError::from)?;

    state
        .board
        .update(
            viewer.user(),
            id,
            MessageUpdateForm {
                is_hidden: form.is_hidden,
                markup: form.markup,
            },
        )
        .await?;

    Ok(redirect_with_flash(&target, Flash::success("Message updated")))
}

/// Soft delete.
pub async fn delete(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<RedirectInput>, FormRejection>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let target = redirect_target(form.redirect_to.as_deref()).map_err(ApiError::from)?;

    state.board.hide(viewer.user(), id).await?;
    Ok(redirect_with_flash(&target, Flash::success("Message deleted")))
}

/// Ids that aren't integers can't exist.
fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}
