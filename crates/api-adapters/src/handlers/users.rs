use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{Html, Response};
use axum::Form;
use chrono::Utc;
use domains::Page;
use serde::Deserialize;
use services::validation::redirect_target;
use services::UserUpdateForm;

use super::{page_ctx, params, render, PageQuery};
use crate::error::{ApiError, ApiResult};
use crate::extract::{CurrentSession, CurrentUser, IncomingFlash};
use crate::flash::Flash;
use crate::middleware::redirect_with_flash;
use crate::paginate::make_paginator;
use crate::state::AppState;
use crate::views::{role_options, MessageView, UserEditPage, UserShowPage, UserView, UsersListPage};

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdateInput {
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleInput {
    #[serde(default)]
    pub role: String,
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Html<String>> {
    let number = query.map(|Query(q)| q.number()).unwrap_or(1);
    let per_page = state.config.users_per_page;
    let users = state.accounts.list_users(Page::new(number, per_page)).await?;
    let total = state.counts.users();

    render(UsersListPage {
        ctx: page_ctx(&state, "All Users", &viewer, session, &flash),
        users: UserView::present_all(&users, viewer.user()),
        paginator: make_paginator(number, total, per_page),
        total,
    })
}

pub async fn show(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
    Path(uname): Path<String>,
) -> ApiResult<Html<String>> {
    let user = state.accounts.user_by_uname(&uname).await?;
    let recent = state.board.recent_for_user(&user).await?;

    render(UserShowPage {
        ctx: page_ctx(&state, &user.uname, &viewer, session, &flash),
        user: UserView::present(&user, recent.len() as i64, viewer.user(), Utc::now()),
        messages: MessageView::present_all(&recent, viewer.user()),
    })
}

pub async fn edit(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
    Path(uname): Path<String>,
) -> ApiResult<Html<String>> {
    let user = state.accounts.edit_user(viewer.user(), &uname).await?;

    render(UserEditPage {
        ctx: page_ctx(&state, &format!("Edit {}", user.uname), &viewer, session, &flash),
        roles: role_options(user.role),
        user: UserView::present(&user, 0, viewer.user(), Utc::now()),
    })
}

pub async fn update(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Path(uname): Path<String>,
    form: Result<Form<UserUpdateInput>, FormRejection>,
) -> ApiResult<Response> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let echo = params([("email", form.email.as_deref().unwrap_or_default())]);

    let user = state
        .accounts
        .update_user(
            viewer.user(),
            &uname,
            UserUpdateForm {
                email: form.email,
                role: form.role,
            },
        )
        .await
        .map_err(|e| ApiError::from(e).with_params(echo))?;

    Ok(redirect_with_flash(
        &format!("{}/edit", user.url()),
        Flash::success("User updated"),
    ))
}

pub async fn update_role(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Path(uname): Path<String>,
    form: Result<Form<RoleInput>, FormRejection>,
) -> ApiResult<Response> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let target = match form.redirect_to.as_deref() {
        Some(raw) => Some(redirect_target(Some(raw)).map_err(ApiError::from)?),
        None => None,
    };

    let user = state
        .accounts
        .update_role(viewer.user(), &uname, &form.role)
        .await?;
    let target = target.unwrap_or_else(|| format!("{}/edit", user.url()));

    Ok(redirect_with_flash(&target, Flash::success("Role updated")))
}
