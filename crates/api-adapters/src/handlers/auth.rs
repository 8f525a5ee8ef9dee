//! Login, registration and logout.

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::response::{Html, Response};
use axum::Form;
use chrono::Utc;
use domains::Session;
use serde::Deserialize;
use services::validation::{parse_bool, redirect_target};
use services::{LoginForm, RegisterForm};
use tracing::info;
use uuid::Uuid;

use super::{page_ctx, params, render, RedirectInput};
use crate::cookies::{clear_cookie, set_cookie, SESSION_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Client, ClientIp, CurrentSession, CurrentUser, IncomingFlash};
use crate::flash::Flash;
use crate::middleware::{append_cookie, ensure_recaptcha, redirect_with_flash};
use crate::state::AppState;
use crate::views::{LoginPage, RegisterPage};

#[derive(Debug, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub uname: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "remember-me")]
    pub remember_me: Option<String>,
    #[serde(rename = "g-recaptcha-response")]
    pub recaptcha: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub uname: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
    pub email: Option<String>,
    #[serde(rename = "g-recaptcha-response")]
    pub recaptcha: Option<String>,
}

pub async fn login_page(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
) -> ApiResult<Html<String>> {
    render(LoginPage {
        ctx: page_ctx(&state, "Login", &viewer, session, &flash),
    })
}

pub async fn register_page(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
) -> ApiResult<Html<String>> {
    render(RegisterPage {
        ctx: page_ctx(&state, "Register", &viewer, session, &flash),
    })
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Client(client): Client,
    form: Result<Form<LoginInput>, FormRejection>,
) -> ApiResult<Response> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let echo = params([("uname", form.uname.as_str())]);

    ensure_recaptcha(&state, form.recaptcha.as_deref(), &ip)
        .await
        .map_err(|e| e.with_params(echo.clone()))?;

    let remember_me = form
        .remember_me
        .as_deref()
        .is_some_and(|v| parse_bool(v).unwrap_or(false));
    let (user, session) = state
        .accounts
        .login(
            LoginForm {
                uname: form.uname,
                password: form.password,
                remember_me,
            },
            client,
        )
        .await
        .map_err(|e| ApiError::from(e).with_params(echo))?;
    info!(user_id = user.id, "logged in");

    let mut res = redirect_with_flash("/", Flash::success("Logged in successfully"));
    append_cookie(&mut res, &session_cookie(&state, &session));
    Ok(res)
}

pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Client(client): Client,
    form: Result<Form<RegisterInput>, FormRejection>,
) -> ApiResult<Response> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let echo = params([
        ("uname", form.uname.as_str()),
        ("email", form.email.as_deref().unwrap_or_default()),
    ]);

    ensure_recaptcha(&state, form.recaptcha.as_deref(), &ip)
        .await
        .map_err(|e| e.with_params(echo.clone()))?;

    let (_, session) = state
        .accounts
        .register(
            RegisterForm {
                uname: form.uname,
                password1: form.password1,
                password2: form.password2,
                email: form.email,
            },
            client,
        )
        .await
        .map_err(|e| ApiError::from(e).with_params(echo))?;

    let mut res = redirect_with_flash("/", Flash::success("Successfully registered. Welcome!"));
    append_cookie(&mut res, &session_cookie(&state, &session));
    Ok(res)
}

pub async fn logout(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<RedirectInput>, FormRejection>,
) -> ApiResult<Response> {
    let actor = viewer.user().ok_or(ApiError::NotFound)?;
    let session_id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let target = redirect_target(form.redirect_to.as_deref()).map_err(ApiError::from)?;

    state.accounts.logout(Some(actor), session_id).await?;
    info!(user_id = actor.id, "logged out");

    let mut res = redirect_with_flash(&target, Flash::success("You successfully logged out"));
    append_cookie(&mut res, &clear_cookie(SESSION_COOKIE));
    Ok(res)
}

/// The cookie lives exactly as long as the session row.
fn session_cookie(state: &AppState, session: &Session) -> String {
    let max_age = (session.expired_at - Utc::now()).num_seconds().max(0);
    set_cookie(
        SESSION_COOKIE,
        &session.id.to_string(),
        max_age,
        state.config.secure_cookies,
    )
}
