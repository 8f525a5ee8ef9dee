use axum::extract::State;
use axum::response::{Html, Response};

use super::{page_ctx, render};
use crate::error::ApiResult;
use crate::extract::{CurrentSession, CurrentUser, IncomingFlash};
use crate::flash::Flash;
use crate::middleware::redirect_with_flash;
use crate::state::AppState;
use crate::views::AdminPage;

pub async fn dashboard(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
) -> ApiResult<Html<String>> {
    let stats = state.board.stats(viewer.user()).await?;
    render(AdminPage {
        ctx: page_ctx(&state, "Admin", &viewer, session, &flash),
        stats,
    })
}

/// Hard-deletes everything already hidden.
pub async fn purge_hidden(State(state): State<AppState>, viewer: CurrentUser) -> ApiResult<Response> {
    let deleted = state.board.purge_hidden(viewer.user()).await?;
    Ok(redirect_with_flash(
        "/admin",
        Flash::success(format!("Deleted {deleted} hidden messages")),
    ))
}
