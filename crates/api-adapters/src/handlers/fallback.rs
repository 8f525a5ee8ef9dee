use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

use super::{page_ctx, render};
use crate::extract::{CurrentSession, CurrentUser, IncomingFlash};
use crate::middleware::see_other;
use crate::state::AppState;
use crate::views::NotFoundPage;

/// `/messages/` redirects to `/messages`; anything else unrouted is a 404.
pub async fn not_found(
    State(state): State<AppState>,
    viewer: CurrentUser,
    session: CurrentSession,
    flash: IncomingFlash,
    uri: Uri,
) -> Response {
    let path = uri.path();
    if path.len() > 1 && path.ends_with('/') {
        // one leading slash, so `//host/` cannot become a protocol-relative url
        let mut location = format!("/{}", path.trim_matches('/'));
        if let Some(query) = uri.query() {
            location.push('?');
            location.push_str(query);
        }
        return see_other(&location);
    }

    let page = NotFoundPage {
        ctx: page_ctx(&state, "Not Found", &viewer, session, &flash),
    };
    match render(page) {
        Ok(Html(html)) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(err) => err.into_response(),
    }
}
