//! The middleware chain, outermost first: session resolution, flash,
//! validation-error handling, referer check. The ratelimit and admin gates
//! are attached per route.

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, LOCATION, REFERER, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use services::cancan::is_admin;
use services::ServiceError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cookies::{clear_cookie, get_cookie, set_cookie, SESSION_COOKIE};
use crate::error::{not_found_page, ApiError, ApiResult, ValidationFailure};
use crate::extract::{ClientIp, CurrentSession, CurrentUser, IncomingFlash, OutgoingFlash};
use crate::flash::{Flash, FLASH_COOKIE, FLASH_MAX_AGE};
use crate::state::AppState;

/// Resolves the session cookie to a user. Unknown, expired and logged-out
/// sessions make the request a guest request.
pub async fn current_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let session_id = cookie_value(req.headers(), SESSION_COOKIE).and_then(|raw| Uuid::parse_str(&raw).ok());

    let user = match session_id {
        Some(id) => match state.accounts.current_user(id).await {
            Ok(user) => user,
            Err(err) => return ApiError::from(err).into_response(),
        },
        None => None,
    };
    let session = user.as_ref().and(session_id);

    req.extensions_mut().insert(CurrentUser(user));
    req.extensions_mut().insert(CurrentSession(session));
    next.run(req).await
}

/// Exposes the incoming flash and writes any [`OutgoingFlash`] the response
/// carries. A flash is cleared by the first successful (< 300) response
/// after it was set, so it survives redirect chains.
pub async fn flash(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let raw = cookie_value(req.headers(), FLASH_COOKIE);
    let incoming = raw.as_deref().and_then(Flash::decode);
    let malformed = raw.is_some() && incoming.is_none();
    req.extensions_mut()
        .insert(IncomingFlash(incoming.unwrap_or_default()));

    let mut res = next.run(req).await;

    if let Some(OutgoingFlash(flash)) = res.extensions_mut().remove::<OutgoingFlash>() {
        let cookie = set_cookie(FLASH_COOKIE, &flash.encode(), FLASH_MAX_AGE, state.config.secure_cookies);
        append_cookie(&mut res, &cookie);
    } else if raw.is_some() && (malformed || res.status().as_u16() < 300) {
        append_cookie(&mut res, &clear_cookie(FLASH_COOKIE));
    }
    res
}

/// Turns a rejected form into a `danger` flash and a redirect back to the
/// page the form was on.
pub async fn handle_validation_error(req: Request, next: Next) -> Response {
    let back = back_path(req.headers());
    let mut res = next.run(req).await;

    match res.extensions_mut().remove::<ValidationFailure>() {
        Some(failure) => {
            info!(message = %failure.message, back = %back, "validation failed");
            redirect_with_flash(&back, Flash::danger(failure.message).with_params(failure.params))
        }
        None => res,
    }
}

/// CSRF guard: unsafe methods must come from a page on our own host.
pub async fn ensure_referer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(req).await;
    }
    let Some(hostname) = state.config.hostname.as_deref() else {
        debug!("skipping referer check since no hostname is configured");
        return next.run(req).await;
    };

    let referer_host = req
        .headers()
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uri>().ok())
        .and_then(|uri| uri.host().map(str::to_string));

    match referer_host {
        Some(host) if host.eq_ignore_ascii_case(hostname) => next.run(req).await,
        other => {
            warn!(referer_host = ?other, method = %req.method(), path = %req.uri().path(), "invalid referer");
            ApiError::Forbidden("Invalid referer".into()).into_response()
        }
    }
}

/// Admits at most one request per address-root per cooldown.
pub async fn ratelimit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    req: Request,
    next: Next,
) -> Response {
    match state.limiter.check(&ip).await {
        Ok(()) => next.run(req).await,
        Err(err) => ApiError::from(ServiceError::from(err)).into_response(),
    }
}

/// Non-admins can't tell admin routes exist.
pub async fn require_admin(user: CurrentUser, req: Request, next: Next) -> Response {
    if is_admin(user.user()) {
        next.run(req).await
    } else {
        not_found_page()
    }
}

/// Checks the human test of a form submission.
///
/// Outside production a form without a response passes. Without configured
/// keys every form passes.
pub async fn ensure_recaptcha(state: &AppState, response: Option<&str>, ip: &str) -> ApiResult<()> {
    let response = response.map(str::trim).filter(|r| !r.is_empty());
    if state.config.lenient_recaptcha && response.is_none() {
        debug!("skipping recaptcha check outside production");
        return Ok(());
    }
    let Some(verifier) = state.captcha.as_ref() else {
        warn!("recaptcha keys not set, skipping recaptcha check");
        return Ok(());
    };
    let response = response.ok_or_else(|| ApiError::validation("You must attempt the human test"))?;

    match verifier.verify(response, ip).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::validation("Could not verify recaptcha was correct")),
        Err(err) => {
            warn!(error = %err, "recaptcha verification errored");
            Err(ApiError::validation("Could not verify recaptcha was correct"))
        }
    }
}

/// `303 See Other`. Locations that aren't valid header values become `/`.
pub fn see_other(location: &str) -> Response {
    let value = HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::SEE_OTHER, [(LOCATION, value)]).into_response()
}

pub fn redirect_with_flash(location: &str, flash: Flash) -> Response {
    let mut res = see_other(location);
    res.extensions_mut().insert(OutgoingFlash(flash));
    res
}

pub fn append_cookie(res: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        res.headers_mut().append(SET_COOKIE, value);
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| get_cookie(h, name))
        .map(str::to_string)
}

/// The local path of the Referer, or `/`.
fn back_path(headers: &HeaderMap) -> String {
    headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uri>().ok())
        .and_then(|uri| uri.path_and_query().map(|pq| pq.as_str().to_string()))
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn back_path_keeps_only_the_local_part() {
        assert_eq!(
            back_path(&headers(&[("referer", "http://board.example/messages?page=2")])),
            "/messages?page=2"
        );
        assert_eq!(back_path(&headers(&[("referer", "/login")])), "/login");
        assert_eq!(back_path(&headers(&[])), "/");
        assert_eq!(back_path(&headers(&[("referer", "not a uri")])), "/");
    }

    #[test]
    fn cookies_are_read_across_headers() {
        let map = headers(&[("cookie", "a=1"), ("cookie", "session_id=xyz")]);
        assert_eq!(cookie_value(&map, SESSION_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(cookie_value(&map, "flash"), None);
    }

    #[test]
    fn see_other_never_panics_on_bad_locations() {
        let res = see_other("/users/bad\nname");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[LOCATION], "/");
    }

    #[test]
    fn redirect_carries_the_flash() {
        let res = redirect_with_flash("/", Flash::success("Message created!"));
        assert_eq!(res.headers()[LOCATION], "/");
        assert!(res.extensions().get::<OutgoingFlash>().is_some());
    }
}
