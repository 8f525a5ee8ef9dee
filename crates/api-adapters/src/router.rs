//! Route table and layer stack.

use axum::http::{header, HeaderValue};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, auth, fallback, messages, users};
use crate::middleware;
use crate::state::AppState;

/// Builds the full application. HTML forms can only `POST`, so every
/// `PUT`/`DELETE` route also answers `POST`.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin", get(admin::dashboard))
        .route(
            "/admin/messages/hidden",
            delete(admin::purge_hidden).post(admin::purge_hidden),
        )
        .route_layer(from_fn(middleware::require_admin));

    let create_message = post(messages::create).route_layer(from_fn_with_state(
        state.clone(),
        middleware::ratelimit,
    ));

    let router = Router::new()
        .route("/", get(messages::homepage))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page))
        .route("/sessions/{id}", delete(auth::logout).post(auth::logout))
        .route("/users", get(users::list).post(auth::register))
        .route(
            "/users/{uname}",
            get(users::show).put(users::update).post(users::update),
        )
        .route("/users/{uname}/edit", get(users::edit))
        .route(
            "/users/{uname}/role",
            put(users::update_role).post(users::update_role),
        )
        .route("/messages", get(messages::list).merge(create_message))
        .route(
            "/messages/{id}",
            get(messages::show)
                .put(messages::update)
                .post(messages::update)
                .delete(messages::delete),
        )
        .route("/messages/{id}/delete", post(messages::delete))
        .merge(admin_routes)
        .fallback(fallback::not_found)
        // innermost first
        .layer(from_fn_with_state(state.clone(), middleware::ensure_referer))
        .layer(from_fn(middleware::handle_validation_error))
        .layer(from_fn_with_state(state.clone(), middleware::flash))
        .layer(from_fn_with_state(state.clone(), middleware::current_user))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("same-origin"),
        ))
        .layer(CompressionLayer::new());

    let router = if state.config.trace_requests {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}
