//! Handler errors and how each becomes a response.
//!
//! Validation failures are not rendered here: they leave as a bare 400
//! carrying a [`ValidationFailure`] extension, which the
//! `handle_validation_error` middleware turns into a flash and a redirect.

use std::collections::BTreeMap;

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use services::ratelimit::wait_length;
use services::ServiceError;
use thiserror::Error;
use tracing::error;

use crate::views::{NotFoundPage, PageContext};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("{message}")]
    Validation {
        message: String,
        /// Form values echoed back so the form can be refilled
        params: BTreeMap<String, String>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            params: BTreeMap::new(),
        }
    }

    /// Attaches submitted form values to a validation failure. Other
    /// variants pass through unchanged.
    pub fn with_params(self, params: BTreeMap<String, String>) -> Self {
        match self {
            ApiError::Validation { message, .. } => ApiError::Validation { message, params },
            other => other,
        }
    }
}

/// Response extension read by the validation middleware.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub message: String,
    pub params: BTreeMap<String, String>,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => ApiError::NotFound,
            ServiceError::Validation(message) => ApiError::validation(message),
            ServiceError::RateLimited { expires_at } => ApiError::validation(format!(
                "Ratelimited! You must wait {} longer before posting.",
                wait_length(expires_at, Utc::now())
            )),
            ServiceError::Contract(violation) => ApiError::Internal(violation.to_string()),
            ServiceError::Domain(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<askama::Error> for ApiError {
    fn from(err: askama::Error) -> Self {
        ApiError::Internal(format!("template rendering failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => not_found_page(),
            ApiError::Validation { message, params } => {
                let mut res = StatusCode::BAD_REQUEST.into_response();
                res.extensions_mut().insert(ValidationFailure { message, params });
                res
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message).into_response(),
            ApiError::Internal(message) => {
                error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

pub fn not_found_page() -> Response {
    let page = NotFoundPage {
        ctx: PageContext {
            title: "Not Found".into(),
            ..PageContext::default()
        },
    };
    match page.render() {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
