//! Google reCAPTCHA v2 verification.
//!
//! Docs: <https://developers.google.com/recaptcha/docs/verify>

use async_trait::async_trait;
use domains::{CaptchaVerifier, DomainError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::warn;

pub const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: SecretString,
    endpoint: String,
}

impl RecaptchaVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self::with_endpoint(secret, SITEVERIFY_URL)
    }

    pub fn with_endpoint(secret: SecretString, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, response: &str, remote_ip: &str) -> Result<bool, DomainError> {
        let form = [
            ("secret", self.secret.expose_secret()),
            ("response", response),
            ("remoteip", remote_ip),
        ];
        let body: SiteverifyResponse = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| DomainError::Internal(format!("recaptcha request failed: {e}")))?
            .json()
            .await
            .map_err(|e| DomainError::Internal(format!("recaptcha response unreadable: {e}")))?;

        if !body.success {
            warn!(error_codes = ?body.error_codes, "recaptcha rejected");
        }
        Ok(body.success)
    }
}
