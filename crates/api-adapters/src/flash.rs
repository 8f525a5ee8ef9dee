//! One-shot messages carried across a redirect in a short-lived cookie.
//!
//! The cookie value is base64url-encoded JSON so it never needs quoting.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "flash";

/// Seconds the cookie survives. A redirect slower than this loses the message.
pub const FLASH_MAX_AGE: i64 = 10;

/// Browsers drop cookies over ~4KB; form params are discarded past this.
const MAX_ENCODED_LEN: usize = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Info,
    Danger,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Info => "info",
            FlashKind::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<FlashMessage>,
    /// Submitted form values, so a rejected form can be refilled
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Flash {
    pub fn new(kind: FlashKind, text: impl Into<String>) -> Self {
        Self {
            message: Some(FlashMessage {
                kind,
                text: text.into(),
            }),
            params: BTreeMap::new(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(FlashKind::Success, text)
    }

    pub fn danger(text: impl Into<String>) -> Self {
        Self::new(FlashKind::Danger, text)
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// A previously submitted form value, or `""`.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn encode(&self) -> String {
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default());
        if encoded.len() <= MAX_ENCODED_LEN || self.params.is_empty() {
            return encoded;
        }
        Flash {
            message: self.message.clone(),
            params: BTreeMap::new(),
        }
        .encode()
    }

    /// `None` for anything that isn't a flash we wrote.
    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}
