//! Shared state handed to every handler and middleware.

use std::sync::Arc;

use domains::CaptchaVerifier;
use services::{AccountService, BoardService, RateLimiter};

use crate::cache::CountsCache;

/// The slice of the settings the web layer reads per request.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// When set, unsafe requests must carry a Referer on this host
    pub hostname: Option<String>,
    pub trust_proxy: bool,
    /// Development and test builds may omit the recaptcha response
    pub lenient_recaptcha: bool,
    pub recaptcha_sitekey: Option<String>,
    pub messages_per_page: i64,
    pub users_per_page: i64,
    pub trace_requests: bool,
    /// Adds `Secure` to the cookies we set
    pub secure_cookies: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            trust_proxy: false,
            lenient_recaptcha: true,
            recaptcha_sitekey: None,
            messages_per_page: 10,
            users_per_page: 10,
            trace_requests: true,
            secure_cookies: false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub board: BoardService,
    pub limiter: RateLimiter,
    /// `None` when the recaptcha keys are not configured
    pub captcha: Option<Arc<dyn CaptchaVerifier>>,
    pub counts: CountsCache,
    pub config: Arc<WebConfig>,
}
