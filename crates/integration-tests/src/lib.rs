//! Shared fixtures for the end-to-end tests: a fully wired application over
//! the in-memory store, driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domains::{Message, Role, User};

pub fn user(id: i64, role: Role) -> User {
    User {
        id,
        uname: format!("user{id}"),
        email: None,
        digest: String::new(),
        role,
        last_online_at: None,
        created_at: Utc::now(),
    }
}

pub fn message(id: i64, user_id: Option<i64>, is_hidden: bool) -> Message {
    Message {
        id,
        user_id,
        markup: "hello world".into(),
        is_hidden,
        ip_address: "10.0.0.1".into(),
        user_agent: None,
        created_at: Utc::now(),
    }
}

#[cfg(feature = "web-axum")]
pub use app::*;

#[cfg(feature = "web-axum")]
mod app {
    use super::*;

    use api_adapters::flash::{Flash, FLASH_COOKIE};
    use api_adapters::{build_router, AppState, CountsCache, WebConfig};
    use auth_adapters::Argon2Passwords;
    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::Router;
    use domains::{CaptchaVerifier, MessageRepository, NewMessage, UserRepository};
    use services::{AccountService, BoardService, RateLimitSettings, RateLimiter};
    use storage_adapters::MemoryStore;
    use tower::ServiceExt;

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
        pub store: Arc<MemoryStore>,
    }

    impl TestApp {
        pub fn new() -> Self {
            Self::build(test_config(), None)
        }

        pub fn with_config(config: WebConfig) -> Self {
            Self::build(config, None)
        }

        pub fn with_captcha(config: WebConfig, captcha: Arc<dyn CaptchaVerifier>) -> Self {
            Self::build(config, Some(captcha))
        }

        fn build(config: WebConfig, captcha: Option<Arc<dyn CaptchaVerifier>>) -> Self {
            let store = Arc::new(MemoryStore::new());
            let accounts = AccountService::new(
                store.clone(),
                store.clone(),
                Arc::new(Argon2Passwords::cheap()),
            );
            let board = BoardService::new(store.clone(), store.clone());
            let limiter = RateLimiter::new(
                store.clone(),
                RateLimitSettings {
                    cooldown: Duration::from_secs(5),
                    max_retries: 3,
                },
            );
            let state = AppState {
                accounts,
                board,
                limiter,
                captcha,
                counts: CountsCache::default(),
                config: Arc::new(config),
            };
            Self {
                router: build_router(state.clone()),
                state,
                store,
            }
        }

        pub async fn send(&self, req: Request<Body>) -> TestResponse {
            let res = self
                .router
                .clone()
                .oneshot(req)
                .await
                .expect("router is infallible");
            let status = res.status();
            let headers = res.headers().clone();
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
                .await
                .expect("body is readable");
            TestResponse {
                status,
                headers,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }
        }

        pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
            let mut req = Request::get(uri);
            if let Some(cookie) = cookie {
                req = req.header(COOKIE, cookie);
            }
            self.send(req.body(Body::empty()).unwrap()).await
        }

        /// Form `POST` from `ip` (sent as `X-Forwarded-For`).
        pub async fn post(&self, uri: &str, body: &str, cookie: Option<&str>, ip: &str) -> TestResponse {
            self.form(Request::post(uri), body, cookie, ip).await
        }

        pub async fn form(
            &self,
            builder: axum::http::request::Builder,
            body: &str,
            cookie: Option<&str>,
            ip: &str,
        ) -> TestResponse {
            let mut req = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header("x-forwarded-for", ip);
            if let Some(cookie) = cookie {
                req = req.header(COOKIE, cookie);
            }
            self.send(req.body(Body::from(body.to_string())).unwrap()).await
        }

        /// Registers `uname` and returns its session cookie pair.
        pub async fn register(&self, uname: &str) -> String {
            let body = format!("uname={uname}&password1=secret123&password2=secret123");
            let res = self.post("/users", &body, None, "10.9.9.9").await;
            assert_eq!(res.status, StatusCode::SEE_OTHER, "register {uname}: {:?}", res.flash());
            res.session_cookie().expect("register sets a session cookie")
        }

        pub async fn register_as(&self, uname: &str, role: Role) -> String {
            let cookie = self.register(uname).await;
            self.set_role(uname, role).await;
            cookie
        }

        pub async fn find_user(&self, uname: &str) -> User {
            self.store
                .get_user_by_uname(uname)
                .await
                .unwrap()
                .expect("user exists")
        }

        pub async fn set_role(&self, uname: &str, role: Role) -> User {
            let user = self.find_user(uname).await;
            self.store
                .update_user_role(user.id, role)
                .await
                .unwrap()
                .expect("user exists")
        }

        /// Inserts straight into the store, skipping the ratelimit.
        pub async fn seed_message(&self, user_id: Option<i64>, markup: &str) -> Message {
            self.store
                .insert_message(NewMessage {
                    user_id,
                    markup: markup.to_string(),
                    ip_address: "10.0.0.1".into(),
                    user_agent: None,
                })
                .await
                .unwrap()
        }

        pub async fn message(&self, id: i64) -> Option<Message> {
            self.store.get_message_by_id(id).await.unwrap()
        }

        pub async fn refresh_counts(&self) {
            self.state
                .counts
                .refresh(&self.state.accounts, &self.state.board)
                .await
                .unwrap();
        }
    }

    impl Default for TestApp {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Quiet, proxy-aware, no hostname check.
    pub fn test_config() -> WebConfig {
        WebConfig {
            trust_proxy: true,
            trace_requests: false,
            ..WebConfig::default()
        }
    }

    /// Like production: every form needs a recaptcha response.
    pub fn strict_config() -> WebConfig {
        WebConfig {
            lenient_recaptcha: false,
            ..test_config()
        }
    }

    #[derive(Debug)]
    pub struct TestResponse {
        pub status: StatusCode,
        pub headers: HeaderMap,
        pub body: String,
    }

    impl TestResponse {
        pub fn location(&self) -> Option<&str> {
            self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
        }

        pub fn set_cookies(&self) -> Vec<String> {
            self.headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::to_string)
                .collect()
        }

        /// `name=value` of a cookie this response sets.
        pub fn cookie(&self, name: &str) -> Option<String> {
            let prefix = format!("{name}=");
            self.set_cookies()
                .into_iter()
                .find(|c| c.starts_with(&prefix))
                .and_then(|c| c.split(';').next().map(str::to_string))
        }

        pub fn session_cookie(&self) -> Option<String> {
            self.cookie("session_id").filter(|c| c != "session_id=")
        }

        pub fn flash(&self) -> Option<Flash> {
            let pair = self.cookie(FLASH_COOKIE)?;
            Flash::decode(pair.split_once('=')?.1)
        }

        pub fn flash_text(&self) -> Option<String> {
            self.flash()?.message.map(|m| m.text)
        }
    }
}
