//! # Messageboard Binary
//!
//! Composition root: loads settings, picks the adapters compiled in by
//! features, wires the services and serves the axum router.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use api_adapters::cache::REFRESH_EVERY;
use api_adapters::{build_router, AppState, CountsCache, WebConfig};
use auth_adapters::Argon2Passwords;
use configs::{AppEnv, LogFormat, Settings};
use domains::{
    AdminRepository, CaptchaVerifier, MessageRepository, RatelimitRepository, SessionRepository,
    UserRepository,
};
use services::{AccountService, BoardService, RateLimitSettings, RateLimiter};
use storage_adapters::MemoryStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-postgres")]
use secrecy::ExposeSecret;
#[cfg(feature = "db-postgres")]
use storage_adapters::PgStore;

#[cfg(feature = "recaptcha")]
use auth_adapters::RecaptchaVerifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut settings = Settings::load().context("loading settings")?;
    init_tracing(settings.log_format);

    info!(env = settings.env.as_str(), "starting messageboard v{}", env!("CARGO_PKG_VERSION"));
    for warning in settings.warnings() {
        warn!("{warning}");
    }

    let (accounts, board, limiter) = wire_storage(&settings).await?;
    let captcha = captcha_verifier(&mut settings);

    let counts = CountsCache::default();
    counts
        .refresh(&accounts, &board)
        .await
        .context("initial count refresh")?;
    counts.spawn_refresher(accounts.clone(), board.clone(), REFRESH_EVERY);

    let state = AppState {
        accounts,
        board,
        limiter,
        captcha,
        counts,
        config: Arc::new(web_config(&settings)),
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("shut down");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Postgres when a url is configured (and compiled in), else the in-memory store.
async fn wire_storage(
    settings: &Settings,
) -> anyhow::Result<(AccountService, BoardService, RateLimiter)> {
    #[cfg(feature = "db-postgres")]
    {
        if let Some(url) = settings.database.url.as_ref() {
            let store = PgStore::connect(url.expose_secret(), settings.database.max_connections)
                .await
                .context("connecting to postgres")?;
            return Ok(services_over(Arc::new(store), settings));
        }
    }

    #[cfg(not(feature = "db-postgres"))]
    {
        if settings.database.url.is_some() {
            warn!("database.url is set but postgres support is not compiled in");
        }
    }

    Ok(services_over(Arc::new(MemoryStore::new()), settings))
}

fn services_over<S>(store: Arc<S>, settings: &Settings) -> (AccountService, BoardService, RateLimiter)
where
    S: UserRepository
        + SessionRepository
        + MessageRepository
        + RatelimitRepository
        + AdminRepository
        + 'static,
{
    let accounts = AccountService::new(store.clone(), store.clone(), Arc::new(Argon2Passwords::new()));
    let board = BoardService::new(store.clone(), store.clone());
    let limiter = RateLimiter::new(
        store,
        RateLimitSettings {
            cooldown: settings.ratelimit.cooldown(),
            max_retries: settings.ratelimit.max_retries,
        },
    );
    (accounts, board, limiter)
}

#[cfg(feature = "recaptcha")]
fn captcha_verifier(settings: &mut Settings) -> Option<Arc<dyn CaptchaVerifier>> {
    if !settings.recaptcha.is_online() {
        return None;
    }
    let secret = settings.recaptcha.secret.take()?;
    Some(Arc::new(RecaptchaVerifier::new(secret)))
}

#[cfg(not(feature = "recaptcha"))]
fn captcha_verifier(settings: &mut Settings) -> Option<Arc<dyn CaptchaVerifier>> {
    if settings.recaptcha.is_online() {
        warn!("recaptcha keys are set but recaptcha support is not compiled in");
    }
    None
}

fn web_config(settings: &Settings) -> WebConfig {
    let production = settings.env.is_production();
    WebConfig {
        hostname: settings.server.hostname.clone(),
        trust_proxy: settings.server.trust_proxy,
        lenient_recaptcha: !production,
        recaptcha_sitekey: settings.recaptcha.sitekey.clone().filter(|s| !s.is_empty()),
        messages_per_page: settings.pagination.messages_per_page,
        users_per_page: settings.pagination.users_per_page,
        trace_requests: settings.env != AppEnv::Test,
        secure_cookies: production,
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received, draining connections");
}
