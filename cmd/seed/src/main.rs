//! # Seed
//!
//! Development tool: recreates the schema in the configured database and
//! creates an admin account plus a welcome message.
//!
//! ```text
//! MESSAGEBOARD_DATABASE__URL=postgres://localhost/messageboard cargo run -p seed -- admin secret123
//! ```

use anyhow::{bail, Context};
use auth_adapters::Argon2Passwords;
use configs::Settings;
use domains::{MessageRepository, NewMessage, NewUser, PasswordService, Role, UserRepository};
use secrecy::ExposeSecret;
use storage_adapters::PgStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_UNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "secret123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let uname = args.next().unwrap_or_else(|| DEFAULT_UNAME.to_string());
    let password = args.next().unwrap_or_else(|| DEFAULT_PASSWORD.to_string());

    let settings = Settings::load().context("loading settings")?;
    if settings.env.is_production() {
        bail!("refusing to wipe a production database");
    }
    let Some(url) = settings.database.url.as_ref() else {
        bail!("database.url is not set");
    };

    let store = PgStore::connect(url.expose_secret(), 2)
        .await
        .context("connecting to postgres")?;
    store.reset_schema().await.context("resetting schema")?;
    info!("schema recreated");

    let digest = Argon2Passwords::new()
        .hash_password(&password)
        .await
        .context("hashing password")?;
    let user = store
        .insert_user(NewUser {
            uname: uname.clone(),
            email: None,
            digest,
        })
        .await
        .context("inserting admin")?;
    store
        .update_user_role(user.id, Role::Admin)
        .await
        .context("promoting admin")?;
    info!(user_id = user.id, %uname, "admin created");

    store
        .insert_message(NewMessage {
            user_id: Some(user.id),
            markup: "Welcome to the messageboard!".into(),
            ip_address: "127.0.0.1".into(),
            user_agent: None,
        })
        .await
        .context("inserting welcome message")?;

    info!("seeded");
    Ok(())
}
