//! messageboard/crates/configs/src/lib.rs
//!
//! Layered application settings. Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. `config/{env}.toml` (optional)
//! 4. `MESSAGEBOARD_*` environment variables, `__` separating nested keys
//!
//! A `.env` file is loaded into the environment first when present.

use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const ENV_PREFIX: &str = "MESSAGEBOARD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Test,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Test => "test",
            AppEnv::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        *self == AppEnv::Production
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Public hostname, compared against the Referer of unsafe requests
    pub hostname: Option<String>,
    /// Take the client address from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: None,
            trust_proxy: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Without a url the in-memory store is used
    #[serde(deserialize_with = "optional_secret")]
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecaptchaSettings {
    pub sitekey: Option<String>,
    #[serde(deserialize_with = "optional_secret")]
    pub secret: Option<SecretString>,
}

impl RecaptchaSettings {
    /// Both keys are configured.
    pub fn is_online(&self) -> bool {
        self.sitekey.as_deref().is_some_and(|s| !s.is_empty()) && self.secret.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatelimitSettings {
    pub cooldown_secs: u64,
    pub max_retries: u32,
}

impl Default for RatelimitSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 5,
            max_retries: 25,
        }
    }
}

impl RatelimitSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    pub messages_per_page: i64,
    pub users_per_page: i64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            messages_per_page: 10,
            users_per_page: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub env: AppEnv,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub recaptcha: RecaptchaSettings,
    pub ratelimit: RatelimitSettings,
    pub pagination: PaginationSettings,
    pub log_format: LogFormat,
}

impl Settings {
    /// Loads `.env`, then the layered sources rooted at `./config`.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from("config")
    }

    pub fn load_from(dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var(format!("{ENV_PREFIX}_ENV")).unwrap_or_else(|_| "development".into());
        let config = Config::builder()
            .add_source(File::with_name(&format!("{dir}/default")).required(false))
            .add_source(File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Hard requirements. Softer problems are reported by [`Settings::warnings`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env.is_production() && self.server.hostname.is_none() {
            return Err(ConfigError::Invalid(
                "server.hostname must be set in production".into(),
            ));
        }
        if self.pagination.messages_per_page < 1 || self.pagination.users_per_page < 1 {
            return Err(ConfigError::Invalid("pagination sizes must be positive".into()));
        }
        Ok(())
    }

    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.server.hostname.is_none() {
            warnings.push("server.hostname not set, so the referer check is disabled".into());
        }
        if !self.recaptcha.is_online() {
            warnings.push("recaptcha keys not set, so the human test is skipped".into());
        }
        if self.database.url.is_none() {
            warnings.push("database.url not set, using the in-memory store".into());
        }
        warnings
    }
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(|s| SecretString::new(s.into_boxed_str())))
}
