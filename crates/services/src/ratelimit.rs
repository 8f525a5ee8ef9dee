//! # Rate limiter
//!
//! Enforces a minimum interval between admitted actions coming from the same
//! address-root. Admission is decided inside one serializable transaction
//! owned by the [`RatelimitRepository`]; this service adds the address
//! grouping, the expiry computation and the retry loop around transient
//! transaction conflicts.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domains::{BumpOutcome, DomainError, RatelimitRepository};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Minimum time between two admitted actions of one address-root.
    pub cooldown: Duration,
    /// How many times a conflicting transaction is re-run before giving up.
    pub max_retries: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5),
            max_retries: 25,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Expected outcome: the caller must wait until `expires_at`.
    #[error("ratelimited until {expires_at}")]
    Limited { expires_at: DateTime<Utc> },

    /// Every retry hit a serialization conflict.
    #[error("ratelimit transaction still conflicting after {attempts} attempts")]
    Contended { attempts: u32 },

    #[error(transparent)]
    Storage(#[from] DomainError),
}

#[derive(Clone)]
pub struct RateLimiter {
    repo: Arc<dyn RatelimitRepository>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(repo: Arc<dyn RatelimitRepository>, settings: RateLimitSettings) -> Self {
        Self { repo, settings }
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Admits `ip_address` if its root has been quiet for the configured cooldown.
    pub async fn check(&self, ip_address: &str) -> Result<(), RateLimitError> {
        let cooldown = chrono::Duration::from_std(self.settings.cooldown)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.bump(ip_address, Utc::now() - cooldown).await
    }

    /// `max_date` is the most recent stamp the root may already have and still
    /// be admitted, i.e. `now - cooldown`.
    ///
    /// On rejection the error carries the moment the root becomes admissible
    /// again: the latest stamp plus the cooldown implied by `max_date`.
    pub async fn bump(&self, ip_address: &str, max_date: DateTime<Utc>) -> Result<(), RateLimitError> {
        let ip_root = address_root(ip_address);
        let mut attempt: u32 = 0;
        loop {
            match self.repo.bump(ip_address, &ip_root, max_date).await {
                Ok(BumpOutcome::Admitted) => return Ok(()),
                Ok(BumpOutcome::TooRecent { last_at }) => {
                    let cooldown = Utc::now() - max_date;
                    let expires_at = last_at + cooldown;
                    info!(ip_address, ip_root = %ip_root, %expires_at, "ratelimited");
                    return Err(RateLimitError::Limited { expires_at });
                }
                Err(err) if err.is_transient() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(ip_root = %ip_root, attempt, error = %err, "retrying ratelimit transaction");
                }
                Err(err) if err.is_transient() => {
                    error!(ip_root = %ip_root, attempts = attempt + 1, error = %err, "ratelimit retries exhausted");
                    return Err(RateLimitError::Contended { attempts: attempt + 1 });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Coarsens an address so neighbouring clients share one rate-limit subject.
///
/// IPv4 keeps its /24, IPv6 its /64. IPv4-mapped IPv6 addresses are treated
/// as the IPv4 address they carry. Anything unparseable is its own root.
pub fn address_root(ip_address: &str) -> String {
    match ip_address.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4_root(v4),
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4_root(v4),
            None => {
                let s = v6.segments();
                format!("{:x}:{:x}:{:x}:{:x}::/64", s[0], s[1], s[2], s[3])
            }
        },
        Err(_) => ip_address.to_string(),
    }
}

fn v4_root(addr: Ipv4Addr) -> String {
    let [a, b, c, _] = addr.octets();
    format!("{a}.{b}.{c}.0/24")
}

/// Turns a future instant into a human-friendly wait, e.g.
/// `"1 minute and 13 seconds"`. Seconds are rounded up.
pub fn wait_length(until: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let millis = (until - now).num_milliseconds().max(0);
    let diff = (millis + 999) / 1000;
    let mins = diff / 60;
    let secs = diff % 60;

    let mut output = String::new();
    if mins > 1 {
        output.push_str(&format!("{mins} minutes and "));
    } else if mins == 1 {
        output.push_str("1 minute and ");
    }
    if secs == 1 {
        output.push_str("1 second");
    } else {
        output.push_str(&format!("{secs} seconds"));
    }
    output
}
