//! Row counts used for pagination totals, refreshed in the background
//! instead of on every list request.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use services::{AccountService, BoardService, ServiceResult};
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub const REFRESH_EVERY: Duration = Duration::from_secs(60);

#[derive(Clone, Default)]
pub struct CountsCache {
    messages: Arc<AtomicI64>,
    users: Arc<AtomicI64>,
}

impl CountsCache {
    /// Visible messages, as of the last refresh.
    pub fn messages(&self) -> i64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn users(&self) -> i64 {
        self.users.load(Ordering::Relaxed)
    }

    pub async fn refresh(&self, accounts: &AccountService, board: &BoardService) -> ServiceResult<()> {
        let messages = board.count_visible().await?;
        let users = accounts.count_users().await?;
        self.messages.store(messages, Ordering::Relaxed);
        self.users.store(users, Ordering::Relaxed);
        debug!(messages, users, "counts refreshed");
        Ok(())
    }

    /// Refreshes now and then every `period` until the runtime shuts down.
    pub fn spawn_refresher(
        &self,
        accounts: AccountService,
        board: BoardService,
        period: Duration,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(err) = cache.refresh(&accounts, &board).await {
                    error!(error = %err, "failed to refresh counts");
                }
            }
        })
    }
}
