//! Shared roster poller.
//!
//! Fetches `/api/users` on a fixed interval and publishes the roster through
//! a `watch` channel. Entities subscribe to it and re-fetch their own lists
//! whenever a new roster is published. A failed poll keeps the previous
//! roster and is retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use plexrec_core::{ApiError, RecommendationsClient, RosterEntry};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::transport::Transport;

/// Users known to the API, replaced wholesale on every successful poll.
pub type Roster = Arc<Vec<RosterEntry>>;

pub struct RosterPoller {
    transport: Arc<dyn Transport>,
    client: RecommendationsClient,
    timeout: Duration,
    roster: watch::Sender<Roster>,
}

impl RosterPoller {
    pub fn new(transport: Arc<dyn Transport>, client: RecommendationsClient, timeout: Duration) -> Self {
        let (roster, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            transport,
            client,
            timeout,
            roster,
        }
    }

    /// Last successfully fetched roster; empty before the first success.
    pub fn roster(&self) -> Roster {
        self.roster.borrow().clone()
    }

    /// Receiver notified on every successful poll.
    pub fn subscribe(&self) -> watch::Receiver<Roster> {
        self.roster.subscribe()
    }

    /// Poll once. On failure the previous roster stays published.
    pub async fn refresh(&self) -> Result<Roster, ApiError> {
        let users = self.fetch_users().await.inspect_err(|e| {
            warn!(error = %e, "Error fetching users");
        })?;

        info!(users_count = users.len(), "Fetched user roster");
        let roster = Arc::new(users);
        self.roster.send_replace(roster.clone());
        Ok(roster)
    }

    async fn fetch_users(&self) -> Result<Vec<RosterEntry>, ApiError> {
        let response = self
            .transport
            .execute(self.client.build_users(), self.timeout)
            .await
            .map_err(|e| ApiError::CannotConnect(e.to_string()))?;
        self.client.parse_users(response)
    }

    /// Poll every `period`, starting one period from now. Runs until the
    /// task is aborted.
    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // Failures are already logged; the next tick is the retry.
            let _ = self.refresh().await;
        }
    }
}
