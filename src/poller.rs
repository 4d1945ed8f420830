//! Periodic reconciliation of the server-side message list and metrics.
//!
//! The message poller is a counter-based diff: the server list only grows, so
//! each tick appends the suffix beyond the last merged count. No backoff, no
//! retry cap — a failed tick is logged and the next tick tries again.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::api::{BridgeClient, BridgeError, MessagesResponse, MetricsResponse};
use crate::session::{Message, SessionState, SharedSession, Speaker};

/// Merge newly arrived server messages into the local log.
///
/// Lets `total = count ?? messages.len()`. When `total` exceeds the merged
/// count, appends every non-system entry of `messages[server_count..]` in
/// order and advances `server_count` to `total`.
///
/// Returns the number of entries appended to the log. `server_count` never
/// decreases, so no server message is ever rendered twice.
pub fn merge_new_messages(state: &mut SessionState, response: &MessagesResponse) -> usize {
    let total = response.total();
    let prev = state.server_count;
    if total <= prev {
        return 0;
    }

    let mut appended = 0;
    for wire in response.messages.iter().skip(prev) {
        let speaker = Speaker::classify(&wire.sender);
        if speaker == Speaker::System {
            continue;
        }
        let agent = match speaker {
            Speaker::ClaudeA => crate::session::Agent::ClaudeA,
            _ => crate::session::Agent::ClaudeB,
        };
        let sender_name = state.roles.display_name(agent);
        state
            .log
            .append(Message::new(speaker, sender_name, wire.content.clone()));
        appended += 1;
    }

    state.server_count = total;
    appended
}

// ---------------------------------------------------------------------------
// Message poller
// ---------------------------------------------------------------------------

/// Polls `GET /api/messages` while a session is running.
pub struct MessagePoller {
    client: Arc<BridgeClient>,
    session: SharedSession,
    interval: Duration,
}

impl MessagePoller {
    pub fn new(client: Arc<BridgeClient>, session: SharedSession, interval: Duration) -> Self {
        MessagePoller {
            client,
            session,
            interval,
        }
    }

    /// One poll cycle.
    ///
    /// No-op when the session is not running. Otherwise fetches the server
    /// list and merges the unseen suffix. A fetch that was already in flight
    /// when `stop` flipped the flag still merges — stopping only prevents the
    /// next fetch.
    pub async fn tick(&self) -> Result<usize, BridgeError> {
        {
            let state = self.session.lock().expect("session lock");
            if !state.is_running {
                return Ok(0);
            }
        }

        let response = self.client.fetch_messages().await?;

        let mut state = self.session.lock().expect("session lock");
        let appended = merge_new_messages(&mut state, &response);
        if appended > 0 {
            debug!(appended, server_count = state.server_count, "merged server messages");
        }
        Ok(appended)
    }

    /// Run the polling loop indefinitely.
    ///
    /// Failures are soft-errors — the loop skips that tick and tries again at
    /// the next interval. Cancel the task (drop the `JoinHandle`) to stop.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, url = %self.client.base_url(), "message poll failed, will retry next tick");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics poller
// ---------------------------------------------------------------------------

/// Latest metrics snapshot shared with the status display.
pub type SharedMetrics = Arc<Mutex<MetricsResponse>>;

pub fn new_shared_metrics() -> SharedMetrics {
    Arc::new(Mutex::new(MetricsResponse::default()))
}

/// Polls `GET /api/metrics` on a fixed interval, session or not.
///
/// Display-only and best-effort by contract: failures are logged and the
/// previous snapshot stays in place.
pub struct MetricsPoller {
    client: Arc<BridgeClient>,
    latest: SharedMetrics,
    interval: Duration,
}

impl MetricsPoller {
    pub fn new(client: Arc<BridgeClient>, latest: SharedMetrics, interval: Duration) -> Self {
        MetricsPoller {
            client,
            latest,
            interval,
        }
    }

    pub async fn tick(&self) -> Result<MetricsResponse, BridgeError> {
        let metrics = self.client.fetch_metrics().await?;
        if let Ok(mut latest) = self.latest.lock() {
            *latest = metrics;
        }
        Ok(metrics)
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, "metrics fetch failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
