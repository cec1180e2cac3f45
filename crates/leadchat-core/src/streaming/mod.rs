mod client;
mod sse;
mod types;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{RECONNECT_INITIAL_DELAY_SECS, RECONNECT_MAX_DELAY_SECS};

pub use client::EventStreamClient;
pub use sse::SseParser;
pub use types::LiveEvent;

/// State of the live event connection, published so the UI can show a
/// disconnected indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected { retry_in_secs: u64 },
}

/// What the stream task forwards to the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Event(LiveEvent),
    Connection(ConnectionState),
}

/// Exponential backoff between reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_secs: RECONNECT_INITIAL_DELAY_SECS,
            max_delay_secs: RECONNECT_MAX_DELAY_SECS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (0-based) after a failure
    pub fn delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay_secs.max(1);
        let max = self.max_delay_secs.max(initial);
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        Duration::from_secs(initial.saturating_mul(factor).min(max))
    }
}
