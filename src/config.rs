//! Client configuration.
//!
//! Controls the request executor, cache eviction grace period, and push
//! reconnect policy.

use std::time::Duration;

use serde::Deserialize;

// Default values for client configuration
const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_KEEP_UNUSED_FOR_MS: u64 = 60_000;
const DEFAULT_RECONNECT_INITIAL_MS: u64 = 1_000;
const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;
const DEFAULT_RECONNECT_MULTIPLIER: f64 = 2.0;
const DEFAULT_RECONNECT_JITTER_MS: u64 = 250;

/// Top-level configuration for a [`SyncClient`](crate::client::SyncClient).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL all request paths are resolved against.
    pub base_url: String,
    /// Per-request timeout (ms) applied by the HTTP client.
    pub request_timeout_ms: u64,
    /// How long an unsubscribed cache entry is kept before eviction (ms).
    pub keep_unused_for_ms: u64,
    /// Push-feed reconnect policy.
    pub reconnect: ReconnectConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            keep_unused_for_ms: DEFAULT_KEEP_UNUSED_FOR_MS,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Unused-entry grace period as a [`Duration`].
    pub fn keep_unused_for(&self) -> Duration {
        Duration::from_millis(self.keep_unused_for_ms)
    }
}

/// Exponential backoff policy for push-feed reconnects.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// First retry delay (ms); also the minimum delay.
    pub initial_ms: u64,
    /// Ceiling on the retry delay (ms).
    pub max_ms: u64,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
    /// Upper bound of the random jitter added to each delay (ms).
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: DEFAULT_RECONNECT_INITIAL_MS,
            max_ms: DEFAULT_RECONNECT_MAX_MS,
            multiplier: DEFAULT_RECONNECT_MULTIPLIER,
            jitter_ms: DEFAULT_RECONNECT_JITTER_MS,
        }
    }
}

impl ReconnectConfig {
    /// Delay for the attempt after `previous_ms`, grown and clamped but
    /// without jitter.
    pub fn next_delay_ms(&self, previous_ms: u64) -> u64 {
        let grown = (previous_ms as f64 * self.multiplier) as u64;
        grown.clamp(self.initial_ms.max(1), self.max_ms.max(1))
    }
}
