//! Cache entry state and the snapshot handed to subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::ApiError;

/// Produces the data for one signature. Must be idempotent and free of side
/// effects beyond returning the response.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;

/// Invoked synchronously after every status transition of a subscribed entry.
pub type Listener = Arc<dyn Fn(&QuerySnapshot) + Send + Sync>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No data has ever been fetched.
    Uninitialized,
    /// A fetch is in flight; prior data, if any, is still readable.
    Loading,
    /// The latest fetch succeeded.
    Success,
    /// The latest fetch failed; prior data, if any, is still readable.
    Error,
}

/// Immutable view of an entry, as handed to listeners.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub status: QueryStatus,
    /// Last successfully fetched payload. Survives later failed fetches.
    pub data: Option<Value>,
    /// Error of the latest fetch, when it failed.
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<OffsetDateTime>,
}

impl QuerySnapshot {
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

/// Internal mutable state of one cache entry. All access happens under the
/// store lock.
pub(crate) struct EntryState {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<ApiError>,
    pub fetcher: Fetcher,
    /// Subscribers keyed by their handle id.
    pub listeners: HashMap<u64, Listener>,
    /// Generation the entry currently accepts completions for.
    pub generation: u64,
    pub in_flight: bool,
    /// Set by an invalidation that could not drop the entry outright; a stale
    /// entry is refetched on the next subscribe instead of served as a hit.
    pub stale: bool,
    pub last_fetched_at: Option<OffsetDateTime>,
}

impl EntryState {
    pub fn new(fetcher: Fetcher, generation: u64) -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            fetcher,
            listeners: HashMap::new(),
            generation,
            in_flight: false,
            stale: false,
            last_fetched_at: None,
        }
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}
