//! Client facade.
//!
//! Wires the executor, query store, push bridge, and navigation history into
//! one object, with an explicit process-wide instance behind
//! [`init`]/[`global`].

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use url::Url;

use crate::cache::{
    Listener, QuerySnapshot, QueryStatus, QueryStore, Signature, SubscriptionHandle, Tag,
};
use crate::config::SyncConfig;
use crate::error::ApiError;
use crate::http::{ApiRequest, RequestExecutor};
use crate::params::{SyncedParams, UrlHistory};
use crate::push::{Feed, FeedInterest, FeedState, PushBridge};
use crate::util::debounce::Debouncer;

/// Declares one query: identity, how to fetch it, what invalidates it, and
/// the push feed that keeps it fresh.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    /// Logical endpoint name, the first half of the signature.
    pub endpoint: String,
    /// Argument object, canonicalized into the second half of the signature.
    pub args: Value,
    pub request: ApiRequest,
    pub tags: Vec<Tag>,
    pub feed: Option<Feed>,
}

/// Live handle to a subscribed query.
///
/// Dropping it releases the subscription and any feed interest it held.
pub struct QueryHandle {
    rx: watch::Receiver<QuerySnapshot>,
    subscription: SubscriptionHandle,
    feed: Option<FeedInterest>,
}

impl QueryHandle {
    /// Current snapshot.
    pub fn snapshot(&self) -> QuerySnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next snapshot change and returns it.
    pub async fn changed(&mut self) -> QuerySnapshot {
        let _ = self.rx.changed().await;
        self.snapshot()
    }

    /// Waits until a snapshot satisfies the predicate.
    pub async fn wait_until(
        &mut self,
        predicate: impl FnMut(&QuerySnapshot) -> bool,
    ) -> QuerySnapshot {
        if let Ok(snapshot) = self.rx.wait_for(predicate).await {
            return snapshot.clone();
        }
        // The sender side lives as long as the subscription; a closed channel
        // just means the store is gone, so the last snapshot stands.
        self.snapshot()
    }

    pub fn signature(&self) -> &Signature {
        self.subscription.signature()
    }

    pub fn feed_state(&self) -> Option<FeedState> {
        self.feed.as_ref().map(FeedInterest::state)
    }

    /// Waits until the backing feed reaches `target`; returns immediately
    /// for feed-less queries.
    pub async fn wait_for_feed(&mut self, target: FeedState) {
        if let Some(feed) = self.feed.as_mut() {
            feed.wait_for(target).await;
        }
    }
}

/// The reactive synchronization client.
pub struct SyncClient {
    config: SyncConfig,
    executor: RequestExecutor,
    store: Arc<QueryStore>,
    bridge: Arc<PushBridge>,
    history: Arc<UrlHistory>,
}

impl SyncClient {
    /// Builds a client rooted at `start_url`, the page URL the history opens
    /// on.
    pub fn new(config: SyncConfig, start_url: Url) -> Result<Self, ApiError> {
        let executor = RequestExecutor::new(&config)?;
        let store = QueryStore::new(config.keep_unused_for());
        let bridge = PushBridge::new(store.clone(), config.reconnect.clone());
        Ok(Self {
            config,
            executor,
            store,
            bridge,
            history: Arc::new(UrlHistory::new(start_url)),
        })
    }

    /// Subscribes to a query, returning a handle whose watch channel carries
    /// every snapshot change.
    pub fn subscribe_query(&self, spec: QuerySpec) -> QueryHandle {
        let signature = Signature::new(&spec.endpoint, &spec.args);
        let tags: HashSet<Tag> = spec.tags.into_iter().collect();
        let fetcher = self.executor.fetcher(spec.request);

        let (tx, rx) = watch::channel(QuerySnapshot {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            last_fetched_at: None,
        });
        let listener: Listener = Arc::new(move |snapshot: &QuerySnapshot| {
            let _ = tx.send(snapshot.clone());
        });

        let feed = spec.feed.map(|feed| self.bridge.interest(feed));
        let subscription = self.store.subscribe(signature, tags, fetcher, listener);

        QueryHandle {
            rx,
            subscription,
            feed,
        }
    }

    /// Invalidate by tags, e.g. after an out-of-band mutation.
    pub fn invalidate(&self, tags: &[Tag]) {
        self.store.invalidate(tags);
    }

    /// Executes a write request; on success, invalidates the given tags.
    pub async fn mutate(&self, request: &ApiRequest, invalidates: &[Tag]) -> Result<Value, ApiError> {
        let body = self.executor.execute(request).await?;
        self.store.invalidate(invalidates);
        Ok(body)
    }

    /// One-shot fetch routed through an explicit debounce policy. Superseded
    /// calls resolve to `Ok(None)`.
    pub async fn fetch_debounced(
        &self,
        request: ApiRequest,
        debouncer: &Debouncer,
    ) -> Result<Option<Value>, ApiError> {
        let executor = self.executor.clone();
        debouncer
            .run(async move { executor.execute(&request).await })
            .await
    }

    /// View state bound to this client's navigation history.
    pub fn synced_params<T>(&self, initial: T) -> Result<SyncedParams<T>, ApiError>
    where
        T: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
    {
        SyncedParams::new(self.history.clone(), initial)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn store(&self) -> &Arc<QueryStore> {
        &self.store
    }

    pub fn bridge(&self) -> &Arc<PushBridge> {
        &self.bridge
    }

    pub fn history(&self) -> &Arc<UrlHistory> {
        &self.history
    }
}

static GLOBAL: OnceCell<SyncClient> = OnceCell::new();

/// Initializes the process-wide client. Later calls return the existing
/// instance; there is no teardown.
pub fn init(config: SyncConfig, start_url: Url) -> Result<&'static SyncClient, ApiError> {
    GLOBAL.get_or_try_init(|| SyncClient::new(config, start_url))
}

/// The process-wide client, if [`init`] has run.
pub fn global() -> Option<&'static SyncClient> {
    GLOBAL.get()
}
