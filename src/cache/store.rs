//! Tagged query store.
//!
//! Holds one entry per request signature, deduplicates concurrent fetches,
//! and refetches or drops entries when their tags are invalidated. All state
//! transitions happen synchronously under one store lock; only the network
//! fetch itself is asynchronous.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use metrics::counter;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::util::lock::mutex_lock;

use super::entry::{EntryState, Fetcher, Listener, QuerySnapshot, QueryStatus};
use super::keys::{Signature, Tag};
use super::registry::TagRegistry;

const LOCK_TARGET: &str = "cache.store";

/// Tagged cache of query results, shared behind an `Arc`.
pub struct QueryStore {
    entries: Mutex<HashMap<Signature, EntryState>>,
    registry: TagRegistry,
    keep_unused_for: Duration,
    next_subscriber_id: AtomicU64,
    /// Monotonic fetch-generation counter shared by every entry. A completion
    /// whose generation no longer matches its entry is discarded.
    generation_counter: AtomicU64,
    /// Handed to spawned tasks and guards so they never keep the store
    /// alive.
    weak_self: Weak<QueryStore>,
}

/// RAII guard for one subscription. Dropping it detaches the listener and
/// schedules eviction once the entry has no subscribers left. It never
/// cancels a fetch other subscribers share.
pub struct SubscriptionHandle {
    store: Weak<QueryStore>,
    signature: Signature,
    id: u64,
}

impl SubscriptionHandle {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.release(&self.signature, self.id);
        }
    }
}

impl QueryStore {
    pub fn new(keep_unused_for: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            entries: Mutex::new(HashMap::new()),
            registry: TagRegistry::new(),
            keep_unused_for,
            next_subscriber_id: AtomicU64::new(1),
            generation_counter: AtomicU64::new(1),
            weak_self: weak.clone(),
        })
    }

    /// Subscribe to a signature.
    ///
    /// Creates the entry lazily and registers its tags. A fresh `Success`
    /// entry is a cache hit: the listener is notified immediately and no
    /// fetch starts. A missing or stale entry starts one fetch; if a fetch is
    /// already in flight the subscription just attaches to it.
    pub fn subscribe(
        &self,
        signature: Signature,
        tags: HashSet<Tag>,
        fetcher: Fetcher,
        listener: Listener,
    ) -> SubscriptionHandle {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.registry.register(signature.clone(), tags);

        let mut spawn: Option<(u64, Fetcher)> = None;
        let snapshot;
        {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "subscribe");
            let entry = entries.entry(signature.clone()).or_insert_with(|| {
                EntryState::new(
                    fetcher.clone(),
                    self.generation_counter.load(Ordering::Relaxed),
                )
            });
            entry.fetcher = fetcher;
            entry.listeners.insert(id, listener.clone());

            if entry.status == QueryStatus::Success && !entry.stale {
                counter!("rivolo_cache_hits_total").increment(1);
                debug!(signature = %signature, "Cache hit");
            } else if !entry.in_flight {
                let generation = self.generation_counter.fetch_add(1, Ordering::Relaxed) + 1;
                entry.generation = generation;
                entry.status = QueryStatus::Loading;
                entry.in_flight = true;
                entry.stale = false;
                spawn = Some((generation, entry.fetcher.clone()));
            } else {
                debug!(signature = %signature, "Attached to in-flight fetch");
            }
            snapshot = entry.snapshot();
        }

        listener(&snapshot);
        if let Some((generation, fetcher)) = spawn {
            self.spawn_fetch(signature.clone(), generation, fetcher);
        }

        SubscriptionHandle {
            store: self.weak_self.clone(),
            signature,
            id,
        }
    }

    /// Synchronous read of the current snapshot for a signature.
    pub fn read(&self, signature: &Signature) -> Option<QuerySnapshot> {
        mutex_lock(&self.entries, LOCK_TARGET, "read")
            .get(signature)
            .map(EntryState::snapshot)
    }

    /// Invalidate every entry matched by the given tags.
    ///
    /// Subscribed entries bump their generation and refetch immediately,
    /// keeping their stale data visible while `Loading`. Unreferenced entries
    /// drop their data; the generation bump makes any in-flight response for
    /// the old version inert.
    pub fn invalidate(&self, tags: &[Tag]) {
        let affected = self.registry.affected(tags);
        if affected.is_empty() {
            return;
        }
        counter!("rivolo_invalidations_total").increment(1);
        info!(
            tags = %format_tags(tags),
            affected = affected.len(),
            "Invalidating cache entries"
        );

        let mut refetches: Vec<(Signature, u64, Fetcher)> = Vec::new();
        let mut notifications: Vec<(Vec<Listener>, QuerySnapshot)> = Vec::new();
        {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "invalidate");
            // BTreeSet iteration keeps the refetch order deterministic.
            for signature in &affected {
                let Some(entry) = entries.get_mut(signature) else {
                    continue;
                };
                let generation = self.generation_counter.fetch_add(1, Ordering::Relaxed) + 1;
                entry.generation = generation;

                if entry.subscriber_count() > 0 {
                    entry.status = QueryStatus::Loading;
                    entry.in_flight = true;
                    entry.stale = false;
                    refetches.push((signature.clone(), generation, entry.fetcher.clone()));
                    notifications.push((
                        entry.listeners.values().cloned().collect(),
                        entry.snapshot(),
                    ));
                } else {
                    entry.status = QueryStatus::Uninitialized;
                    entry.data = None;
                    entry.error = None;
                    entry.in_flight = false;
                    entry.stale = false;
                }
            }
        }

        for (listeners, snapshot) in notifications {
            for listener in listeners {
                listener(&snapshot);
            }
        }
        for (signature, generation, fetcher) in refetches {
            self.spawn_fetch(signature, generation, fetcher);
        }
    }

    fn spawn_fetch(&self, signature: Signature, generation: u64, fetcher: Fetcher) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(signature = %signature, "No tokio runtime available; fetch not started");
                let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "spawn_fetch");
                if let Some(entry) = entries.get_mut(&signature)
                    && entry.generation == generation
                {
                    entry.in_flight = false;
                    entry.stale = true;
                    entry.status = if entry.data.is_some() {
                        QueryStatus::Success
                    } else {
                        QueryStatus::Uninitialized
                    };
                }
                return;
            }
        };

        counter!("rivolo_fetches_total").increment(1);
        let store = self.weak_self.clone();
        handle.spawn(async move {
            let result = fetcher().await;
            if let Some(store) = store.upgrade() {
                store.apply_completion(&signature, generation, result);
            }
        });
    }

    /// Applies a fetch completion, discarding it when superseded.
    fn apply_completion(
        &self,
        signature: &Signature,
        generation: u64,
        result: Result<serde_json::Value, ApiError>,
    ) {
        let notification;
        {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "apply_completion");
            let Some(entry) = entries.get_mut(signature) else {
                debug!(signature = %signature, "Completion for evicted entry discarded");
                return;
            };
            if entry.generation != generation {
                counter!("rivolo_stale_responses_discarded_total").increment(1);
                debug!(
                    signature = %signature,
                    completion_generation = generation,
                    entry_generation = entry.generation,
                    "Superseded response discarded"
                );
                return;
            }

            entry.in_flight = false;
            match result {
                Ok(data) => {
                    entry.status = QueryStatus::Success;
                    entry.data = Some(data);
                    entry.error = None;
                    entry.last_fetched_at = Some(OffsetDateTime::now_utc());
                }
                Err(error) => {
                    // Prior successful data stays readable after a failure.
                    entry.status = QueryStatus::Error;
                    entry.error = Some(error);
                }
            }
            notification = (
                entry.listeners.values().cloned().collect::<Vec<_>>(),
                entry.snapshot(),
            );
        }

        let (listeners, snapshot) = notification;
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Detach one subscriber; starts the eviction grace period when it was
    /// the last one.
    fn release(&self, signature: &Signature, id: u64) {
        let now_unused = {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "release");
            match entries.get_mut(signature) {
                Some(entry) => {
                    entry.listeners.remove(&id);
                    entry.subscriber_count() == 0
                }
                None => false,
            }
        };
        if !now_unused {
            return;
        }

        let store = self.weak_self.clone();
        let signature = signature.clone();
        let grace = self.keep_unused_for;
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    if let Some(store) = store.upgrade() {
                        store.evict_if_unused(&signature);
                    }
                });
            }
            // No runtime to time the grace period; evict right away.
            Err(_) => self.evict_if_unused(&signature),
        }
    }

    fn evict_if_unused(&self, signature: &Signature) {
        let evicted = {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "evict_if_unused");
            match entries.get(signature) {
                Some(entry) if entry.subscriber_count() == 0 => {
                    entries.remove(signature);
                    true
                }
                _ => false,
            }
        };
        if evicted {
            self.registry.unregister(signature);
            debug!(signature = %signature, "Evicted unused cache entry");
        }
    }

    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        mutex_lock(&self.entries, LOCK_TARGET, "entry_count").len()
    }
}

fn format_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(Tag::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
