//! URL-synchronized view state.
//!
//! The URL is the single source of truth: `set`/`update` only write the URL,
//! and the in-memory state changes only through the navigation listener.
//! That one-directional flow is what rules out feedback loops.

use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::util::lock::mutex_lock;

use super::codec;
use super::history::UrlHistory;
use super::value::{ParamMap, from_param_map, to_param_map};

const LOCK_TARGET: &str = "params.synced";

/// View state mirrored into the URL query string.
pub struct SyncedParams<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    history: Arc<UrlHistory>,
    /// Defaults captured at construction; a field absent from the URL always
    /// means this value.
    initial: ParamMap,
    state: Mutex<T>,
    tx: watch::Sender<T>,
}

impl<T> SyncedParams<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    /// Binds `initial` to the given history, seeding state from the current
    /// URL.
    pub fn new(history: Arc<UrlHistory>, initial: T) -> Result<Self, ApiError> {
        let initial_map = to_param_map(&initial)?;
        let decoded = codec::decode(&initial_map, &query_pairs(&history.current()));
        let state: T = from_param_map(&decoded)?;

        let (tx, _rx) = watch::channel(state.clone());
        let inner = Arc::new(Inner {
            history: history.clone(),
            initial: initial_map,
            state: Mutex::new(state),
            tx,
        });

        // Weak: the history outlives individual pages and never drops its
        // listeners.
        let weak: Weak<Inner<T>> = Arc::downgrade(&inner);
        history.on_navigate(Arc::new(move |url: &Url| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_url(url);
            }
        }));

        Ok(Self { inner })
    }

    /// Current state snapshot.
    pub fn state(&self) -> T {
        mutex_lock(&self.inner.state, LOCK_TARGET, "state").clone()
    }

    /// Watch channel carrying every state change.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.inner.tx.subscribe()
    }

    /// Writes a field patch into the URL.
    ///
    /// Unrelated query parameters are preserved; at most one history entry is
    /// pushed, and none when the resulting query equals the current one. The
    /// in-memory state updates through the navigation listener.
    pub fn set(&self, patch: &ParamMap) {
        let current = self.inner.history.current();
        let actions = codec::encode_patch(&self.inner.initial, patch);

        let mut pairs = query_pairs(&current);
        for (key, action) in actions {
            match action {
                Some(value) => {
                    if let Some(existing) = pairs.iter_mut().find(|(k, _)| *k == key) {
                        existing.1 = value;
                    } else {
                        pairs.push((key, value));
                    }
                }
                None => pairs.retain(|(k, _)| *k != key),
            }
        }

        let mut next = current.clone();
        if pairs.is_empty() {
            next.set_query(None);
        } else {
            let mut serializer = next.query_pairs_mut();
            serializer.clear();
            serializer.extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            serializer.finish();
        }

        if next.query() == current.query() {
            debug!(url = %current, "Set produced no query change");
            return;
        }
        self.inner.history.push(next);
    }

    /// Applies a closure to a copy of the state and writes the result into
    /// the URL.
    pub fn update(&self, apply: impl FnOnce(&mut T)) -> Result<(), ApiError> {
        let mut next = self.state();
        apply(&mut next);
        let patch = to_param_map(&next)?;
        self.set(&patch);
        Ok(())
    }
}

impl<T> Inner<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    /// Navigation listener: recompute state from the URL and publish only a
    /// real change. Never writes back to the URL.
    fn apply_url(&self, url: &Url) {
        let decoded = codec::decode(&self.initial, &query_pairs(url));
        let next: T = match from_param_map(&decoded) {
            Ok(next) => next,
            Err(err) => {
                debug!(url = %url, error = %err, "URL did not decode into param state");
                return;
            }
        };

        let mut state = mutex_lock(&self.state, LOCK_TARGET, "apply_url");
        if *state != next {
            *state = next.clone();
            drop(state);
            let _ = self.tx.send(next);
        }
    }
}

fn query_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
