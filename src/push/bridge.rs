//! Refcounted push-feed connections.
//!
//! One tokio task per distinct feed URL, opened when the first interest
//! appears and shut down when the last guard drops. Messages invalidate
//! cache tags; connection failures reconnect with jittered exponential
//! backoff while interest remains.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use metrics::counter;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, trace, warn};

use crate::cache::{QueryStore, Tag};
use crate::config::ReconnectConfig;
use crate::util::lock::mutex_lock;

use super::message::{PushMessage, PushStatus};

const LOCK_TARGET: &str = "push.bridge";

/// A push feed: where to connect and which tag category its events concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Feed {
    pub url: String,
    pub category: String,
}

/// Connection lifecycle, published per feed for observers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Closed,
    Connecting,
    Open,
}

struct FeedConn {
    interested: usize,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<FeedState>,
}

/// Owns all push-feed connections for one client.
pub struct PushBridge {
    store: Arc<QueryStore>,
    reconnect: ReconnectConfig,
    feeds: Mutex<HashMap<String, FeedConn>>,
    weak_self: Weak<PushBridge>,
}

/// RAII guard holding one unit of interest in a feed. Dropping the last
/// guard for a feed shuts its connection down.
pub struct FeedInterest {
    bridge: Weak<PushBridge>,
    url: String,
    state: watch::Receiver<FeedState>,
}

impl FeedInterest {
    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Waits until the feed reaches the given state.
    pub async fn wait_for(&mut self, target: FeedState) {
        let _ = self.state.wait_for(|state| *state == target).await;
    }
}

impl Drop for FeedInterest {
    fn drop(&mut self) {
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.release(&self.url);
        }
    }
}

impl PushBridge {
    pub fn new(store: Arc<QueryStore>, reconnect: ReconnectConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            store,
            reconnect,
            feeds: Mutex::new(HashMap::new()),
            weak_self: weak.clone(),
        })
    }

    /// Takes out interest in a feed, spawning its connection task on the
    /// 0 → 1 transition.
    pub fn interest(&self, feed: Feed) -> FeedInterest {
        let mut feeds = mutex_lock(&self.feeds, LOCK_TARGET, "interest");
        let conn = feeds.entry(feed.url.clone()).or_insert_with(|| {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let (state_tx, state_rx) = watch::channel(FeedState::Closed);
            tokio::spawn(run_feed(
                Arc::downgrade(&self.store),
                feed.clone(),
                self.reconnect.clone(),
                shutdown_rx,
                state_tx,
            ));
            info!(feed = %feed.url, "Opening push feed");
            FeedConn {
                interested: 0,
                shutdown: shutdown_tx,
                state: state_rx,
            }
        });
        conn.interested += 1;

        FeedInterest {
            bridge: self.weak_self.clone(),
            url: feed.url,
            state: conn.state.clone(),
        }
    }

    /// Current interest count for a feed URL.
    pub fn interest_count(&self, url: &str) -> usize {
        mutex_lock(&self.feeds, LOCK_TARGET, "interest_count")
            .get(url)
            .map(|conn| conn.interested)
            .unwrap_or(0)
    }

    fn release(&self, url: &str) {
        let mut feeds = mutex_lock(&self.feeds, LOCK_TARGET, "release");
        let Some(conn) = feeds.get_mut(url) else {
            return;
        };
        conn.interested = conn.interested.saturating_sub(1);
        if conn.interested == 0 {
            let conn = feeds.remove(url);
            if let Some(conn) = conn {
                info!(feed = %url, "Closing push feed");
                let _ = conn.shutdown.send(true);
            }
        }
    }
}

#[instrument(skip_all, fields(feed = %feed.url, category = %feed.category))]
async fn run_feed(
    store: Weak<QueryStore>,
    feed: Feed,
    reconnect: ReconnectConfig,
    mut shutdown: watch::Receiver<bool>,
    state: watch::Sender<FeedState>,
) {
    let mut backoff = reconnect.initial_ms;
    loop {
        if *shutdown.borrow() {
            break;
        }
        let _ = state.send(FeedState::Connecting);

        match connect_async(feed.url.as_str()).await {
            Ok((mut stream, _response)) => {
                info!("Push feed connected");
                counter!("rivolo_push_connects_total").increment(1);
                let _ = state.send(FeedState::Open);
                backoff = reconnect.initial_ms;

                loop {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                let _ = stream.close(None).await;
                                let _ = state.send(FeedState::Closed);
                                return;
                            }
                        }
                        frame = stream.next() => {
                            match frame {
                                Some(Ok(Message::Text(text))) => {
                                    handle_frame(&store, &feed, &text);
                                }
                                // Control frames are answered by the protocol
                                // layer.
                                Some(Ok(Message::Ping(_)))
                                | Some(Ok(Message::Pong(_)))
                                | Some(Ok(Message::Binary(_)))
                                | Some(Ok(Message::Frame(_))) => {}
                                Some(Ok(Message::Close(_))) | None => {
                                    warn!("Push feed closed by server");
                                    break;
                                }
                                Some(Err(err)) => {
                                    warn!(error = %err, "Push feed stream error");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Push feed connect failed");
            }
        }

        counter!("rivolo_push_reconnects_total").increment(1);
        let delay = jittered_backoff(backoff, reconnect.jitter_ms);
        debug!(delay_ms = delay, "Push feed reconnect backoff");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
        backoff = reconnect.next_delay_ms(backoff);
    }
    let _ = state.send(FeedState::Closed);
}

/// A malformed or unknown frame is logged and dropped; it never tears down
/// the connection.
fn handle_frame(store: &Weak<QueryStore>, feed: &Feed, text: &str) {
    let message: PushMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            counter!("rivolo_push_dropped_total").increment(1);
            warn!(error = %err, "Dropped malformed push message");
            return;
        }
    };
    let Some(store) = store.upgrade() else {
        return;
    };

    match message.status() {
        PushStatus::Heartbeat => {
            trace!("Push heartbeat");
        }
        PushStatus::Started => {
            store.invalidate(&[Tag::category(feed.category.clone())]);
        }
        PushStatus::Completed => match message.id {
            Some(id) => store.invalidate(&[Tag::entity(feed.category.clone(), id)]),
            None => store.invalidate(&[Tag::category(feed.category.clone())]),
        },
        PushStatus::Unknown => {
            counter!("rivolo_push_dropped_total").increment(1);
            debug!(status = %message.status, "Dropped push message with unknown status");
        }
    }
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    base_ms.saturating_add(nanos % jitter_ms)
}
