//! Owned navigation history.
//!
//! A testable stand-in for browser history: a stack of URLs with a cursor.
//! Listeners run synchronously after every navigation, outside the internal
//! lock, so state derived from the URL is updated before the navigation call
//! returns.

use std::sync::{Arc, Mutex};

use tracing::debug;
use url::Url;

use crate::util::lock::mutex_lock;

const LOCK_TARGET: &str = "params.history";

/// Invoked with the new current URL after every navigation.
pub type NavigationListener = Arc<dyn Fn(&Url) + Send + Sync>;

struct Entries {
    stack: Vec<Url>,
    cursor: usize,
}

/// Navigation history with back/forward support.
pub struct UrlHistory {
    entries: Mutex<Entries>,
    listeners: Mutex<Vec<NavigationListener>>,
}

impl UrlHistory {
    pub fn new(start: Url) -> Self {
        Self {
            entries: Mutex::new(Entries {
                stack: vec![start],
                cursor: 0,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The URL the cursor currently points at.
    pub fn current(&self) -> Url {
        let entries = mutex_lock(&self.entries, LOCK_TARGET, "current");
        entries.stack[entries.cursor].clone()
    }

    /// Number of entries on the stack, forward history included.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, LOCK_TARGET, "len").stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a new entry, truncating any forward history.
    pub fn push(&self, url: Url) {
        {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "push");
            let cursor = entries.cursor;
            entries.stack.truncate(cursor + 1);
            entries.stack.push(url.clone());
            entries.cursor += 1;
        }
        debug!(url = %url, "History push");
        self.notify(&url);
    }

    /// Move the cursor back one entry. Returns false at the oldest entry.
    pub fn back(&self) -> bool {
        let url = {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "back");
            if entries.cursor == 0 {
                return false;
            }
            entries.cursor -= 1;
            entries.stack[entries.cursor].clone()
        };
        debug!(url = %url, "History back");
        self.notify(&url);
        true
    }

    /// Move the cursor forward one entry. Returns false at the newest entry.
    pub fn forward(&self) -> bool {
        let url = {
            let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "forward");
            if entries.cursor + 1 >= entries.stack.len() {
                return false;
            }
            entries.cursor += 1;
            entries.stack[entries.cursor].clone()
        };
        debug!(url = %url, "History forward");
        self.notify(&url);
        true
    }

    /// Register a navigation listener. Listeners are never unregistered;
    /// hold weak references inside the closure to avoid keeping state alive.
    pub fn on_navigate(&self, listener: NavigationListener) {
        mutex_lock(&self.listeners, LOCK_TARGET, "on_navigate").push(listener);
    }

    fn notify(&self, url: &Url) {
        let listeners = mutex_lock(&self.listeners, LOCK_TARGET, "notify").clone();
        for listener in listeners {
            listener(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn url(path_and_query: &str) -> Url {
        Url::parse(&format!("https://app.example{path_and_query}")).unwrap()
    }

    #[test]
    fn push_back_forward_move_the_cursor() {
        let history = UrlHistory::new(url("/videos"));
        history.push(url("/videos?page=2"));
        history.push(url("/videos?page=3"));

        assert_eq!(history.current(), url("/videos?page=3"));
        assert!(history.back());
        assert_eq!(history.current(), url("/videos?page=2"));
        assert!(history.back());
        assert_eq!(history.current(), url("/videos"));
        assert!(!history.back());
        assert!(history.forward());
        assert_eq!(history.current(), url("/videos?page=2"));
    }

    #[test]
    fn push_truncates_forward_history() {
        let history = UrlHistory::new(url("/videos"));
        history.push(url("/videos?page=2"));
        history.back();
        history.push(url("/videos?likedOnly=1"));

        assert_eq!(history.len(), 2);
        assert!(!history.forward());
        assert_eq!(history.current(), url("/videos?likedOnly=1"));
    }

    #[test]
    fn listeners_fire_once_per_navigation() {
        let history = UrlHistory::new(url("/videos"));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        history.on_navigate(Arc::new(move |_url| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        history.push(url("/videos?page=2"));
        history.back();
        history.forward();
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }
}
