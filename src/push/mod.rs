//! Push invalidation bridge.
//!
//! Maintains refcounted websocket connections to server push feeds and
//! translates their events into cache invalidations.

mod bridge;
mod message;

pub use bridge::{Feed, FeedInterest, FeedState, PushBridge};
pub use message::{PushMessage, PushStatus};
