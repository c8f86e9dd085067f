//! Rivolo — reactive client-side data synchronization.
//!
//! The data layer of a browser-style client for a media-management service:
//!
//! - **Tagged query cache**: server responses keyed by request signature,
//!   annotated with invalidation tags, fetched single-flight and gated by a
//!   generation counter
//! - **Push invalidation bridge**: refcounted websocket feeds whose events
//!   invalidate tags
//! - **URL-mirrored view state**: filter/pagination state synchronized with
//!   the URL query string, URL as the single source of truth
//! - **Request executor**: one HTTP client normalizing every failure into a
//!   small error taxonomy
//!
//! ```no_run
//! use rivolo::{ApiRequest, QuerySpec, SyncClient, SyncConfig, Tag};
//! use serde_json::json;
//! use url::Url;
//!
//! # async fn demo() -> Result<(), rivolo::ApiError> {
//! let client = SyncClient::new(
//!     SyncConfig::default(),
//!     Url::parse("https://app.example/music").unwrap(),
//! )?;
//!
//! let mut jobs = client.subscribe_query(QuerySpec {
//!     endpoint: "jobs".into(),
//!     args: json!({ "page": 1, "perPage": 20 }),
//!     request: ApiRequest::get("music/jobs")
//!         .with_query(&[("page", "1".into()), ("per_page", "20".into())]),
//!     tags: vec![Tag::category("MusicJob")],
//!     feed: None,
//! });
//! let snapshot = jobs.wait_until(|s| s.is_success()).await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod params;
pub mod push;
pub mod util;

pub use cache::{QuerySnapshot, QueryStatus, QueryStore, Signature, SubscriptionHandle, Tag};
pub use client::{QueryHandle, QuerySpec, SyncClient, global, init};
pub use config::{ReconnectConfig, SyncConfig};
pub use error::ApiError;
pub use http::{ApiRequest, MultipartField, MultipartValue, RequestBody, RequestExecutor};
pub use params::{ParamMap, ParamValue, SyncedParams, UrlHistory};
pub use push::{Feed, FeedInterest, FeedState, PushBridge};
pub use util::debounce::Debouncer;
