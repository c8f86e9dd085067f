//! Tagged query cache.
//!
//! Caches server responses keyed by request signature and annotated with
//! invalidation tags:
//!
//! - **Signatures** identify a query by endpoint + canonical arguments
//! - **Tags** declare what data an entry depends on, bare category or
//!   category+id
//! - **The store** deduplicates fetches, gates completions by generation,
//!   and evicts unreferenced entries after a grace period

mod entry;
mod keys;
mod registry;
mod store;

pub use entry::{Fetcher, Listener, QuerySnapshot, QueryStatus};
pub use keys::{Signature, Tag};
pub use registry::TagRegistry;
pub use store::{QueryStore, SubscriptionHandle};
