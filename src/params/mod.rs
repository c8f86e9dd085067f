//! URL-mirrored view state.
//!
//! Bidirectional synchronization between a page's filter/pagination state
//! and the URL query string:
//!
//! - **Codec**: lossless-enough mapping between typed fields and query pairs
//! - **History**: owned navigation stack with synchronous listeners
//! - **SyncedParams**: URL-as-source-of-truth state container

mod codec;
mod history;
mod synced;
mod value;

pub use codec::{decode, encode_patch};
pub use history::{NavigationListener, UrlHistory};
pub use synced::SyncedParams;
pub use value::{ParamMap, ParamValue, from_param_map, to_param_map};
