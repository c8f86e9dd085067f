//! Small shared utilities.

pub mod debounce;
pub(crate) mod lock;
