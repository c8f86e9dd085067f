//! Cache key definitions.
//!
//! Defines `Signature` for cache entries and `Tag` for invalidation targets.

use std::fmt;

use serde_json::Value;

/// Identity of a cached query: the endpoint plus a canonical serialization of
/// its argument object.
///
/// Two argument objects that are semantically equal produce byte-identical
/// signatures regardless of field declaration order. `Ord` gives invalidation
/// a deterministic refetch order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    endpoint: String,
    args: String,
}

impl Signature {
    /// Builds a signature from an endpoint name and its JSON argument object.
    pub fn new(endpoint: impl Into<String>, args: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(args, &mut canonical);
        Self {
            endpoint: endpoint.into(),
            args: canonical,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.endpoint, self.args)
    }
}

/// Canonical JSON: object keys emitted in sorted order at every depth.
///
/// Not tied to serde_json's map ordering, which other crates in the build can
/// flip through the `preserve_order` feature.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        // Scalars already have a canonical JSON rendering.
        other => out.push_str(&other.to_string()),
    }
}

/// Invalidation target attached to cache entries.
///
/// A bare category tag matches every entry under that category; a
/// category+id tag matches entries declaring exactly that pair, plus entries
/// that declared the bare category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    category: String,
    id: Option<String>,
}

impl Tag {
    /// A bare category tag, e.g. `MusicJob`.
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: None,
        }
    }

    /// A category+id tag, e.g. `MusicJob:7`.
    pub fn entity(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: Some(id.into()),
        }
    }

    pub fn category_name(&self) -> &str {
        &self.category
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The bare-category form of this tag.
    pub fn to_bare(&self) -> Tag {
        Tag::category(self.category.clone())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{}", self.category, id),
            None => write!(f, "{}", self.category),
        }
    }
}
