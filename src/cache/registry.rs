//! Bidirectional tag registry.
//!
//! Tracks the relationship between invalidation tags and cache entries,
//! enabling efficient invalidation when a tag fires.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use crate::util::lock::{rw_read, rw_write};

use super::keys::{Signature, Tag};

const LOCK_TARGET: &str = "cache.registry";

#[derive(Default)]
struct Index {
    /// Exact tag → signatures that declared it.
    tag_to_sigs: HashMap<Tag, BTreeSet<Signature>>,
    /// Category → every signature declaring that category, bare or with id.
    category_to_sigs: HashMap<String, BTreeSet<Signature>>,
    /// Signature → tags it declared; used for cleanup on eviction.
    sig_to_tags: HashMap<Signature, HashSet<Tag>>,
}

/// Tracks tag → signatures and signature → tags mappings.
///
/// This bidirectional mapping enables:
/// - Finding all cache entries affected by an invalidation
/// - Cleaning up tag mappings when cache entries are evicted
pub struct TagRegistry {
    index: RwLock<Index>,
}

impl TagRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Index::default()),
        }
    }

    /// Register a cache entry with the tags it declared.
    ///
    /// Replaces any previous registration for the same signature.
    pub fn register(&self, signature: Signature, tags: HashSet<Tag>) {
        let mut index = rw_write(&self.index, LOCK_TARGET, "register");
        remove_signature(&mut index, &signature);

        for tag in &tags {
            index
                .tag_to_sigs
                .entry(tag.clone())
                .or_default()
                .insert(signature.clone());
            index
                .category_to_sigs
                .entry(tag.category_name().to_string())
                .or_default()
                .insert(signature.clone());
        }
        index.sig_to_tags.insert(signature, tags);
    }

    /// Resolve the signatures affected by a batch of invalidation tags.
    ///
    /// A bare category tag hits every entry under that category. A
    /// category+id tag hits entries that declared exactly that pair, plus
    /// entries that declared the bare category. The result is a sorted set,
    /// so refetches are issued in a deterministic order.
    pub fn affected(&self, tags: &[Tag]) -> BTreeSet<Signature> {
        let index = rw_read(&self.index, LOCK_TARGET, "affected");
        let mut hit = BTreeSet::new();

        for tag in tags {
            match tag.id() {
                None => {
                    if let Some(sigs) = index.category_to_sigs.get(tag.category_name()) {
                        hit.extend(sigs.iter().cloned());
                    }
                }
                Some(_) => {
                    if let Some(sigs) = index.tag_to_sigs.get(tag) {
                        hit.extend(sigs.iter().cloned());
                    }
                    if let Some(sigs) = index.tag_to_sigs.get(&tag.to_bare()) {
                        hit.extend(sigs.iter().cloned());
                    }
                }
            }
        }
        hit
    }

    /// Get all tags a signature declared.
    pub fn tags_for(&self, signature: &Signature) -> HashSet<Tag> {
        rw_read(&self.index, LOCK_TARGET, "tags_for")
            .sig_to_tags
            .get(signature)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a signature and clean up tag mappings.
    ///
    /// Called when a cache entry is evicted.
    pub fn unregister(&self, signature: &Signature) {
        let mut index = rw_write(&self.index, LOCK_TARGET, "unregister");
        remove_signature(&mut index, signature);
    }

    /// Get the number of tracked signatures.
    pub fn signature_count(&self) -> usize {
        rw_read(&self.index, LOCK_TARGET, "signature_count")
            .sig_to_tags
            .len()
    }
}

fn remove_signature(index: &mut Index, signature: &Signature) {
    let Some(tags) = index.sig_to_tags.remove(signature) else {
        return;
    };
    for tag in tags {
        if let Some(sigs) = index.tag_to_sigs.get_mut(&tag) {
            sigs.remove(signature);
            if sigs.is_empty() {
                index.tag_to_sigs.remove(&tag);
            }
        }
        if let Some(sigs) = index.category_to_sigs.get_mut(tag.category_name()) {
            sigs.remove(signature);
            if sigs.is_empty() {
                index.category_to_sigs.remove(tag.category_name());
            }
        }
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sig(endpoint: &str, page: u64) -> Signature {
        Signature::new(endpoint, &json!({ "page": page }))
    }

    fn tags(tags: &[Tag]) -> HashSet<Tag> {
        tags.iter().cloned().collect()
    }

    #[test]
    fn bare_category_hits_bare_and_id_entries() {
        let registry = TagRegistry::new();
        let list = sig("jobs", 1);
        let detail = sig("job", 7);

        registry.register(list.clone(), tags(&[Tag::category("MusicJob")]));
        registry.register(detail.clone(), tags(&[Tag::entity("MusicJob", "7")]));

        let hit = registry.affected(&[Tag::category("MusicJob")]);
        assert!(hit.contains(&list));
        assert!(hit.contains(&detail));
    }

    #[test]
    fn entity_tag_hits_exact_pair_and_bare_entries() {
        let registry = TagRegistry::new();
        let list = sig("jobs", 1);
        let seven = sig("job", 7);
        let eight = sig("job", 8);

        registry.register(list.clone(), tags(&[Tag::category("MusicJob")]));
        registry.register(seven.clone(), tags(&[Tag::entity("MusicJob", "7")]));
        registry.register(eight.clone(), tags(&[Tag::entity("MusicJob", "8")]));

        let hit = registry.affected(&[Tag::entity("MusicJob", "7")]);
        assert!(hit.contains(&list));
        assert!(hit.contains(&seven));
        assert!(!hit.contains(&eight));
    }

    #[test]
    fn categories_do_not_bleed_into_each_other() {
        let registry = TagRegistry::new();
        let jobs = sig("jobs", 1);
        let videos = sig("videos", 1);

        registry.register(jobs.clone(), tags(&[Tag::category("MusicJob")]));
        registry.register(videos.clone(), tags(&[Tag::category("YoutubeVideo")]));

        let hit = registry.affected(&[Tag::category("MusicJob")]);
        assert!(hit.contains(&jobs));
        assert!(!hit.contains(&videos));
    }

    #[test]
    fn affected_is_sorted_and_deduplicated() {
        let registry = TagRegistry::new();
        let a = sig("a", 1);
        let b = sig("b", 1);

        registry.register(
            a.clone(),
            tags(&[Tag::category("MusicJob"), Tag::entity("MusicJob", "7")]),
        );
        registry.register(b.clone(), tags(&[Tag::category("MusicJob")]));

        let hit = registry.affected(&[Tag::category("MusicJob"), Tag::entity("MusicJob", "7")]);
        let ordered: Vec<_> = hit.into_iter().collect();
        assert_eq!(ordered, vec![a, b]);
    }

    #[test]
    fn unregister_cleans_up_mappings() {
        let registry = TagRegistry::new();
        let list = sig("jobs", 1);

        registry.register(list.clone(), tags(&[Tag::category("MusicJob")]));
        assert_eq!(registry.signature_count(), 1);

        registry.unregister(&list);
        assert_eq!(registry.signature_count(), 0);
        assert!(registry.affected(&[Tag::category("MusicJob")]).is_empty());
    }

    #[test]
    fn reregister_replaces_previous_tags() {
        let registry = TagRegistry::new();
        let list = sig("jobs", 1);

        registry.register(list.clone(), tags(&[Tag::category("MusicJob")]));
        registry.register(list.clone(), tags(&[Tag::category("YoutubeVideo")]));

        assert!(registry.affected(&[Tag::category("MusicJob")]).is_empty());
        assert!(
            registry
                .affected(&[Tag::category("YoutubeVideo")])
                .contains(&list)
        );
    }
}
