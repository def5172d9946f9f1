//! Id → entity registry with a keyword index.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{EntityId, EntityRef};

/// Where a keyword reference points.
#[derive(Debug, Clone)]
pub enum KeywordTarget {
    Entity(EntityRef),
    /// Configured in `[keywords]`.
    External(String),
}

/// Registry of every known entity.
///
/// Entries are removed only through [`EntityStore::delete`], and only once
/// the entity is destroyed. An entity replaced while destroyed (recreated
/// before garbage collection) is parked in `evicted` so its outputs can
/// still be collected.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: RwLock<FxHashMap<EntityId, EntityRef>>,
    keywords: RwLock<FxHashMap<String, EntityId>>,
    external: RwLock<FxHashMap<String, String>>,
    evicted: RwLock<Vec<EntityRef>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entity`, replacing any previous entry with the same id.
    pub fn add(&self, entity: EntityRef) {
        let previous = self.entities.write().insert(entity.id().clone(), entity.clone());
        if let Some(previous) = previous
            && !Arc::ptr_eq(&previous, &entity)
            && previous.is_destroyed()
        {
            self.evicted.write().push(previous);
        }
    }

    pub fn get(&self, id: &EntityId) -> Option<EntityRef> {
        self.entities.read().get(id).cloned()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.read().contains_key(id)
    }

    /// Remove `id` if the stored entity is destroyed. Returns whether an
    /// entry was removed.
    pub fn delete(&self, id: &EntityId) -> bool {
        let mut entities = self.entities.write();
        match entities.get(id) {
            Some(entity) if entity.is_destroyed() => {
                entities.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of all entities, sorted by id.
    pub fn as_vec(&self) -> Vec<EntityRef> {
        let mut all: Vec<_> = self.entities.read().values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Drain entities that were replaced while destroyed.
    pub fn take_evicted(&self) -> Vec<EntityRef> {
        std::mem::take(&mut *self.evicted.write())
    }

    // -------------------------------------------------------------------------
    // Relationships
    // -------------------------------------------------------------------------

    /// Live entities whose parent is `id`, sorted by id.
    pub fn children_of(&self, id: &EntityId) -> Vec<EntityRef> {
        let mut children: Vec<_> = self
            .entities
            .read()
            .values()
            .filter(|e| !e.is_destroyed() && e.parent_id().as_ref() == Some(id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.id().cmp(b.id()));
        children
    }

    /// Ancestors of `id`, nearest first. Stops at a missing parent or a
    /// cycle.
    pub fn ancestors_of(&self, id: &EntityId) -> Vec<EntityRef> {
        let entities = self.entities.read();
        let mut seen = FxHashSet::default();
        seen.insert(id.clone());

        let mut ancestors = Vec::new();
        let mut current = entities.get(id).and_then(|e| e.parent_id());
        while let Some(parent_id) = current {
            if !seen.insert(parent_id.clone()) {
                break;
            }
            let Some(parent) = entities.get(&parent_id) else {
                break;
            };
            current = parent.parent_id();
            ancestors.push(parent.clone());
        }
        ancestors
    }

    // -------------------------------------------------------------------------
    // Keywords
    // -------------------------------------------------------------------------

    /// Rebuild the keyword index from live entities, and replace the
    /// external keyword table with `configured`.
    ///
    /// On duplicate keywords the entity with the smallest id wins.
    pub fn update_keyword_map(&self, configured: &FxHashMap<String, String>) {
        let mut index: FxHashMap<String, EntityId> = FxHashMap::default();
        for entity in self.as_vec() {
            if entity.is_destroyed() {
                continue;
            }
            for keyword in entity.keywords() {
                if let Some(owner) = index.get(&keyword) {
                    crate::debug!("keyword"; "`{}` claimed by `{}` and `{}`", keyword, owner, entity.id());
                    continue;
                }
                index.insert(keyword, entity.id().clone());
            }
        }
        *self.keywords.write() = index;
        *self.external.write() = configured.clone();
    }

    pub fn get_by_keyword(&self, keyword: &str) -> Option<EntityRef> {
        let id = self.keywords.read().get(keyword).cloned()?;
        self.get(&id).filter(|e| !e.is_destroyed())
    }

    /// Entity keywords shadow external ones.
    pub fn resolve_keyword(&self, keyword: &str) -> Option<KeywordTarget> {
        if let Some(entity) = self.get_by_keyword(keyword) {
            return Some(KeywordTarget::Entity(entity));
        }
        self.external
            .read()
            .get(keyword)
            .map(|url| KeywordTarget::External(url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::testing::TestEntity;

    #[test]
    fn test_delete_requires_destroyed() {
        let store = EntityStore::new();
        let entity = TestEntity::new("a").into_ref();
        store.add(entity.clone());

        assert!(!store.delete(entity.id()));
        assert_eq!(store.len(), 1);

        entity.destroy(&store);
        assert!(store.delete(entity.id()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_children_and_ancestors() {
        let store = EntityStore::new();
        let root = TestEntity::new("docs").into_ref();
        let mid = TestEntity::new("docs/guide").with_parent("docs").into_ref();
        let leaf = TestEntity::new("docs/guide/intro").with_parent("docs/guide").into_ref();
        let sibling = TestEntity::new("docs/guide/setup").with_parent("docs/guide").into_ref();
        for e in [&root, &mid, &leaf, &sibling] {
            store.add((*e).clone());
        }

        let children: Vec<_> = store
            .children_of(mid.id())
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(children, vec!["docs/guide/intro", "docs/guide/setup"]);

        let ancestors: Vec<_> = store
            .ancestors_of(leaf.id())
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ancestors, vec!["docs/guide", "docs"]);
    }

    #[test]
    fn test_ancestors_stop_on_cycle() {
        let store = EntityStore::new();
        store.add(TestEntity::new("a").with_parent("b").into_ref());
        store.add(TestEntity::new("b").with_parent("a").into_ref());

        let ancestors = store.ancestors_of(&EntityId::new("a"));
        assert_eq!(ancestors.len(), 1);
        assert_eq!(ancestors[0].id().as_str(), "b");
    }

    #[test]
    fn test_keyword_resolution() {
        let store = EntityStore::new();
        store.add(TestEntity::new("button").with_keywords(&["Button"]).into_ref());

        let mut external = FxHashMap::default();
        external.insert("Rust".to_string(), "https://www.rust-lang.org".to_string());
        external.insert("Button".to_string(), "https://example.com".to_string());
        store.update_keyword_map(&external);

        assert!(matches!(
            store.resolve_keyword("Button"),
            Some(KeywordTarget::Entity(e)) if e.id().as_str() == "button"
        ));
        assert!(matches!(
            store.resolve_keyword("Rust"),
            Some(KeywordTarget::External(url)) if url == "https://www.rust-lang.org"
        ));
        assert!(store.resolve_keyword("Missing").is_none());
    }

    #[test]
    fn test_destroyed_entity_drops_out_of_keyword_lookup() {
        let store = EntityStore::new();
        let entity = TestEntity::new("button").with_keywords(&["Button"]).into_ref();
        store.add(entity.clone());
        store.update_keyword_map(&FxHashMap::default());

        entity.destroy(&store);
        assert!(store.get_by_keyword("Button").is_none());
    }

    #[test]
    fn test_replacing_destroyed_entity_is_evicted() {
        let store = EntityStore::new();
        let old = TestEntity::new("a").into_ref();
        store.add(old.clone());
        old.destroy(&store);

        store.add(TestEntity::new("a").into_ref());
        let evicted = store.take_evicted();
        assert_eq!(evicted.len(), 1);
        assert!(Arc::ptr_eq(&evicted[0], &old));
        assert!(store.take_evicted().is_empty());
    }
}
