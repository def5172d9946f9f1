//! Build-candidate propagation.

use rustc_hash::FxHashSet;

use crate::entity::{EntityId, EntityRef, EntityStore};

/// Everything that must be rebuilt because `changed` changed.
///
/// The changed entities, every ancestor of each, every entity they name in
/// `build_candidates`, and every entity whose last build used one of their
/// keywords. Destroyed entities still propagate but never appear in the
/// result. Deduplicated by id, changed entities first.
pub fn resolve(changed: &[EntityRef], store: &EntityStore) -> Vec<EntityRef> {
    let mut seen: FxHashSet<EntityId> = FxHashSet::default();
    let mut out = Vec::new();
    let mut push = |entity: EntityRef| {
        if !entity.is_destroyed() && seen.insert(entity.id().clone()) {
            out.push(entity);
        }
    };

    for entity in changed {
        push(entity.clone());
    }

    let all = store.as_vec();
    for entity in changed {
        for ancestor in store.ancestors_of(entity.id()) {
            push(ancestor);
        }
        for id in entity.build_candidates(store) {
            if let Some(candidate) = store.get(&id) {
                push(candidate);
            }
        }
        for keyword in entity.keywords() {
            for dependent in all.iter().filter(|e| e.core().uses_keyword(&keyword)) {
                push(dependent.clone());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::testing::TestEntity;

    fn ids(entities: &[EntityRef]) -> Vec<String> {
        entities.iter().map(|e| e.id().to_string()).collect()
    }

    fn tree() -> EntityStore {
        let store = EntityStore::new();
        store.add(TestEntity::new("docs").into_ref());
        store.add(TestEntity::new("docs/a").with_parent("docs").into_ref());
        store.add(TestEntity::new("docs/b").with_parent("docs").into_ref());
        store
    }

    #[test]
    fn test_child_change_yields_ancestors_not_siblings() {
        let store = tree();
        let changed = vec![store.get(&EntityId::new("docs/a")).unwrap()];
        assert_eq!(ids(&resolve(&changed, &store)), vec!["docs/a", "docs"]);
    }

    #[test]
    fn test_declared_candidates_and_dedup() {
        let store = tree();
        let deps = TestEntity::new("docs/a#deps")
            .with_parent("docs/a")
            .with_candidates(&["docs/a", "docs"])
            .into_ref();
        store.add(deps.clone());

        let changed = vec![deps, store.get(&EntityId::new("docs/a")).unwrap()];
        assert_eq!(ids(&resolve(&changed, &store)), vec!["docs/a#deps", "docs/a", "docs"]);
    }

    #[test]
    fn test_keyword_users_are_candidates() {
        let store = tree();
        let target = TestEntity::new("button").with_keywords(&["Button"]).into_ref();
        let user = store.get(&EntityId::new("docs/b")).unwrap();
        user.core().use_keyword("Button");
        store.add(target.clone());

        let result = ids(&resolve(&[target], &store));
        assert_eq!(result, vec!["button", "docs/b"]);
    }

    #[test]
    fn test_destroyed_entity_propagates_but_is_excluded() {
        let store = tree();
        let gone = store.get(&EntityId::new("docs/a")).unwrap();
        gone.destroy(&store);
        assert_eq!(ids(&resolve(&[gone], &store)), vec!["docs"]);
    }

    #[test]
    fn test_destroyed_ancestor_is_excluded() {
        let store = tree();
        store.get(&EntityId::new("docs")).unwrap().destroy(&store);
        let changed = vec![store.get(&EntityId::new("docs/a")).unwrap()];
        assert_eq!(ids(&resolve(&changed, &store)), vec!["docs/a"]);
    }
}
