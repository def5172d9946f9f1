use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use super::{GlobalArtifact, buildable};
use crate::entity::{BuiltOutput, EntityId, EntityStore};

pub const SITE_INDEX_FILE: &str = "index.json";

#[derive(Debug, Serialize)]
struct SiteEntry {
    id: EntityId,
    kind: &'static str,
    title: String,
    route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<EntityId>,
}

/// Routes and titles of every build-ready entity, sorted by route.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteIndex;

impl GlobalArtifact for SiteIndex {
    fn name(&self) -> &'static str {
        "site-index"
    }

    fn build(&self, store: &EntityStore) -> Result<Vec<BuiltOutput>> {
        let mut entries: Vec<SiteEntry> = buildable(store)
            .into_iter()
            .filter_map(|entity| {
                Some(SiteEntry {
                    route: entity.route()?,
                    id: entity.id().clone(),
                    kind: entity.kind(),
                    title: entity.title(),
                    parent: entity.parent_id(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.route.cmp(&b.route).then_with(|| a.id.cmp(&b.id)));

        let json = serde_json::to_string_pretty(&entries)?;
        Ok(vec![BuiltOutput::new(PathBuf::from(SITE_INDEX_FILE), json)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::testing::TestEntity;

    #[test]
    fn test_skips_entities_without_route() {
        let store = EntityStore::new();
        store.add(TestEntity::new("a").into_ref());
        let outputs = SiteIndex.build(&store).unwrap();
        assert_eq!(outputs[0].content, "[]");
    }
}
