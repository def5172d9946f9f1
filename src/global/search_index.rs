use std::path::PathBuf;

use anyhow::Result;

use super::{GlobalArtifact, buildable};
use crate::entity::{BuiltOutput, EntityStore, SearchEntry};

pub const SEARCH_INDEX_FILE: &str = "search-index.json";

/// Search entries of every build-ready entity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchIndex;

impl GlobalArtifact for SearchIndex {
    fn name(&self) -> &'static str {
        "search-index"
    }

    fn build(&self, store: &EntityStore) -> Result<Vec<BuiltOutput>> {
        let mut entries: Vec<SearchEntry> = buildable(store)
            .iter()
            .flat_map(|entity| entity.search_entries(store))
            .collect();
        entries.sort_by(|a, b| a.route.cmp(&b.route).then_with(|| a.title.cmp(&b.title)));

        let json = serde_json::to_string_pretty(&entries)?;
        Ok(vec![BuiltOutput::new(PathBuf::from(SEARCH_INDEX_FILE), json)])
    }
}
