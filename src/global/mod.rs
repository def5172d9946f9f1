//! Artifacts derived from the whole entity tree.
//!
//! They are not build candidates: the pass runs them after every entity
//! build, and only when something was built or destroyed.

mod search_index;
mod site_index;

use anyhow::Result;

pub use search_index::SearchIndex;
pub use site_index::SiteIndex;

use crate::entity::{BuiltOutput, EntityRef, EntityStore};

pub trait GlobalArtifact: Send + Sync {
    fn name(&self) -> &'static str;

    fn build(&self, store: &EntityStore) -> Result<Vec<BuiltOutput>>;
}

/// The default set.
pub fn defaults() -> Vec<Box<dyn GlobalArtifact>> {
    vec![Box::new(SiteIndex), Box::new(SearchIndex)]
}

/// Live, build-ready entities.
fn buildable(store: &EntityStore) -> Vec<EntityRef> {
    store
        .as_vec()
        .into_iter()
        .filter(|entity| entity.is_ready_for_build())
        .collect()
}
