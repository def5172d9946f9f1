//! Dependency manifest: demo and asset files of the sibling page.
//!
//! Produces no artifact. A change to the manifest or to any asset makes
//! the page (and its ancestors) rebuild.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};

use super::PAGE_FILE;
use crate::entity::{BuildContext, BuiltOutput, Entity, EntityCore, EntityId, EntityRef, EntityStore};

#[derive(Debug)]
pub struct DependenciesEntity {
    core: EntityCore,
    source: PathBuf,
}

impl DependenciesEntity {
    pub fn create(root: &Path, path: &Path) -> EntityRef {
        // Same directory as the page, so the page id plus a suffix.
        let page_id = EntityId::from_source(root, &path.with_file_name(PAGE_FILE));
        let core = EntityCore::new(page_id.with_suffix("deps"), vec![path.to_path_buf()]);
        core.set_parent(Some(page_id));
        Arc::new(Self {
            core,
            source: path.to_path_buf(),
        })
    }
}

impl Entity for DependenciesEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "dependencies"
    }

    fn load_source(&self, ctx: &BuildContext) -> Result<()> {
        let def = ctx.parser.parse(&self.source)?;
        let missing: Vec<_> = def
            .dependencies
            .iter()
            .filter(|asset| !asset.is_file())
            .map(|asset| asset.display().to_string())
            .collect();
        if !missing.is_empty() {
            bail!("missing assets: {}", missing.join(", "));
        }
        self.dependencies().replace(def.dependencies);
        Ok(())
    }

    fn build(&self, _ctx: &BuildContext) -> Result<Vec<BuiltOutput>> {
        Ok(Vec::new())
    }

    fn build_candidates(&self, store: &EntityStore) -> Vec<EntityId> {
        let Some(page) = self.parent_id() else {
            return Vec::new();
        };
        let mut ids: Vec<EntityId> = store.ancestors_of(&page).iter().map(|e| e.id().clone()).collect();
        if store.contains(&page) {
            ids.insert(0, page);
        }
        ids
    }
}
