//! Concrete entity kinds and their source patterns.
//!
//! | kind         | source file       |
//! |--------------|-------------------|
//! | category     | `category.toml`   |
//! | page         | `page.toml`       |
//! | dependencies | `page.deps.toml`  |
//! | api          | `api.toml`        |
//!
//! API entities generate one non-physical `api-page` per item.

mod api;
mod category;
mod dependencies;
mod keyword;
mod page;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

pub use api::{ApiEntity, ApiPageEntity};
pub use category::CategoryEntity;
pub use dependencies::DependenciesEntity;
pub use keyword::link_keywords;
pub use page::PageEntity;

use crate::collab::{CompileEntry, Definition};
use crate::entity::{BuildContext, EntityId, EntityRef};
use crate::lifecycle::EntityFactory;

pub const CATEGORY_FILE: &str = "category.toml";
pub const PAGE_FILE: &str = "page.toml";
pub const DEPENDENCIES_FILE: &str = "page.deps.toml";
pub const API_FILE: &str = "api.toml";

/// A kind bound to one entity root: the glob its coordinator watches and
/// the factory it constructs entities with.
#[derive(Clone)]
pub struct KindBinding {
    pub kind: &'static str,
    pub pattern: String,
    pub factory: Arc<dyn EntityFactory>,
}

impl std::fmt::Debug for KindBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindBinding")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Bindings of every kind for every root.
pub fn bindings(roots: &[PathBuf]) -> Vec<KindBinding> {
    let mut out = Vec::with_capacity(roots.len() * 4);
    for root in roots {
        out.push(binding(root, "category", CATEGORY_FILE, CategoryEntity::create));
        out.push(binding(root, "page", PAGE_FILE, PageEntity::create));
        out.push(binding(root, "dependencies", DEPENDENCIES_FILE, DependenciesEntity::create));
        out.push(binding(root, "api", API_FILE, ApiEntity::create));
    }
    out
}

fn binding(
    root: &Path,
    kind: &'static str,
    file: &str,
    create: fn(&Path, &Path) -> EntityRef,
) -> KindBinding {
    let root = root.to_path_buf();
    let pattern = format!("{}/**/{file}", crate::utils::path::to_slash(&root));
    let factory = move |path: &Path| create(&root, path);
    KindBinding {
        kind,
        pattern,
        factory: Arc::new(factory),
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Parent category of a definition.
///
/// An explicit `category` key names a directory (relative to the
/// definition) holding a `category.toml`. Otherwise the nearest ancestor
/// directory below `root` that holds one is used.
pub(crate) fn parent_category(root: &Path, def: &Definition) -> Option<EntityId> {
    if let Some(explicit) = def.str("category") {
        let dir = def.resolve(explicit);
        let dir = if dir.file_name().is_some_and(|n| n == CATEGORY_FILE) {
            dir.parent().map(Path::to_path_buf).unwrap_or(dir)
        } else {
            dir
        };
        return Some(EntityId::from_source(root, &dir.join(CATEGORY_FILE)));
    }

    let mut dir = def.dir().parent();
    while let Some(current) = dir {
        if !current.starts_with(root) {
            break;
        }
        let candidate = current.join(CATEGORY_FILE);
        if candidate.is_file() {
            return Some(EntityId::from_source(root, &candidate));
        }
        dir = current.parent();
    }
    None
}

/// `route` from the definition, or `/<id>`.
pub(crate) fn route_of(def: &Definition, id: &EntityId) -> String {
    match def.str("route") {
        Some(route) => format!("/{}", route.trim_matches('/')),
        None => format!("/{id}"),
    }
}

/// Output file of a route: `/guide/intro` → `guide/intro/index.html`.
pub(crate) fn route_output(route: &str) -> PathBuf {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        PathBuf::from("index.html")
    } else {
        PathBuf::from(trimmed).join("index.html")
    }
}

/// Re-read a definition from the compiled module of `path`.
pub(crate) fn compiled_definition(
    ctx: &BuildContext,
    id: &EntityId,
    path: &Path,
) -> anyhow::Result<Definition> {
    let entry = CompileEntry::new(id.clone(), path);
    let module: Value = ctx.compiler.load_output(&entry, &ctx.compiled_dir)?;
    let table: toml::Table = serde_json::from_value(module)?;
    Ok(Definition::from_table(path, table))
}

/// Breadcrumb trail rendered as HTML links.
pub(crate) fn breadcrumb_html(crumbs: &[(String, Option<String>)]) -> String {
    crumbs
        .iter()
        .map(|(title, route)| {
            let title = crate::collab::escape_html(title);
            match route {
                Some(route) => format!("<a href=\"{route}\">{title}</a>"),
                None => title,
            }
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

/// `(title, route)` of every ancestor, root first.
pub(crate) fn ancestor_links(
    entity: &dyn crate::entity::Entity,
    store: &crate::entity::EntityStore,
) -> Vec<(String, Option<String>)> {
    let mut crumbs: Vec<_> = store
        .ancestors_of(entity.id())
        .iter()
        .map(|e| (e.title(), e.route()))
        .collect();
    crumbs.reverse();
    crumbs
}
