//! Category: groups pages and nested categories into a listing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use parking_lot::RwLock;

use super::{ancestor_links, breadcrumb_html, parent_category, route_of, route_output};
use crate::collab::{Definition, RenderContext, escape_html};
use crate::entity::{
    BuildContext, BuiltOutput, Entity, EntityCore, EntityId, EntityRef, EntityStore, SearchEntry,
};

#[derive(Debug, Clone)]
struct CategoryData {
    title: String,
    route: String,
    order: i64,
}

#[derive(Debug)]
pub struct CategoryEntity {
    core: EntityCore,
    root: PathBuf,
    source: PathBuf,
    data: RwLock<Option<CategoryData>>,
}

impl CategoryEntity {
    pub fn create(root: &Path, path: &Path) -> EntityRef {
        Arc::new(Self {
            core: EntityCore::new(EntityId::from_source(root, path), vec![path.to_path_buf()]),
            root: root.to_path_buf(),
            source: path.to_path_buf(),
            data: RwLock::new(None),
        })
    }

    fn apply(&self, def: &Definition) -> Result<()> {
        let data = CategoryData {
            title: def.require_str("title")?.to_string(),
            route: route_of(def, self.id()),
            order: def.int("order").unwrap_or(0),
        };
        self.core.set_parent(parent_category(&self.root, def));
        *self.data.write() = Some(data);
        Ok(())
    }

    fn data(&self) -> Result<CategoryData> {
        self.data
            .read()
            .clone()
            .ok_or_else(|| anyhow!("category `{}` has not been loaded", self.id()))
    }
}

impl Entity for CategoryEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "category"
    }

    fn title(&self) -> String {
        self.data
            .read()
            .as_ref()
            .map_or_else(|| self.id().to_string(), |d| d.title.clone())
    }

    fn route(&self) -> Option<String> {
        self.data.read().as_ref().map(|d| d.route.clone())
    }

    fn order(&self) -> i64 {
        self.data.read().as_ref().map_or(0, |d| d.order)
    }

    fn load_source(&self, ctx: &BuildContext) -> Result<()> {
        let def = ctx.parser.parse(&self.source)?;
        self.apply(&def)
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<BuiltOutput>> {
        let data = self.data()?;

        let mut children: Vec<_> = self
            .children(&ctx.store)
            .into_iter()
            .filter(|child| child.route().is_some() && child.is_ready_for_build())
            .collect();
        children.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.title().cmp(&b.title())));

        let listing = children
            .iter()
            .filter_map(|child| {
                let route = child.route()?;
                Some(format!(
                    "<li><a href=\"{route}\">{}</a></li>",
                    escape_html(&child.title())
                ))
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut context = RenderContext::new();
        context.insert("title".into(), escape_html(&data.title));
        context.insert(
            "breadcrumbs".into(),
            breadcrumb_html(&ancestor_links(self, &ctx.store)),
        );
        context.insert("children".into(), listing);

        let html = ctx.renderer.render("category", &context)?;
        Ok(vec![BuiltOutput::new(route_output(&data.route), html)])
    }

    fn search_entries(&self, store: &EntityStore) -> Vec<SearchEntry> {
        let Ok(data) = self.data() else {
            return Vec::new();
        };
        vec![SearchEntry {
            title: data.title,
            route: data.route,
            kind: self.kind(),
            breadcrumbs: self.breadcrumbs(store),
            keywords: Vec::new(),
        }]
    }
}
