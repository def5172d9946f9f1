//! API reference and the pages it generates.
//!
//! ```toml
//! title = "Components"
//! [[items]]
//! name = "Button"
//! file = "src/button.rs"
//! kind = "struct"
//! ```
//!
//! Every item becomes a non-physical [`ApiPageEntity`] whose root file is
//! the item's source file. Destroying the API destroys them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use parking_lot::RwLock;

use super::{
    ancestor_links, breadcrumb_html, compiled_definition, parent_category, route_of, route_output,
};
use crate::collab::{Definition, RenderContext, escape_html};
use crate::entity::{
    BuildContext, BuiltOutput, Entity, EntityCore, EntityId, EntityRef, EntityStore, SearchEntry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ApiItem {
    name: String,
    file: PathBuf,
    kind: String,
}

#[derive(Debug, Clone)]
struct ApiData {
    title: String,
    route: String,
    order: i64,
    items: Vec<ApiItem>,
}

impl ApiData {
    fn from_definition(def: &Definition, id: &EntityId) -> Result<Self> {
        let mut items = Vec::new();
        for (i, table) in def.tables("items")?.into_iter().enumerate() {
            let field = |key: &str| {
                table
                    .get(key)
                    .and_then(toml::Value::as_str)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| anyhow!("items[{i}] is missing `{key}`"))
            };
            let name = field("name")?.to_string();
            if items.iter().any(|item: &ApiItem| item.name == name) {
                bail!("duplicate item `{name}`");
            }
            items.push(ApiItem {
                file: def.resolve(field("file")?),
                kind: table
                    .get("kind")
                    .and_then(toml::Value::as_str)
                    .unwrap_or("item")
                    .to_string(),
                name,
            });
        }

        Ok(Self {
            title: def.require_str("title")?.to_string(),
            route: route_of(def, id),
            order: def.int("order").unwrap_or(0),
            items,
        })
    }
}

#[derive(Debug)]
pub struct ApiEntity {
    core: EntityCore,
    root: PathBuf,
    source: PathBuf,
    data: RwLock<Option<ApiData>>,
}

impl ApiEntity {
    pub fn create(root: &Path, path: &Path) -> EntityRef {
        Arc::new(Self {
            core: EntityCore::new(EntityId::from_source(root, path), vec![path.to_path_buf()]),
            root: root.to_path_buf(),
            source: path.to_path_buf(),
            data: RwLock::new(None),
        })
    }

    fn apply(&self, def: &Definition) -> Result<()> {
        let data = ApiData::from_definition(def, self.id())?;
        self.core.set_parent(parent_category(&self.root, def));
        *self.data.write() = Some(data);
        Ok(())
    }

    fn data(&self) -> Result<ApiData> {
        self.data
            .read()
            .clone()
            .ok_or_else(|| anyhow!("api `{}` has not been loaded", self.id()))
    }
}

impl Entity for ApiEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "api"
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

    fn compilable(&self) -> bool {
        true
    }

    fn load_source(&self, ctx: &BuildContext) -> Result<()> {
        let def = ctx.parser.parse(&self.source)?;
        self.apply(&def)
    }

    fn update(&self, ctx: &BuildContext) -> Result<()> {
        let def = compiled_definition(ctx, self.id(), &self.source)?;
        self.apply(&def)
    }

    fn generate_children(&self, _ctx: &BuildContext) -> Result<Vec<EntityRef>> {
        let data = self.data()?;
        Ok(data
            .items
            .into_iter()
            .map(|item| {
                let route = format!("{}/{}", data.route.trim_end_matches('/'), item.name);
                ApiPageEntity::generate(self.id(), &self.source, item, route)
            })
            .collect())
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<BuiltOutput>> {
        let data = self.data()?;
        let items = self
            .children(&ctx.store)
            .iter()
            .filter_map(|child| {
                let route = child.route()?;
                Some(format!(
                    "<li><a href=\"{route}\"><code>{}</code></a></li>",
                    escape_html(&child.title())
                ))
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut context = RenderContext::new();
        context.insert("title".into(), escape_html(&data.title));
        context.insert("items".into(), items);

        let html = ctx.renderer.render("api", &context)?;
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

/// One documented item of an API reference.
#[derive(Debug)]
pub struct ApiPageEntity {
    core: EntityCore,
    item: ApiItem,
    route: String,
}

impl ApiPageEntity {
    /// The API definition is a dependency: it carries the item's kind.
    fn generate(api: &EntityId, api_source: &Path, item: ApiItem, route: String) -> EntityRef {
        let core = EntityCore::generated(api.child(&item.name), vec![item.file.clone()]);
        core.set_parent(Some(api.clone()));
        let page = Self { core, item, route };
        page.dependencies().add([api_source.to_path_buf()]);
        Arc::new(page)
    }
}

impl Entity for ApiPageEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "api-page"
    }

    fn title(&self) -> String {
        self.item.name.clone()
    }

    fn route(&self) -> Option<String> {
        Some(self.route.clone())
    }

    fn keywords(&self) -> Vec<String> {
        vec![self.item.name.clone()]
    }

    fn load_source(&self, _ctx: &BuildContext) -> Result<()> {
        if !self.item.file.is_file() {
            bail!("source file {} not found", self.item.file.display());
        }
        Ok(())
    }

    fn update(&self, ctx: &BuildContext) -> Result<()> {
        self.load_source(ctx)
    }

    fn build(&self, ctx: &BuildContext) -> Result<Vec<BuiltOutput>> {
        let source = fs::read_to_string(&self.item.file)
            .with_context(|| format!("reading {}", self.item.file.display()))?;

        let mut context = RenderContext::new();
        context.insert("title".into(), escape_html(&self.item.name));
        context.insert("kind".into(), escape_html(&self.item.kind));
        context.insert(
            "breadcrumbs".into(),
            breadcrumb_html(&ancestor_links(self, &ctx.store)),
        );
        context.insert("source".into(), escape_html(&source));

        let html = ctx.renderer.render("api-page", &context)?;
        Ok(vec![BuiltOutput::new(route_output(&self.route), html)])
    }

    fn search_entries(&self, store: &EntityStore) -> Vec<SearchEntry> {
        vec![SearchEntry {
            title: self.item.name.clone(),
            route: self.route.clone(),
            kind: self.kind(),
            breadcrumbs: self.breadcrumbs(store),
            keywords: self.keywords(),
        }]
    }
}
