//! Documentation page: a TOML definition plus a markdown body.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use super::{
    ancestor_links, breadcrumb_html, compiled_definition, link_keywords, parent_category,
    route_of, route_output,
};
use crate::collab::{Definition, RenderContext, escape_html, markdown_to_html};
use crate::entity::{
    BuildContext, BuiltOutput, Entity, EntityCore, EntityId, EntityRef, EntityStore, SearchEntry,
};

#[derive(Debug, Clone)]
struct PageData {
    title: String,
    body: PathBuf,
    keywords: Vec<String>,
    route: String,
    order: i64,
}

impl PageData {
    fn from_definition(def: &Definition, id: &EntityId) -> Result<Self> {
        let title = def.require_str("title")?.to_string();
        let body = def.resolve(def.require_str("body")?);
        if !body.is_file() {
            bail!("body file {} not found", body.display());
        }

        let mut keywords = def.str_list("keyword")?;
        keywords.extend(def.str_list("keywords")?);
        let mut seen = FxHashSet::default();
        keywords.retain(|k| seen.insert(k.clone()));

        Ok(Self {
            title,
            body,
            keywords,
            route: route_of(def, id),
            order: def.int("order").unwrap_or(0),
        })
    }
}

#[derive(Debug)]
pub struct PageEntity {
    core: EntityCore,
    root: PathBuf,
    source: PathBuf,
    data: RwLock<Option<PageData>>,
}

impl PageEntity {
    pub fn create(root: &Path, path: &Path) -> EntityRef {
        Arc::new(Self {
            core: EntityCore::new(EntityId::from_source(root, path), vec![path.to_path_buf()]),
            root: root.to_path_buf(),
            source: path.to_path_buf(),
            data: RwLock::new(None),
        })
    }

    fn apply(&self, def: &Definition) -> Result<()> {
        let data = PageData::from_definition(def, self.id())?;
        self.dependencies().replace(def.dependencies.iter().cloned());
        self.core.set_parent(parent_category(&self.root, def));
        *self.data.write() = Some(data);
        Ok(())
    }

    fn data(&self) -> Result<PageData> {
        self.data
            .read()
            .clone()
            .ok_or_else(|| anyhow!("page `{}` has not been loaded", self.id()))
    }

    /// Demo sources listed by the sibling dependency manifest.
    fn demos_html(&self, store: &EntityStore) -> Result<String> {
        let Some(deps) = store.get(&self.id().with_suffix("deps")) else {
            return Ok(String::new());
        };
        if deps.is_destroyed() {
            return Ok(String::new());
        }

        let mut html = String::new();
        for asset in deps.dependencies().snapshot() {
            let source = fs::read_to_string(&asset)
                .with_context(|| format!("reading demo {}", asset.display()))?;
            let name = asset
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            html.push_str(&format!(
                "<section class=\"demo\"><h2>{}</h2><pre><code>{}</code></pre></section>\n",
                escape_html(&name),
                escape_html(&source)
            ));
        }
        Ok(html)
    }
}

impl Entity for PageEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "page"
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

    fn keywords(&self) -> Vec<String> {
        self.data
            .read()
            .as_ref()
            .map(|d| d.keywords.clone())
            .unwrap_or_default()
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

    fn build(&self, ctx: &BuildContext) -> Result<Vec<BuiltOutput>> {
        let data = self.data()?;
        let markdown = fs::read_to_string(&data.body)
            .with_context(|| format!("reading body {}", data.body.display()))?;

        let linked = link_keywords(&markdown, &self.core, &ctx.store);
        let mut content = markdown_to_html(&linked);
        content.push_str(&self.demos_html(&ctx.store)?);

        let mut context = RenderContext::new();
        context.insert("title".into(), escape_html(&data.title));
        context.insert(
            "breadcrumbs".into(),
            breadcrumb_html(&ancestor_links(self, &ctx.store)),
        );
        context.insert("content".into(), content);

        let html = ctx.renderer.render("page", &context)?;
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
            keywords: data.keywords,
        }]
    }
}
