//! Template rendering.
//!
//! Templates are plain text with `{{ key }}` placeholders. Values are
//! inserted verbatim; callers escape with [`escape_html`] where needed.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::{Result, anyhow, bail};
use pulldown_cmark::{Options, Parser, html};
use regex::Regex;
use rustc_hash::FxHashMap;

/// Placeholder values keyed by name.
pub type RenderContext = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[ \t]*([A-Za-z0-9_-]+)[ \t]*\}\}").expect("placeholder pattern is valid")
});

/// Built-in templates, by name.
const BUILTIN: &[(&str, &str)] = &[
    ("page", include_str!("templates/page.html")),
    ("category", include_str!("templates/category.html")),
    ("api", include_str!("templates/api.html")),
    ("api-page", include_str!("templates/api-page.html")),
];

pub trait Renderer: Send + Sync {
    /// Render the template named `template`. Pure.
    fn render(&self, template: &str, context: &RenderContext) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    templates: FxHashMap<String, String>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Renderer with the built-in templates.
    pub fn new() -> Self {
        let templates = BUILTIN
            .iter()
            .map(|(name, body)| ((*name).to_string(), (*body).to_string()))
            .collect();
        Self { templates }
    }

    /// Add or override a template.
    pub fn with_template(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.insert(name.into(), body.into());
        self
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, template: &str, context: &RenderContext) -> Result<String> {
        let body = self
            .templates
            .get(template)
            .ok_or_else(|| anyhow!("unknown template `{template}`"))?;

        let mut out = String::with_capacity(body.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(body) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some(value) = context.get(key.as_str()) else {
                bail!("template `{template}` needs `{}`", key.as_str());
            };
            out.push_str(&body[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&body[last..]);
        Ok(out)
    }
}

/// Markdown → HTML with tables, strikethrough and footnotes enabled.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
