//! Document rendering: markdown conversion, highlight marks, code blocks, and page chrome.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use minijinja::Environment;
use serde::Serialize;

use crate::app::matcher::{self, RenderedBlock};
use crate::domain::model::{Heading, Highlight, HighlightId};
use crate::domain::tree::{DocumentTree, Node};
use crate::infra::config::Config;
use crate::infra::highlight::{AssetCache, CodeHighlighter};
use crate::infra::markdown::{ConvertOptions, Converted, MarkdownConverter, PulldownConverter};

const PAGE_TEMPLATE: &str = include_str!("../../assets/templates/page.html");
const PAGE_TEMPLATE_NAME: &str = "page.html";

/// A markdown document to render.
#[derive(Debug, Clone, Default)]
pub struct DocSource {
    /// Document identifier; highlights are stored per title.
    pub title: String,
    pub content: String,
    /// Path inside the documentation repository, used for the edit link.
    pub file_path: Option<String>,
}

/// Runtime options controlling rendering.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub convert: ConvertOptions,
    /// Themes every code block is rendered in, light first.
    pub themes: Vec<String>,
    pub toc: bool,
    pub repo: Option<String>,
    pub branch: String,
}

impl RenderOptions {
    /// Build options from configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            convert: config.render.convert_options(),
            themes: config
                .render
                .themes()
                .iter()
                .map(|theme| theme.to_string())
                .collect(),
            toc: config.render.toc(),
            repo: config.site.repo.clone(),
            branch: config.site.branch().to_string(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of rendering one document.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPage {
    pub title: String,
    /// Full HTML page.
    pub html: String,
    /// Document body only.
    pub body: String,
    pub headings: Vec<Heading>,
    pub blocks: Vec<RenderedBlock>,
}

impl RenderedPage {
    /// Ids of the highlights that ended up visible, in block order.
    pub fn marks(&self) -> Vec<HighlightId> {
        self.blocks
            .iter()
            .filter_map(RenderedBlock::highlight)
            .collect()
    }
}

/// Renders documents for one session. Highlighting assets are shared between renders.
pub struct DocumentRenderer {
    converter: Box<dyn MarkdownConverter>,
    code: CodeHighlighter,
    env: Environment<'static>,
    options: RenderOptions,
}

impl DocumentRenderer {
    pub fn new(options: RenderOptions) -> Result<Self> {
        Self::with_parts(
            Box::new(PulldownConverter::new()),
            Arc::new(AssetCache::load_defaults()),
            options,
        )
    }

    pub fn with_parts(
        converter: Box<dyn MarkdownConverter>,
        assets: Arc<AssetCache>,
        options: RenderOptions,
    ) -> Result<Self> {
        Ok(Self {
            converter,
            code: CodeHighlighter::new(assets),
            env: default_environment()?,
            options,
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Convert the document to its rendered tree. Selections are made against this tree.
    pub fn convert(&self, doc: &DocSource) -> Converted {
        self.converter.convert(&doc.content, &self.options.convert)
    }

    /// Convert and render `doc` with `highlights` applied.
    pub fn render(&self, doc: &DocSource, highlights: &[Highlight]) -> Result<RenderedPage> {
        let converted = self.convert(doc);
        self.render_converted(doc, converted, highlights)
    }

    pub fn render_converted(
        &self,
        doc: &DocSource,
        converted: Converted,
        highlights: &[Highlight],
    ) -> Result<RenderedPage> {
        let Converted { tree, headings } = converted;
        let blocks = matcher::apply(&tree, highlights);

        let mut replace_code = |node: &Node| self.code_block(&tree, node);
        let body: String = blocks
            .iter()
            .map(|block| block.to_html_with(&tree, &mut replace_code))
            .collect::<Vec<_>>()
            .join("\n");

        let toc = (self.options.toc && headings.len() > 1).then_some(&headings);
        let context = PageContext {
            title: &doc.title,
            body: &body,
            toc,
            edit_url: self.edit_url(doc),
        };
        let html = self
            .env
            .get_template(PAGE_TEMPLATE_NAME)
            .and_then(|template| template.render(&context))
            .map_err(|err| anyhow!("failed to render page for '{}': {err}", doc.title))?;

        Ok(RenderedPage {
            title: doc.title.clone(),
            html,
            body,
            headings,
            blocks,
        })
    }

    fn edit_url(&self, doc: &DocSource) -> Option<String> {
        let repo = self.options.repo.as_deref()?;
        let file_path = doc.file_path.as_deref()?;
        Some(format!(
            "https://github.com/{repo}/tree/{}/{file_path}",
            self.options.branch
        ))
    }

    /// Markup for `pre > code` blocks, one rendering per configured theme.
    fn code_block(&self, tree: &DocumentTree, node: &Node) -> Option<String> {
        if node.tag() != Some("pre") {
            return None;
        }
        let code_node = node
            .children
            .first()
            .and_then(|child| tree.get(*child))
            .filter(|child| child.tag() == Some("code"))?;
        let language = code_node
            .attr("class")
            .and_then(|class| class.strip_prefix("language-"))
            .unwrap_or("");
        let code = tree.text_content(node.id);

        let mut out = format!(
            "<div class=\"code-block\" data-language=\"{}\">",
            html_escape::encode_double_quoted_attribute(language)
        );
        for theme in &self.options.themes {
            out.push_str(&format!(
                "<div class=\"code-theme\" data-theme=\"{}\">",
                html_escape::encode_double_quoted_attribute(theme)
            ));
            out.push_str(&self.code.highlight(&code, language, theme));
            out.push_str("</div>");
        }
        out.push_str("</div>");
        Some(out)
    }
}

fn default_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE)
        .map_err(|err| anyhow!("failed to register page template: {err}"))?;
    Ok(env)
}

#[derive(Serialize)]
struct PageContext<'a> {
    title: &'a str,
    body: &'a str,
    toc: Option<&'a Vec<Heading>>,
    edit_url: Option<String>,
}
