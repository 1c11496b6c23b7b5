//! Markdown conversion into a [`DocumentTree`].

use std::collections::HashMap;

use once_cell::sync::Lazy;
use pulldown_cmark::{
    Alignment, BlockQuoteKind, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::model::Heading;
use crate::domain::tree::{DocumentTree, NodeId};

/// Characters dropped when turning heading text into an anchor id.
static SLUG_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\p{M}\s_-]").expect("slug pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Tables, strikethrough, task lists, and footnotes.
    pub gfm: bool,
    /// Give headings slug `id`s.
    pub heading_ids: bool,
    /// Render `> [!NOTE]` style block quotes as alert callouts.
    pub alerts: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            heading_ids: true,
            alerts: true,
        }
    }
}

/// Converted markup plus the headings found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub tree: DocumentTree,
    pub headings: Vec<Heading>,
}

impl Converted {
    pub fn markup(&self) -> String {
        self.tree.to_html(self.tree.root())
    }
}

pub trait MarkdownConverter: Send + Sync {
    fn convert(&self, raw: &str, options: &ConvertOptions) -> Converted;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PulldownConverter;

impl PulldownConverter {
    pub fn new() -> Self {
        Self
    }
}

impl MarkdownConverter for PulldownConverter {
    fn convert(&self, raw: &str, options: &ConvertOptions) -> Converted {
        let mut parser_options = Options::empty();
        if options.gfm {
            parser_options.insert(Options::ENABLE_TABLES);
            parser_options.insert(Options::ENABLE_STRIKETHROUGH);
            parser_options.insert(Options::ENABLE_TASKLISTS);
            parser_options.insert(Options::ENABLE_FOOTNOTES);
        }
        if options.alerts {
            parser_options.insert(Options::ENABLE_GFM);
        }

        let mut builder = TreeBuilder::new(*options);
        for event in Parser::new_ext(raw, parser_options) {
            builder.push(event);
        }
        builder.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Plain,
    Heading(u8),
    Image,
    TableHead,
    TableCell,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Node the content goes into.
    inner: NodeId,
    kind: FrameKind,
}

struct TreeBuilder {
    options: ConvertOptions,
    tree: DocumentTree,
    stack: Vec<Frame>,
    headings: Vec<Heading>,
    slugger: Slugger,
    alignments: Vec<Alignment>,
    cell_index: usize,
    in_table_head: bool,
    image_alt: Option<String>,
}

impl TreeBuilder {
    fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            tree: DocumentTree::new(),
            stack: Vec::new(),
            headings: Vec::new(),
            slugger: Slugger::default(),
            alignments: Vec::new(),
            cell_index: 0,
            in_table_head: false,
            image_alt: None,
        }
    }

    fn current(&self) -> NodeId {
        self.stack.last().map_or(NodeId::ROOT, |frame| frame.inner)
    }

    fn finish(self) -> Converted {
        Converted {
            tree: self.tree,
            headings: self.headings,
        }
    }

    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => {
                let frame = self.open(tag);
                self.stack.push(frame);
            }
            Event::End(_) => {
                if let Some(frame) = self.stack.pop() {
                    self.close(frame);
                }
            }
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                let parent = self.current();
                let node = self.tree.append_element(parent, "code", Vec::new());
                self.tree.append_text(node, code.to_string());
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                let parent = self.current();
                let node = self.tree.append_element(parent, "code", vec![class("math")]);
                self.tree.append_text(node, math.to_string());
            }
            // Raw HTML is kept visible but inert.
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::FootnoteReference(label) => {
                let parent = self.current();
                let sup = self.tree.append_element(parent, "sup", vec![class("footnote-ref")]);
                let link = self.tree.append_element(
                    sup,
                    "a",
                    vec![("href".into(), format!("#fn-{label}"))],
                );
                self.tree.append_text(link, label.to_string());
            }
            Event::SoftBreak => self.text("\n"),
            Event::HardBreak => {
                let parent = self.current();
                self.tree.append_element(parent, "br", Vec::new());
            }
            Event::Rule => {
                let parent = self.current();
                self.tree.append_element(parent, "hr", Vec::new());
            }
            Event::TaskListMarker(checked) => {
                let parent = self.current();
                let mut attrs = vec![
                    ("type".to_string(), "checkbox".to_string()),
                    ("disabled".to_string(), String::new()),
                ];
                if checked {
                    attrs.push(("checked".into(), String::new()));
                }
                self.tree.append_element(parent, "input", attrs);
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(alt) = self.image_alt.as_mut() {
            alt.push_str(text);
            return;
        }
        let parent = self.current();
        self.tree.push_text(parent, text);
    }

    fn element(&mut self, tag: &str, attrs: Vec<(String, String)>) -> Frame {
        let parent = self.current();
        Frame {
            inner: self.tree.append_element(parent, tag, attrs),
            kind: FrameKind::Plain,
        }
    }

    fn open(&mut self, tag: Tag<'_>) -> Frame {
        match tag {
            Tag::Paragraph => self.element("p", Vec::new()),
            Tag::Heading { level, .. } => {
                let level = heading_level(level);
                let mut frame = self.element(&format!("h{level}"), Vec::new());
                frame.kind = FrameKind::Heading(level);
                frame
            }
            Tag::BlockQuote(Some(kind)) if self.options.alerts => {
                let (slug, title) = alert_labels(kind);
                let frame = self.element(
                    "div",
                    vec![class(&format!("markdown-alert markdown-alert-{slug}"))],
                );
                let label = vec![class("markdown-alert-title")];
                let heading = self.tree.append_element(frame.inner, "p", label);
                self.tree.append_text(heading, title);
                frame
            }
            Tag::BlockQuote(_) => self.element("blockquote", Vec::new()),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string)
                        .filter(|lang| !lang.is_empty()),
                    CodeBlockKind::Indented => None,
                };
                let pre = self.element("pre", Vec::new());
                let attrs = language
                    .map(|lang| vec![class(&format!("language-{lang}"))])
                    .unwrap_or_default();
                Frame {
                    inner: self.tree.append_element(pre.inner, "code", attrs),
                    kind: FrameKind::Plain,
                }
            }
            Tag::List(Some(start)) => {
                let attrs = if start == 1 {
                    Vec::new()
                } else {
                    vec![("start".to_string(), start.to_string())]
                };
                self.element("ol", attrs)
            }
            Tag::List(None) => self.element("ul", Vec::new()),
            Tag::Item => self.element("li", Vec::new()),
            Tag::FootnoteDefinition(label) => self.element(
                "div",
                vec![
                    class("footnote-definition"),
                    ("id".to_string(), format!("fn-{label}")),
                ],
            ),
            Tag::Table(alignments) => {
                self.alignments = alignments;
                self.element("table", Vec::new())
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.cell_index = 0;
                let head = self.element("thead", Vec::new());
                Frame {
                    inner: self.tree.append_element(head.inner, "tr", Vec::new()),
                    kind: FrameKind::TableHead,
                }
            }
            Tag::TableRow => {
                self.cell_index = 0;
                let table = self.current();
                let existing = self
                    .tree
                    .children(table)
                    .last()
                    .copied()
                    .filter(|last| self.tree.get(*last).and_then(|n| n.tag()) == Some("tbody"));
                let body = match existing {
                    Some(body) => body,
                    None => self.tree.append_element(table, "tbody", Vec::new()),
                };
                Frame {
                    inner: self.tree.append_element(body, "tr", Vec::new()),
                    kind: FrameKind::Plain,
                }
            }
            Tag::TableCell => {
                let cell = if self.in_table_head { "th" } else { "td" };
                let attrs = match self.alignments.get(self.cell_index) {
                    Some(Alignment::Left) => vec![style("text-align: left")],
                    Some(Alignment::Center) => vec![style("text-align: center")],
                    Some(Alignment::Right) => vec![style("text-align: right")],
                    _ => Vec::new(),
                };
                let mut frame = self.element(cell, attrs);
                frame.kind = FrameKind::TableCell;
                frame
            }
            Tag::Emphasis => self.element("em", Vec::new()),
            Tag::Strong => self.element("strong", Vec::new()),
            Tag::Strikethrough => self.element("del", Vec::new()),
            Tag::Link {
                dest_url, title, ..
            } => {
                let mut attrs = vec![("href".to_string(), dest_url.to_string())];
                if !title.is_empty() {
                    attrs.push(("title".into(), title.to_string()));
                }
                self.element("a", attrs)
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut attrs = vec![("src".to_string(), dest_url.to_string())];
                if !title.is_empty() {
                    attrs.push(("title".into(), title.to_string()));
                }
                self.image_alt = Some(String::new());
                let mut frame = self.element("img", attrs);
                frame.kind = FrameKind::Image;
                frame
            }
            _ => self.element("div", Vec::new()),
        }
    }

    fn close(&mut self, frame: Frame) {
        match frame.kind {
            FrameKind::Plain => {}
            FrameKind::Heading(level) => {
                let text = self.tree.text_content(frame.inner).trim().to_string();
                let id = self.slugger.slug(&text);
                if self.options.heading_ids {
                    self.tree.set_attr(frame.inner, "id", id.clone());
                }
                self.headings.push(Heading { id, text, level });
            }
            FrameKind::Image => {
                let alt = self.image_alt.take().unwrap_or_default();
                self.tree.set_attr(frame.inner, "alt", alt);
            }
            FrameKind::TableHead => self.in_table_head = false,
            FrameKind::TableCell => self.cell_index += 1,
        }
    }
}

fn class(value: &str) -> (String, String) {
    ("class".to_string(), value.to_string())
}

fn style(value: &str) -> (String, String) {
    ("style".to_string(), value.to_string())
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn alert_labels(kind: BlockQuoteKind) -> (&'static str, &'static str) {
    match kind {
        BlockQuoteKind::Note => ("note", "Note"),
        BlockQuoteKind::Tip => ("tip", "Tip"),
        BlockQuoteKind::Important => ("important", "Important"),
        BlockQuoteKind::Warning => ("warning", "Warning"),
        BlockQuoteKind::Caution => ("caution", "Caution"),
    }
}

/// GitHub-style heading slugs with per-document de-duplication.
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn slug(&mut self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let base = SLUG_STRIP.replace_all(&lowered, "").replace(' ', "-");
        let mut candidate = base.clone();
        while let Some(count) = self.seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{base}-{}", *count - 1);
        }
        self.seen.insert(candidate.clone(), 1);
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn convert(raw: &str) -> Converted {
        PulldownConverter::new().convert(raw, &ConvertOptions::default())
    }

    #[test]
    fn paragraphs_become_top_level_blocks() {
        let converted = convert("Hello world.\n\nSecond paragraph.\n");
        assert_eq!(converted.tree.blocks().len(), 2);
        assert_eq!(
            converted.markup(),
            "<p>Hello world.</p><p>Second paragraph.</p>"
        );
    }

    #[test]
    fn adjacent_text_runs_share_one_node() {
        let wrapped = convert("Hello\nworld again.\n");
        let paragraph = wrapped.tree.blocks()[0];
        let children = wrapped.tree.children(paragraph);
        assert_eq!(children.len(), 1);
        assert_eq!(
            wrapped.tree.get(children[0]).and_then(|node| node.text()),
            Some("Hello\nworld again.")
        );

        let escaped = convert("Use \\* and [x] here\n");
        let paragraph = escaped.tree.blocks()[0];
        assert_eq!(escaped.tree.children(paragraph).len(), 1);
        assert_eq!(escaped.markup(), "<p>Use * and [x] here</p>");
    }

    #[test]
    fn text_is_not_merged_across_inline_elements() {
        let converted = convert("Read *this*\ntwice\n");
        let paragraph = converted.tree.blocks()[0];
        assert_eq!(converted.tree.children(paragraph).len(), 3);
    }

    #[test]
    fn headings_get_ids_and_are_listed() {
        let converted = convert("# Getting Started\n\n## Install & Run!\n\n## Install & Run!\n");
        let ids: Vec<_> = converted.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["getting-started", "install--run", "install--run-1"]);
        assert_eq!(converted.headings[1].level, 2);
        assert!(converted.markup().starts_with("<h1 id=\"getting-started\">Getting Started</h1>"));
    }

    #[test]
    fn heading_ids_can_be_disabled() {
        let options = ConvertOptions {
            heading_ids: false,
            ..ConvertOptions::default()
        };
        let converted = PulldownConverter::new().convert("# Title\n", &options);
        assert_eq!(converted.markup(), "<h1>Title</h1>");
        assert_eq!(converted.headings[0].id, "title");
    }

    #[test]
    fn fenced_code_keeps_language_class() {
        let converted = convert("```rust\nfn main() {}\n```\n");
        assert_eq!(
            converted.markup(),
            "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>"
        );
    }

    #[test]
    fn alerts_render_as_callouts() {
        let converted = convert("> [!WARNING]\n> Mind the gap.\n");
        let markup = converted.markup();
        assert!(markup.starts_with("<div class=\"markdown-alert markdown-alert-warning\">"));
        assert!(markup.contains("<p class=\"markdown-alert-title\">Warning</p>"));
        assert!(markup.contains("Mind the gap."));
    }

    #[test]
    fn gfm_tables_and_strikethrough() {
        let converted = convert("| a | b |\n|:--|--:|\n| 1 | 2 |\n\n~~gone~~\n");
        let markup = converted.markup();
        assert!(markup.contains("<thead><tr><th style=\"text-align: left\">a</th>"));
        assert!(markup.contains("<tbody><tr><td style=\"text-align: left\">1</td>"));
        assert!(markup.contains("<td style=\"text-align: right\">2</td>"));
        assert!(markup.contains("<del>gone</del>"));
    }

    #[test]
    fn image_alt_text_is_not_part_of_the_text_content() {
        let converted = convert("See ![a diagram](d.png) here\n");
        let paragraph = converted.tree.blocks()[0];
        assert_eq!(converted.tree.text_content(paragraph), "See  here");
        assert_eq!(
            converted.markup(),
            "<p>See <img src=\"d.png\" alt=\"a diagram\"> here</p>"
        );
    }

    #[test]
    fn raw_html_is_escaped() {
        let converted = convert("<script>alert(1)</script>\n");
        assert!(converted.markup().contains("&lt;script&gt;"));
    }

    #[test]
    fn task_list_markers() {
        let converted = convert("- [x] done\n- [ ] todo\n");
        let markup = converted.markup();
        assert!(markup.contains("<input type=\"checkbox\" disabled=\"\" checked=\"\">"));
    }

    #[test]
    fn slugger_deduplicates() {
        let mut slugger = Slugger::default();
        assert_eq!(slugger.slug("Intro"), "intro");
        assert_eq!(slugger.slug("Intro"), "intro-1");
        assert_eq!(slugger.slug("Intro"), "intro-2");
        assert_eq!(slugger.slug("Héllo Wörld"), "héllo-wörld");
    }
}
