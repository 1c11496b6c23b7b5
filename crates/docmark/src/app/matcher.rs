//! Re-applying stored highlights to a freshly rendered tree.

use serde::Serialize;

use crate::domain::model::{Highlight, HighlightId};
use crate::domain::tree::{
    DocumentTree, Node, NodeId, NodeKind, is_void_element, write_close_tag, write_open_tag,
};

/// Blocks that can carry a mark.
const MARKABLE_BLOCK: &str = "p";

/// CSS class applied to rendered marks.
pub const MARK_CLASS: &str = "highlight";

/// Owned inline content lifted out of a block so it can be split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inline {
    Text {
        text: String,
    },
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<Inline>,
    },
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text { text: text.into() }
    }

    fn from_tree(tree: &DocumentTree, id: NodeId) -> Option<Self> {
        let node = tree.get(id)?;
        match &node.kind {
            NodeKind::Text(text) => Some(Inline::text(text.clone())),
            NodeKind::Element { tag, attrs } => Some(Inline::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: inlines_of(tree, node),
            }),
            NodeKind::Root => None,
        }
    }

    fn char_len(&self) -> usize {
        match self {
            Inline::Text { text } => text.chars().count(),
            Inline::Element { children, .. } => children.iter().map(Inline::char_len).sum(),
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Inline::Text { text } => out.push_str(&html_escape::encode_text(text)),
            Inline::Element {
                tag,
                attrs,
                children,
            } => {
                write_open_tag(tag, attrs, out);
                if is_void_element(tag) {
                    return;
                }
                write_inlines(children, out);
                write_close_tag(tag, out);
            }
        }
    }
}

fn inlines_of(tree: &DocumentTree, node: &Node) -> Vec<Inline> {
    node.children
        .iter()
        .filter_map(|child| Inline::from_tree(tree, *child))
        .collect()
}

fn write_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        inline.write_html(out);
    }
}

/// A block split around one highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkedSplit {
    pub highlight: HighlightId,
    pub before: Vec<Inline>,
    pub marked: Vec<Inline>,
    pub after: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BlockContent {
    /// Rendered straight from the tree.
    Unchanged,
    Marked(MarkedSplit),
}

/// One top-level block after highlights were applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedBlock {
    pub index: usize,
    #[serde(skip)]
    pub node: NodeId,
    pub content: BlockContent,
}

impl RenderedBlock {
    /// Highlight shown in this block, if any. Clicking the mark should report this id.
    pub fn highlight(&self) -> Option<HighlightId> {
        match &self.content {
            BlockContent::Marked(split) => Some(split.highlight),
            BlockContent::Unchanged => None,
        }
    }

    /// Serialize the block. Unchanged blocks go through `replace` so callers can substitute
    /// markup for nodes such as code blocks.
    pub fn to_html_with(
        &self,
        tree: &DocumentTree,
        replace: &mut dyn FnMut(&Node) -> Option<String>,
    ) -> String {
        let split = match &self.content {
            BlockContent::Unchanged => return tree.to_html_with(self.node, replace),
            BlockContent::Marked(split) => split,
        };
        let Some(node) = tree.get(self.node) else {
            return String::new();
        };
        let (tag, attrs) = match &node.kind {
            NodeKind::Element { tag, attrs } => (tag.as_str(), attrs.as_slice()),
            _ => (MARKABLE_BLOCK, &[][..]),
        };

        let mut out = String::new();
        write_open_tag(tag, attrs, &mut out);
        write_inlines(&split.before, &mut out);
        write_open_tag(
            "mark",
            &[
                ("class".to_string(), MARK_CLASS.to_string()),
                ("data-highlight-id".to_string(), split.highlight.to_string()),
            ],
            &mut out,
        );
        write_inlines(&split.marked, &mut out);
        write_close_tag("mark", &mut out);
        write_inlines(&split.after, &mut out);
        write_close_tag(tag, &mut out);
        out
    }

    pub fn to_html(&self, tree: &DocumentTree) -> String {
        self.to_html_with(tree, &mut |_| None)
    }
}

/// Apply `highlights` to the top-level blocks of `tree`.
///
/// For the block at index `idx` the first highlight (in list order) whose path starts with
/// `idx` is used; any later ones targeting the same block are ignored. Offsets beyond the
/// block's current text are clamped, and a range that starts past the end yields no mark.
pub fn apply(tree: &DocumentTree, highlights: &[Highlight]) -> Vec<RenderedBlock> {
    tree.blocks()
        .iter()
        .enumerate()
        .map(|(index, node)| RenderedBlock {
            index,
            node: *node,
            content: highlights
                .iter()
                .find(|highlight| highlight.path.block_index() == Some(index))
                .and_then(|highlight| split_block(tree, *node, highlight))
                .map_or(BlockContent::Unchanged, BlockContent::Marked),
        })
        .collect()
}

fn split_block(tree: &DocumentTree, block: NodeId, highlight: &Highlight) -> Option<MarkedSplit> {
    let node = tree.get(block)?;
    if node.tag() != Some(MARKABLE_BLOCK) {
        tracing::debug!(
            id = %highlight.id,
            block = %block,
            "highlight targets a non-paragraph block"
        );
        return None;
    }
    let Some((start, end)) = highlight.path.mark_range() else {
        tracing::debug!(id = %highlight.id, path = %highlight.path, "highlight path too short");
        return None;
    };

    let inlines = inlines_of(tree, node);
    let len: usize = inlines.iter().map(Inline::char_len).sum();
    let (start, end) = (start.min(end), start.max(end).min(len));
    if start >= end {
        tracing::debug!(
            id = %highlight.id,
            start,
            end,
            len,
            "highlight range no longer fits the block"
        );
        return None;
    }

    Some(MarkedSplit {
        highlight: highlight.id,
        before: slice(&inlines, 0, start),
        marked: slice(&inlines, start, end),
        after: slice(&inlines, end, usize::MAX),
    })
}

/// Keep the characters in `[start, end)` of `inlines`, cloning partially covered elements.
fn slice(inlines: &[Inline], start: usize, end: usize) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut pos = 0;
    for inline in inlines {
        let len = inline.char_len();
        let (from, to) = (start.max(pos), end.min(pos + len));
        match inline {
            Inline::Text { text } => {
                if from < to {
                    let piece: String = text.chars().skip(from - pos).take(to - from).collect();
                    out.push(Inline::text(piece));
                }
            }
            Inline::Element {
                tag,
                attrs,
                children,
            } => {
                let zero_width_inside = len == 0 && start <= pos && pos < end;
                if from < to || zero_width_inside {
                    out.push(Inline::Element {
                        tag: tag.clone(),
                        attrs: attrs.clone(),
                        children: slice(
                            children,
                            start.saturating_sub(pos),
                            end.saturating_sub(pos),
                        ),
                    });
                }
            }
        }
        pos += len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::StructuralPath;
    use pretty_assertions::assert_eq;

    fn paragraphs(texts: &[&str]) -> DocumentTree {
        let mut tree = DocumentTree::new();
        for text in texts {
            let p = tree.append_element(NodeId::ROOT, "p", Vec::new());
            tree.append_text(p, *text);
        }
        tree
    }

    fn highlight(id: u64, path: &[usize]) -> Highlight {
        Highlight {
            id: HighlightId(id),
            title: "Guide".into(),
            path: StructuralPath::from(path.to_vec()),
            created_at: None,
        }
    }

    fn split_of(block: &RenderedBlock) -> &MarkedSplit {
        match &block.content {
            BlockContent::Marked(split) => split,
            BlockContent::Unchanged => panic!("block {} has no mark", block.index),
        }
    }

    #[test]
    fn marks_the_selected_range_of_a_paragraph() {
        let tree = paragraphs(&["Hello world.", "Second paragraph."]);
        let blocks = apply(&tree, &[highlight(1, &[0, 0, 0, 5])]);

        let split = split_of(&blocks[0]);
        assert_eq!(split.before, Vec::<Inline>::new());
        assert_eq!(split.marked, vec![Inline::text("Hello")]);
        assert_eq!(split.after, vec![Inline::text(" world.")]);
        assert_eq!(blocks[1].content, BlockContent::Unchanged);
        assert_eq!(
            blocks[0].to_html(&tree),
            "<p><mark class=\"highlight\" data-highlight-id=\"1\">Hello</mark> world.</p>"
        );
    }

    #[test]
    fn end_past_the_block_is_clamped() {
        let text = "Short text";
        let len = text.chars().count();
        let tree = paragraphs(&[text]);
        let blocks = apply(&tree, &[highlight(3, &[0, 0, 5, len + 10])]);

        let split = split_of(&blocks[0]);
        assert_eq!(split.before, vec![Inline::text("Short")]);
        assert_eq!(split.marked, vec![Inline::text(" text")]);
        assert!(split.after.is_empty());
    }

    #[test]
    fn start_past_the_block_leaves_it_unchanged() {
        let tree = paragraphs(&["tiny"]);
        let blocks = apply(&tree, &[highlight(1, &[0, 0, 10, 20])]);
        assert_eq!(blocks[0].content, BlockContent::Unchanged);
        assert_eq!(blocks[0].to_html(&tree), "<p>tiny</p>");
    }

    #[test]
    fn only_the_first_highlight_for_a_block_applies() {
        let tree = paragraphs(&["zero", "one", "the second block"]);
        let blocks = apply(&tree, &[highlight(7, &[2, 0, 0, 3]), highlight(8, &[2, 0, 4, 10])]);
        let split = split_of(&blocks[2]);
        assert_eq!(split.highlight, HighlightId(7));
        assert_eq!(split.marked, vec![Inline::text("the")]);
        assert_eq!(blocks[2].highlight(), Some(HighlightId(7)));
    }

    #[test]
    fn reversed_offsets_are_ordered() {
        let tree = paragraphs(&["Hello world."]);
        let blocks = apply(&tree, &[highlight(1, &[0, 0, 11, 6])]);
        assert_eq!(split_of(&blocks[0]).marked, vec![Inline::text("world")]);
    }

    #[test]
    fn split_crosses_inline_elements() {
        let mut tree = DocumentTree::new();
        let p = tree.append_element(NodeId::ROOT, "p", Vec::new());
        tree.append_text(p, "Read ");
        let em = tree.append_element(p, "em", Vec::new());
        tree.append_text(em, "very");
        tree.append_text(p, " closely");

        let blocks = apply(&tree, &[highlight(2, &[0, 0, 3, 7])]);
        assert_eq!(
            blocks[0].to_html(&tree),
            "<p>Rea<mark class=\"highlight\" data-highlight-id=\"2\">d <em>ve</em></mark>\
             <em>ry</em> closely</p>"
        );
    }

    #[test]
    fn multibyte_text_is_split_on_characters() {
        let tree = paragraphs(&["naïve café"]);
        let blocks = apply(&tree, &[highlight(1, &[0, 0, 6, 10])]);
        assert_eq!(split_of(&blocks[0]).marked, vec![Inline::text("café")]);
    }

    #[test]
    fn short_paths_and_non_paragraph_blocks_are_skipped() {
        let mut tree = paragraphs(&["text"]);
        let heading = tree.append_element(NodeId::ROOT, "h2", Vec::new());
        tree.append_text(heading, "Title");

        let blocks = apply(&tree, &[highlight(1, &[0, 0, 2]), highlight(2, &[1, 0, 0, 3])]);
        assert!(blocks.iter().all(|block| block.highlight().is_none()));
    }

    #[test]
    fn zero_width_elements_stay_with_their_segment() {
        let mut tree = DocumentTree::new();
        let p = tree.append_element(NodeId::ROOT, "p", Vec::new());
        tree.append_text(p, "ab");
        tree.append_element(p, "br", Vec::new());
        tree.append_text(p, "cd");

        let blocks = apply(&tree, &[highlight(1, &[0, 0, 1, 3])]);
        assert_eq!(
            blocks[0].to_html(&tree),
            "<p>a<mark class=\"highlight\" data-highlight-id=\"1\">b<br>c</mark>d</p>"
        );
    }
}
