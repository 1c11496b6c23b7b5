//! Arena representation of a rendered document.
//!
//! Nodes live in a flat vector and refer to each other by [`NodeId`]. The root node is the fixed
//! container every structural path is measured from; its children are the document's top-level
//! blocks.

use std::fmt;

/// Identifier of a node inside a [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The container node (always 0).
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }
}

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    nodes: Vec<Node>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// Create a tree holding only the root container.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                id: NodeId::ROOT,
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Root,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Top-level blocks in document order.
    pub fn blocks(&self) -> &[NodeId] {
        self.children(NodeId::ROOT)
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: impl Into<String>,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        self.push(
            parent,
            NodeKind::Element {
                tag: tag.into(),
                attrs,
            },
        )
    }

    /// Append a new text node, even when the previous sibling is text.
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.push(parent, NodeKind::Text(text.into()))
    }

    /// Append text, extending the last child when it is already a text node.
    ///
    /// This keeps one text node per run of characters, the shape an HTML parser produces for
    /// the serialized markup.
    pub fn push_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let last = self.children(parent).last().copied();
        if let Some(last) = last
            && let Some(Node {
                kind: NodeKind::Text(existing),
                ..
            }) = self.nodes.get_mut(last.0)
        {
            existing.push_str(text);
            return last;
        }
        self.append_text(parent, text)
    }

    /// Set (or replace) an attribute on an element node.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        if let NodeKind::Element { attrs, .. } = &mut node.kind {
            let value = value.into();
            match attrs.iter_mut().find(|(key, _)| key == name) {
                Some(entry) => entry.1 = value,
                None => attrs.push((name.to_string(), value)),
            }
        }
    }

    /// Position of `id` among its parent's children.
    ///
    /// The lookup scans the parent's child list, so it returns `None` both for the root and for a
    /// node the parent does not list.
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    /// Walk from `id` up to the root, inclusive of both ends.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.get(id).map(|node| node.id), move |current| {
            self.parent(*current)
        })
    }

    /// Serialize the subtree rooted at `id`. The root container itself emits no tag.
    pub fn to_html(&self, id: NodeId) -> String {
        self.to_html_with(id, &mut |_| None)
    }

    /// Serialize like [`DocumentTree::to_html`], letting `replace` supply the markup of any
    /// node (and its subtree) instead.
    pub fn to_html_with(
        &self,
        id: NodeId,
        replace: &mut dyn FnMut(&Node) -> Option<String>,
    ) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out, replace);
        out
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        if let Some(parent_node) = self.nodes.get_mut(parent.0) {
            parent_node.children.push(id);
        }
        id
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn write_html(
        &self,
        id: NodeId,
        out: &mut String,
        replace: &mut dyn FnMut(&Node) -> Option<String>,
    ) {
        let Some(node) = self.get(id) else {
            return;
        };
        if let Some(markup) = replace(node) {
            out.push_str(&markup);
            return;
        }
        match &node.kind {
            NodeKind::Root => {
                for child in &node.children {
                    self.write_html(*child, out, replace);
                }
            }
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Element { tag, attrs } => {
                write_open_tag(tag, attrs, out);
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out, replace);
                }
                write_close_tag(tag, out);
            }
        }
    }
}

pub(crate) fn write_open_tag(tag: &str, attrs: &[(String, String)], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
    out.push('>');
}

pub(crate) fn write_close_tag(tag: &str, out: &mut String) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}
