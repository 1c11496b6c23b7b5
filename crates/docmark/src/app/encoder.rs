//! Turning a live selection into a structural path.

use crate::domain::errors::AnnotationError;
use crate::domain::model::{SelectionRange, StructuralPath};
use crate::domain::tree::{DocumentTree, NodeId};

/// Encode `selection` relative to `root`.
///
/// The path starts as `[anchor_offset, focus_offset]`; walking from the anchor node up to
/// `root`, each node's position among its parent's children is prepended. Selections whose
/// endpoints have different parents are rejected, as is any node the walk cannot place.
pub fn encode(
    selection: &SelectionRange,
    tree: &DocumentTree,
    root: NodeId,
) -> Result<StructuralPath, AnnotationError> {
    for node in [selection.anchor, selection.focus] {
        if tree.get(node).is_none() {
            return Err(AnnotationError::UnknownNode { node });
        }
    }

    if tree.parent(selection.anchor) != tree.parent(selection.focus) {
        return Err(AnnotationError::DegenerateSelection);
    }

    let mut path = StructuralPath::new(vec![selection.anchor_offset, selection.focus_offset]);
    let mut current = selection.anchor;
    while current != root {
        let Some(index) = tree.child_index(current) else {
            tracing::warn!(
                node = %current,
                parent = ?tree.parent(current),
                "node not found among its parent's children"
            );
            return Err(AnnotationError::StructuralIndexNotFound { node: current });
        };
        path.prepend(index);
        // child_index only succeeds when a parent exists
        current = tree
            .parent(current)
            .ok_or(AnnotationError::StructuralIndexNotFound { node: current })?;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(paragraphs: &[&str]) -> (DocumentTree, Vec<NodeId>) {
        let mut tree = DocumentTree::new();
        let mut texts = Vec::new();
        for text in paragraphs {
            let p = tree.append_element(NodeId::ROOT, "p", Vec::new());
            texts.push(tree.append_text(p, *text));
        }
        (tree, texts)
    }

    #[test]
    fn paragraph_text_encodes_block_child_and_offsets() {
        let (tree, texts) = document(&["Hello world.", "Second paragraph."]);
        let selection = SelectionRange::within(texts[0], 0, 5);
        let path = encode(&selection, &tree, NodeId::ROOT).unwrap();
        assert_eq!(path.as_slice(), &[0, 0, 0, 5]);

        let selection = SelectionRange::within(texts[1], 7, 16);
        let path = encode(&selection, &tree, NodeId::ROOT).unwrap();
        assert_eq!(path.as_slice(), &[1, 0, 7, 16]);
    }

    #[test]
    fn nested_inline_adds_a_component_per_level() {
        let mut tree = DocumentTree::new();
        tree.append_element(NodeId::ROOT, "h2", Vec::new());
        let p = tree.append_element(NodeId::ROOT, "p", Vec::new());
        tree.append_text(p, "Read ");
        let strong = tree.append_element(p, "strong", Vec::new());
        let text = tree.append_text(strong, "carefully");

        let path = encode(&SelectionRange::within(text, 2, 6), &tree, NodeId::ROOT).unwrap();
        assert_eq!(path.as_slice(), &[1, 1, 0, 2, 6]);
    }

    #[test]
    fn endpoints_under_different_parents_are_degenerate() {
        let (tree, texts) = document(&["one", "two", "three"]);
        for (anchor, focus) in [(0, 1), (1, 2), (2, 0)] {
            let selection = SelectionRange {
                anchor: texts[anchor],
                focus: texts[focus],
                anchor_offset: 0,
                focus_offset: 2,
            };
            assert!(matches!(
                encode(&selection, &tree, NodeId::ROOT),
                Err(AnnotationError::DegenerateSelection)
            ));
        }
    }

    #[test]
    fn siblings_share_a_parent_and_encode_from_the_anchor() {
        let mut tree = DocumentTree::new();
        let p = tree.append_element(NodeId::ROOT, "p", Vec::new());
        let first = tree.append_text(p, "alpha ");
        let second = tree.append_text(p, "beta");
        let selection = SelectionRange {
            anchor: first,
            focus: second,
            anchor_offset: 1,
            focus_offset: 3,
        };
        let path = encode(&selection, &tree, NodeId::ROOT).unwrap();
        assert_eq!(path.as_slice(), &[0, 0, 1, 3]);
    }

    #[test]
    fn encoding_is_deterministic() {
        let (tree, texts) = document(&["Hello world."]);
        let selection = SelectionRange::within(texts[0], 3, 8);
        let first = encode(&selection, &tree, NodeId::ROOT).unwrap();
        let second = encode(&selection, &tree, NodeId::ROOT).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn node_outside_the_container_is_not_found() {
        let mut tree = DocumentTree::new();
        let container = tree.append_element(NodeId::ROOT, "article", Vec::new());
        let aside = tree.append_element(NodeId::ROOT, "aside", Vec::new());
        let text = tree.append_text(aside, "margin note");

        let result = encode(&SelectionRange::within(text, 0, 3), &tree, container);
        assert!(matches!(
            result,
            Err(AnnotationError::StructuralIndexNotFound { node }) if node == NodeId::ROOT
        ));
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        let (tree, _) = document(&["Hello"]);
        let selection = SelectionRange::within(NodeId(40), 0, 1);
        assert!(matches!(
            encode(&selection, &tree, NodeId::ROOT),
            Err(AnnotationError::UnknownNode { .. })
        ));
    }
}
