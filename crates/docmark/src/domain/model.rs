//! Domain models for selections, structural paths, and highlights.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::tree::NodeId;

/// A text selection as reported by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: NodeId,
    pub focus: NodeId,
    pub anchor_offset: usize,
    pub focus_offset: usize,
}

impl SelectionRange {
    /// Selection inside a single node.
    pub fn within(node: NodeId, anchor_offset: usize, focus_offset: usize) -> Self {
        Self {
            anchor: node,
            focus: node,
            anchor_offset,
            focus_offset,
        }
    }
}

/// Child indices from the container down to the selected node, followed by the anchor and
/// focus offsets.
///
/// A path only means something against the tree shape that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralPath(Vec<usize>);

impl StructuralPath {
    pub fn new(components: Vec<usize>) -> Self {
        Self(components)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.0.get(index).copied()
    }

    pub(crate) fn prepend(&mut self, index: usize) {
        self.0.insert(0, index);
    }

    /// Index of the top-level block the path descends into.
    pub fn block_index(&self) -> Option<usize> {
        self.get(0)
    }

    /// Character range read by the matcher: components 2 and 3.
    ///
    /// For a paragraph whose text is a direct child this is exactly the anchor and focus offset
    /// pair.
    pub fn mark_range(&self) -> Option<(usize, usize)> {
        Some((self.get(2)?, self.get(3)?))
    }
}

impl From<Vec<usize>> for StructuralPath {
    fn from(value: Vec<usize>) -> Self {
        Self(value)
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, component) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{component}")?;
        }
        f.write_str("]")
    }
}

/// Store-generated identifier of a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(pub u64);

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HighlightId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(HighlightId)
    }
}

/// A persisted highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: HighlightId,
    pub title: String,
    pub path: StructuralPath,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Outcome of a completed selection or mark click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Insert(StructuralPath),
    Delete(HighlightId),
}

/// A heading extracted while converting markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub id: String,
    pub text: String,
    pub level: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_compare_by_value() {
        let a = StructuralPath::from(vec![0, 0, 0, 5]);
        let b = StructuralPath::new(vec![0, 0, 0, 5]);
        assert_eq!(a, b);
        assert_ne!(a, StructuralPath::from(vec![0, 0, 5]));
    }

    #[test]
    fn mark_range_requires_four_components() {
        assert_eq!(StructuralPath::from(vec![1, 0, 3, 9]).mark_range(), Some((3, 9)));
        assert_eq!(StructuralPath::from(vec![1, 0, 3]).mark_range(), None);
    }

    #[test]
    fn path_serializes_as_plain_array() {
        let json = serde_json::to_string(&StructuralPath::from(vec![2, 0, 1, 4])).unwrap();
        assert_eq!(json, "[2,0,1,4]");
        assert_eq!(StructuralPath::from(vec![2, 0]).to_string(), "[2, 0]");
    }
}
