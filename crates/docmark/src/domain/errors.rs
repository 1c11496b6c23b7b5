//! Domain-specific errors.

use thiserror::Error;

use crate::domain::tree::NodeId;

/// Failure reported by whichever store backs the highlights.
pub type StoreFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Anchor and focus sit under different parents; the scheme cannot anchor such a range.
    #[error("selection spans more than one parent element")]
    DegenerateSelection,
    #[error("node {node} is not listed among its parent's children")]
    StructuralIndexNotFound { node: NodeId },
    #[error("node {node} does not belong to the document tree")]
    UnknownNode { node: NodeId },
    #[error("highlight store unavailable: {0}")]
    StoreUnavailable(#[source] StoreFailure),
}
