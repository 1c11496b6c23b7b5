//! Toggle orchestration for completed selections and mark clicks.

use crate::app::encoder;
use crate::app::view::HighlightView;
use crate::domain::errors::AnnotationError;
use crate::domain::model::{Action, Highlight, HighlightId, SelectionRange, StructuralPath};
use crate::domain::tree::{DocumentTree, NodeId};
use crate::infra::store::HighlightStore;

/// Events delivered by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationEvent {
    SelectionCompleted(SelectionRange),
    MarkClicked(HighlightId),
}

/// What happened after an event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Inserted {
        id: HighlightId,
        path: StructuralPath,
    },
    Deleted(HighlightId),
}

/// Decide how a completed selection toggles the document's highlights.
///
/// An existing highlight with an identical path is removed. Otherwise a new highlight is
/// created only when component 1 of the path is zero, which for paragraph text means the
/// selection sits in the block's first inline child.
pub fn decide(
    selection: &SelectionRange,
    tree: &DocumentTree,
    root: NodeId,
    existing: &[Highlight],
) -> Action {
    let path = match encoder::encode(selection, tree, root) {
        Ok(path) => path,
        Err(AnnotationError::DegenerateSelection) => return Action::None,
        Err(err) => {
            tracing::debug!(error = %err, "selection could not be encoded");
            return Action::None;
        }
    };

    if let Some(found) = find_matching(existing, &path) {
        return Action::Delete(found.id);
    }

    if !path.is_empty() && path.get(1) == Some(0) {
        return Action::Insert(path);
    }

    Action::None
}

/// First highlight whose path equals `path` component by component.
pub fn find_matching<'a>(
    existing: &'a [Highlight],
    path: &StructuralPath,
) -> Option<&'a Highlight> {
    existing.iter().find(|highlight| highlight.path == *path)
}

/// Applies toggle actions for one document against a store.
pub struct AnnotationController<'a> {
    store: &'a dyn HighlightStore,
    view: HighlightView,
}

impl<'a> AnnotationController<'a> {
    /// Create a controller and load the document's current highlights.
    ///
    /// A store that cannot be read leaves the view empty; the document still renders.
    pub fn new(store: &'a dyn HighlightStore, title: impl Into<String>) -> Self {
        let mut view = HighlightView::new(title);
        view.refresh(store);
        Self { store, view }
    }

    pub fn title(&self) -> &str {
        self.view.title()
    }

    pub fn view(&self) -> &HighlightView {
        &self.view
    }

    pub fn highlights(&self) -> &[Highlight] {
        self.view.highlights()
    }

    /// Re-read the store, e.g. when the user asks to retry after a failure.
    pub fn refresh(&mut self) -> bool {
        self.view.refresh(self.store)
    }

    /// Handle one event. The tree is the rendering the selection was made in.
    pub fn handle(
        &mut self,
        event: AnnotationEvent,
        tree: &DocumentTree,
    ) -> Result<Outcome, AnnotationError> {
        let action = match event {
            AnnotationEvent::SelectionCompleted(selection) => {
                decide(&selection, tree, tree.root(), self.view.highlights())
            }
            AnnotationEvent::MarkClicked(id) => Action::Delete(id),
        };
        self.apply(action)
    }

    fn apply(&mut self, action: Action) -> Result<Outcome, AnnotationError> {
        let outcome = match action {
            Action::None => return Ok(Outcome::Ignored),
            Action::Insert(path) => {
                let id = self
                    .store
                    .insert(self.view.title(), path.clone())
                    .inspect_err(|err| tracing::warn!(error = %err, "failed to store highlight"))?;
                tracing::info!(%id, %path, title = %self.view.title(), "highlight added");
                Outcome::Inserted { id, path }
            }
            Action::Delete(id) => {
                self.store
                    .delete(id)
                    .inspect_err(|err| tracing::warn!(error = %err, "failed to delete highlight"))?;
                tracing::info!(%id, title = %self.view.title(), "highlight removed");
                Outcome::Deleted(id)
            }
        };
        self.view.refresh(self.store);
        Ok(outcome)
    }
}
