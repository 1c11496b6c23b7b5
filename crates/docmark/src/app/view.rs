//! Read-side copy of a document's highlights.
//!
//! Queries are tagged with a ticket when issued. A result is applied only when its ticket is
//! newer than the last applied one, so a slow, superseded query can never overwrite fresher
//! data. Until the first successful query the view is empty.

use crate::domain::model::Highlight;
use crate::infra::store::{HighlightStore, StoreError};

/// Handle for an in-flight query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryTicket(u64);

#[derive(Debug, Clone, Default)]
pub struct HighlightView {
    title: String,
    highlights: Vec<Highlight>,
    issued: u64,
    applied: Option<u64>,
    last_error: Option<String>,
}

impl HighlightView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    /// Whether any query result has been applied yet.
    pub fn is_loaded(&self) -> bool {
        self.applied.is_some()
    }

    /// Message of the most recent failed query, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_query(&mut self) -> QueryTicket {
        self.issued += 1;
        QueryTicket(self.issued)
    }

    /// Apply a query result. Returns `true` when the view changed.
    pub fn complete(
        &mut self,
        ticket: QueryTicket,
        result: Result<Vec<Highlight>, StoreError>,
    ) -> bool {
        if self.applied.is_some_and(|applied| ticket.0 <= applied) {
            tracing::debug!(ticket = ticket.0, "ignoring superseded highlight query");
            return false;
        }
        match result {
            Ok(highlights) => {
                self.applied = Some(ticket.0);
                self.highlights = highlights;
                self.last_error = None;
                true
            }
            Err(err) => {
                tracing::warn!(title = %self.title, error = %err, "highlight query failed");
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Issue and complete a query against `store` in one step.
    pub fn refresh(&mut self, store: &dyn HighlightStore) -> bool {
        let ticket = self.begin_query();
        let result = store.list(&self.title);
        self.complete(ticket, result)
    }
}
