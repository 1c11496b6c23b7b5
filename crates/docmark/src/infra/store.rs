//! Highlight persistence.
//!
//! The store owns the canonical collection of highlights. It hands out ids, lists highlights per
//! document title in insertion order, and deletes by id. Duplicate paths are accepted; callers
//! decide whether a path is new.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::errors::AnnotationError;
use crate::domain::model::{Highlight, HighlightId, StructuralPath};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access highlight store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid highlight data in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<StoreError> for AnnotationError {
    fn from(err: StoreError) -> Self {
        AnnotationError::StoreUnavailable(Box::new(err))
    }
}

/// Create/list/delete over the `highlights` collection.
pub trait HighlightStore: Send + Sync {
    fn insert(&self, title: &str, path: StructuralPath) -> Result<HighlightId, StoreError>;

    fn list(&self, title: &str) -> Result<Vec<Highlight>, StoreError>;

    /// Remove a highlight. Unknown ids are ignored.
    fn delete(&self, id: HighlightId) -> Result<(), StoreError>;
}

/// Serialized collection shared by both store implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct Collection {
    next_id: u64,
    highlights: Vec<Highlight>,
}

impl Collection {
    fn insert(&mut self, title: &str, path: StructuralPath) -> HighlightId {
        self.next_id += 1;
        let id = HighlightId(self.next_id);
        self.highlights.push(Highlight {
            id,
            title: title.to_string(),
            path,
            created_at: timestamp(),
        });
        id
    }

    fn list(&self, title: &str) -> Vec<Highlight> {
        self.highlights
            .iter()
            .filter(|highlight| highlight.title == title)
            .cloned()
            .collect()
    }

    fn delete(&mut self, id: HighlightId) -> bool {
        let before = self.highlights.len();
        self.highlights.retain(|highlight| highlight.id != id);
        before != self.highlights.len()
    }
}

fn timestamp() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

/// In-process store, used for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HighlightStore for MemoryStore {
    fn insert(&self, title: &str, path: StructuralPath) -> Result<HighlightId, StoreError> {
        Ok(self.inner.lock().insert(title, path))
    }

    fn list(&self, title: &str) -> Result<Vec<Highlight>, StoreError> {
        Ok(self.inner.lock().list(title))
    }

    fn delete(&self, id: HighlightId) -> Result<(), StoreError> {
        self.inner.lock().delete(id);
        Ok(())
    }
}

/// Store persisted as a JSON document on disk.
///
/// Every mutation re-reads the file, applies the change, and replaces the file through a
/// temporary sibling so readers never observe a partial write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every highlight regardless of title.
    pub fn list_all(&self) -> Result<Vec<Highlight>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.highlights)
    }

    fn load(&self) -> Result<Collection, StoreError> {
        if !self.path.exists() {
            return Ok(Collection::default());
        }
        let data = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        if data.trim().is_empty() {
            return Ok(Collection::default());
        }
        serde_json::from_str(&data).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, collection: &Collection) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let data = serde_json::to_vec_pretty(collection).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })?;
        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        temp.write_all(&data).map_err(io_err)?;
        temp.persist(&self.path)
            .map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

impl HighlightStore for JsonFileStore {
    fn insert(&self, title: &str, path: StructuralPath) -> Result<HighlightId, StoreError> {
        let _guard = self.lock.lock();
        let mut collection = self.load()?;
        let id = collection.insert(title, path);
        self.save(&collection)?;
        tracing::debug!(%id, title, "highlight stored");
        Ok(id)
    }

    fn list(&self, title: &str) -> Result<Vec<Highlight>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.list(title))
    }

    fn delete(&self, id: HighlightId) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut collection = self.load()?;
        if collection.delete(id) {
            self.save(&collection)?;
            tracing::debug!(%id, "highlight deleted");
        }
        Ok(())
    }
}
