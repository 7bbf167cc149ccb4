//! File-backed order spool with write-through to the secondary index.
//!
//! The spool is a directory on disk holding one `<id>.xml` document per
//! order. Documents are the source of truth; the index only mirrors them.
//! Every save persists the document first and reflects it into the index
//! second, so the index may briefly lag behind. `reindex()` repairs drift.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, warn};

use crate::error::{Error, OrderError};
use crate::order::{ORDER_FILE_EXTENSION, OrderDocument, OrderRecord};
use crate::store::OrderIndex;

/// A directory of order documents mirrored into an [`OrderIndex`].
pub struct Spool {
    base_path: PathBuf,
    index: Arc<dyn OrderIndex>,
}

impl Spool {
    /// Create a spool rooted at `base_path`.
    pub fn new(base_path: PathBuf, index: Arc<dyn OrderIndex>) -> Self {
        Self { base_path, index }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn index(&self) -> &Arc<dyn OrderIndex> {
        &self.index
    }

    /// Path of the document for order `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.{ORDER_FILE_EXTENSION}"))
    }

    /// Ensure the spool directory exists.
    pub async fn ensure_dirs(&self) -> Result<(), OrderError> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Persist `doc` into the spool, then reflect it into the index.
    ///
    /// The document must name a service and its id must be a plain file
    /// name inside the spool. A failed persist leaves the index untouched.
    pub async fn save(&self, doc: &OrderDocument) -> Result<(), Error> {
        if !doc.is_valid() {
            return Err(
                OrderError::Malformed(format!("order {} has no service name", doc.id())).into(),
            );
        }
        let path = self.checked_path(doc.id()).map_err(|_| {
            OrderError::Malformed(format!("order id {:?} is not a spool file name", doc.id()))
        })?;
        let owned = doc.clone();
        blocking(move || owned.persist(&path)).await?;
        self.index.upsert_order(&OrderRecord::from(doc)).await?;
        info!(order_id = %doc.id(), service = %doc.service(), status = %doc.status(), "Order saved");
        Ok(())
    }

    /// Load the document for order `id`.
    ///
    /// A document whose `id` attribute names a different order is malformed.
    pub async fn load(&self, id: &str) -> Result<OrderDocument, OrderError> {
        let path = self.checked_path(id)?;
        if !fs::try_exists(&path).await? {
            return Err(OrderError::FileNotFound(id.to_string()));
        }
        let doc = blocking(move || OrderDocument::load(&path)).await?;
        if doc.id() != id {
            return Err(OrderError::Malformed(format!(
                "{id}.{ORDER_FILE_EXTENSION} carries id {:?}",
                doc.id()
            )));
        }
        Ok(doc)
    }

    /// Ids of all documents in the spool, sorted. Temporary files are skipped.
    pub async fn list(&self) -> Result<Vec<String>, OrderError> {
        if !fs::try_exists(&self.base_path).await? {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut read_dir = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let is_document = entry.file_type().await?.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(ORDER_FILE_EXTENSION);
            if !is_document {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && !stem.starts_with('.')
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Reflect every spooled document into the index again.
    ///
    /// Unreadable documents are logged and skipped. Returns how many orders
    /// were indexed.
    pub async fn reindex(&self) -> Result<usize, Error> {
        let mut indexed = 0;
        for id in self.list().await? {
            let doc = match self.load(&id).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(order_id = %id, error = %e, "Skipping unreadable order");
                    continue;
                }
            };
            self.index.upsert_order(&OrderRecord::from(&doc)).await?;
            indexed += 1;
        }
        info!(indexed, "Spool reindexed");
        Ok(indexed)
    }

    /// Delete the document for `id` and drop it from the index.
    pub async fn remove(&self, id: &str) -> Result<(), Error> {
        let path = self.checked_path(id)?;
        let had_file = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(OrderError::Io(e).into()),
        };
        let had_row = self.index.delete_order(id).await?;
        if !had_file && !had_row {
            return Err(OrderError::FileNotFound(id.to_string()).into());
        }
        info!(order_id = %id, "Order removed");
        Ok(())
    }

    /// Reject ids that would escape the spool or name a temporary file.
    fn checked_path(&self, id: &str) -> Result<PathBuf, OrderError> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return Err(OrderError::FileNotFound(id.to_string()));
        }
        Ok(self.path_for(id))
    }
}

/// Run blocking file work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, OrderError>
where
    F: FnOnce() -> Result<T, OrderError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OrderError::Io(std::io::Error::other(e)))?
}
