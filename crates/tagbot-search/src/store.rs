//! Owner-scoped document storage on top of a search backend.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use tagbot_types::{MatchKind, TaggedDocument};

use crate::backend::{Clause, SearchBackend, SearchRequest};
use crate::error::BackendError;

/// Reads and writes [`TaggedDocument`]s, keyed by `(owner, media id)`.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

/// Clause restricting a request to one owner's documents.
pub fn owner_clause(owner: i64) -> Clause {
    Clause::new("owner", owner, MatchKind::Exact)
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub async fn get(&self, owner: i64, id: i64) -> Result<Option<TaggedDocument>, BackendError> {
        let key = TaggedDocument::key_for(owner, id);
        let Some(value) = self.backend.get_document(&self.index, &key).await? else {
            return Ok(None);
        };
        let doc = TaggedDocument::from_value(value)?;
        if doc.owner != owner {
            warn!(key = %key, stored_owner = doc.owner, "Document key does not match its owner");
            return Ok(None);
        }
        Ok(Some(doc))
    }

    /// Create or replace a document.
    pub async fn put(&self, doc: &TaggedDocument) -> Result<(), BackendError> {
        debug!(owner = doc.owner, id = doc.id, tags = doc.tags.len(), "Storing document");
        self.backend
            .put_document(&self.index, &doc.key(), &doc.to_value()?)
            .await
    }

    /// Returns false when the owner had no document for this media.
    pub async fn delete(&self, owner: i64, id: i64) -> Result<bool, BackendError> {
        self.backend
            .delete_document(&self.index, &TaggedDocument::key_for(owner, id))
            .await
    }

    /// Number of documents an owner has.
    pub async fn count_for_owner(&self, owner: i64) -> Result<u64, BackendError> {
        let request = SearchRequest::new().filter(owner_clause(owner));
        self.backend.count(&self.index, &request).await
    }

    /// Stamp `last_used` on an existing document.
    pub async fn touch(&self, owner: i64, id: i64, now: i64) -> Result<bool, BackendError> {
        let key = TaggedDocument::key_for(owner, id);
        self.backend
            .update_document(&self.index, &key, &json!({ "last_used": now }))
            .await
    }
}
