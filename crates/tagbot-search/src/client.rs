//! Owner-scoped search over tagged documents.
//!
//! Translates a [`ParsedQuery`] into a [`SearchRequest`] against the main
//! index. Every request carries an owner filter, results are ordered by
//! `last_used` descending, and paging is a plain page counter.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use tagbot_query::ParsedQuery;
use tagbot_types::{BoundedCache, Field, MatchKind, MediaKind, TaggedDocument};

use crate::backend::{Clause, SearchBackend, SearchRequest};
use crate::error::BackendError;
use crate::store::{owner_clause, DocumentStore};

/// Default number of results per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Default capacity of the per-owner last query cache.
pub const DEFAULT_HISTORY_CAPACITY: usize = 128;

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub documents: Vec<TaggedDocument>,
    /// Offset to request next, None when this was the last page
    pub next_offset: Option<usize>,
    /// Kind the results are presented as, taken from the first `type:` value
    pub result_kind: Option<MediaKind>,
    /// Whether the results are presented as a gallery grid
    pub gallery: bool,
}

/// Most recent raw query text per owner.
///
/// When opened on a file, every update is written through so the history
/// survives restarts. The file lists entries least recently used first.
pub struct QueryHistory {
    cache: BoundedCache<i64, String>,
    path: Option<PathBuf>,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: BoundedCache::new(capacity),
            path: None,
        }
    }

    /// Load the history kept at `path`. A missing file is an empty history.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, BackendError> {
        let path = path.into();
        let cache = BoundedCache::new(capacity);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let entries: Vec<(i64, String)> = serde_json::from_str(&text)?;
                for (owner, query) in entries {
                    cache.insert(owner, query);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(path = %path.display(), entries = cache.len(), "Loaded query history");
        Ok(Self {
            cache,
            path: Some(path),
        })
    }

    pub fn remember(&self, owner: i64, text: &str) -> Result<(), BackendError> {
        self.cache.insert(owner, text.to_string());
        self.persist()
    }

    pub fn last_query(&self, owner: i64) -> Option<String> {
        self.cache.get(&owner)
    }

    fn persist(&self) -> Result<(), BackendError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut entries = self.cache.entries();
        entries.reverse();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&entries)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Search client for the main index.
pub struct SearchIndexClient {
    store: DocumentStore,
    page_size: usize,
    history: QueryHistory,
}

impl SearchIndexClient {
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>) -> Self {
        Self {
            store: DocumentStore::new(backend, index),
            page_size: DEFAULT_PAGE_SIZE,
            history: QueryHistory::new(DEFAULT_HISTORY_CAPACITY),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_history(mut self, history: QueryHistory) -> Self {
        self.history = history;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    /// Build the backend request for one page of an owner's query.
    pub fn build_request(&self, owner: i64, query: &ParsedQuery, offset: usize) -> SearchRequest {
        let mut request = SearchRequest::new().filter(owner_clause(owner));

        for (field, negated, values) in query.iter() {
            for value in values {
                let Some(clause) = predicate_clause(field, value) else {
                    debug!(field = %field, value = %value, "Skipping unusable predicate");
                    continue;
                };
                request = if negated {
                    request.must_not(clause)
                } else {
                    request.must(clause)
                };
            }
        }

        request
            .sort_desc("last_used")
            .page(offset.saturating_mul(self.page_size), self.page_size)
    }

    /// Run one page of an owner's query.
    pub async fn search(
        &self,
        owner: i64,
        query: &ParsedQuery,
        offset: usize,
    ) -> Result<SearchPage, BackendError> {
        let request = self.build_request(owner, query, offset);
        let hits = self
            .store
            .backend()
            .search(self.store.index(), &request)
            .await?;

        let mut documents = Vec::with_capacity(hits.len());
        for hit in hits {
            let doc = TaggedDocument::from_value(hit)?;
            if doc.owner != owner {
                warn!(owner, stored_owner = doc.owner, "Dropping foreign search hit");
                continue;
            }
            documents.push(doc);
        }

        let next_offset = (request.size > 0 && documents.len() >= request.size).then_some(offset + 1);
        // inline audio only plays audio/mpeg, so audio results are shown as files
        let result_kind = query
            .get_first(Field::Type, false)
            .and_then(MediaKind::parse)
            .map(|kind| kind.search_kind());
        debug!(
            owner,
            offset,
            results = documents.len(),
            more = next_offset.is_some(),
            "Search page"
        );
        Ok(SearchPage {
            documents,
            next_offset,
            result_kind,
            gallery: result_kind.is_some_and(|kind| kind.is_gallery()),
        })
    }

    /// Record that the owner picked a result, bumping its recency.
    ///
    /// Returns false when the owner has no document for that media.
    pub async fn record_selection(&self, owner: i64, id: i64) -> Result<bool, BackendError> {
        let now = chrono::Utc::now().timestamp();
        let found = self.store.touch(owner, id, now).await?;
        if !found {
            debug!(owner, id, "Selected media has no document");
        }
        Ok(found)
    }
}

/// Clause for one query value, or None when the value cannot match anything.
fn predicate_clause(field: Field, value: &str) -> Option<Clause> {
    match field {
        Field::Type => {
            let kind = MediaKind::parse(value)?;
            Some(Clause::new(field.name(), kind.as_str(), MatchKind::Exact))
        }
        Field::IsAnimated => {
            let flag = match value {
                "true" => true,
                "false" => false,
                _ => return None,
            };
            Some(Clause::new(field.name(), Value::Bool(flag), MatchKind::Flag))
        }
        _ => Some(Clause::new(field.name(), value, field.match_kind())),
    }
}
