//! Search backend capability interface.
//!
//! Everything the lifecycle manager, document store and search client need
//! from a search engine goes through [`SearchBackend`]. Implementations are
//! constructed once and injected as `Arc<dyn SearchBackend>`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use tagbot_types::MatchKind;

use crate::error::BackendError;

/// Settings key carrying the write block.
pub const WRITE_BLOCK_SETTING: &str = "index.blocks.write";

/// Cluster health as reported for an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Red,
    Yellow,
    Green,
}

impl HealthStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "red" => Some(HealthStatus::Red),
            "yellow" => Some(HealthStatus::Yellow),
            "green" => Some(HealthStatus::Green),
            _ => None,
        }
    }
}

/// Backend truth about one index, read on demand and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexState {
    pub exists: bool,
    pub write_blocked: bool,
    /// Hash stamped into the index mappings when it was created
    pub schema_hash: Option<String>,
}

impl IndexState {
    pub fn missing() -> Self {
        Self::default()
    }

    /// Derive state from an index's settings and mappings.
    pub fn from_parts(settings: &Value, mappings: &Value) -> Self {
        Self {
            exists: true,
            write_blocked: is_write_blocked(settings),
            schema_hash: mappings
                .pointer("/_meta/schema_hash")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Whether an index settings object carries an active write block.
///
/// Accepts the flat (`"index.blocks.write"`) and nested
/// (`index.blocks.write`) forms, with boolean or string values.
pub fn is_write_blocked(settings: &Value) -> bool {
    let value = settings
        .get(WRITE_BLOCK_SETTING)
        .or_else(|| settings.pointer("/index/blocks/write"))
        .or_else(|| settings.pointer("/settings/index/blocks/write"))
        .or_else(|| settings.pointer(&format!("/settings/{}", WRITE_BLOCK_SETTING)));

    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Merge a settings update into stored settings using the flat key form.
pub fn merge_settings(stored: &mut Value, update: &Value) {
    let update = update.get("settings").unwrap_or(update);
    if !stored.is_object() {
        *stored = json!({});
    }
    if let (Some(stored), Some(update)) = (stored.as_object_mut(), update.as_object()) {
        for (key, value) in update {
            stored.insert(key.clone(), value.clone());
        }
    }
    if let Some(map) = stored.as_object_mut() {
        if map.contains_key(WRITE_BLOCK_SETTING) {
            // drop the nested form so the flat key is authoritative
            if let Some(index) = map.get_mut("index").and_then(Value::as_object_mut) {
                if let Some(blocks) = index.get_mut("blocks").and_then(Value::as_object_mut) {
                    blocks.remove("write");
                }
            }
        }
    }
}

/// One field predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub value: Value,
    pub kind: MatchKind,
}

impl Clause {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, kind: MatchKind) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            kind,
        }
    }

    /// Backend query DSL for this clause.
    pub fn to_dsl(&self) -> Value {
        match self.kind {
            MatchKind::Exact | MatchKind::Flag => json!({ "term": { &self.field: self.value } }),
            MatchKind::FullText => json!({
                "match": { &self.field: { "query": self.value, "operator": "and" } }
            }),
        }
    }
}

/// Sort on a numeric field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// A structured search request: filters, required and excluded clauses,
/// sort order and a page window.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Clauses every hit must satisfy, without affecting scoring
    pub filter: Vec<Clause>,
    pub must: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub sort: Option<SortKey>,
    pub from: usize,
    pub size: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            filter: Vec::new(),
            must: Vec::new(),
            must_not: Vec::new(),
            sort: None,
            from: 0,
            size: 10,
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: Clause) -> Self {
        self.filter.push(clause);
        self
    }

    pub fn must(mut self, clause: Clause) -> Self {
        self.must.push(clause);
        self
    }

    pub fn must_not(mut self, clause: Clause) -> Self {
        self.must_not.push(clause);
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(SortKey {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    /// The `bool` query part of the request.
    pub fn query_dsl(&self) -> Value {
        let dsl = |clauses: &[Clause]| clauses.iter().map(Clause::to_dsl).collect::<Vec<_>>();
        json!({
            "bool": {
                "filter": dsl(&self.filter),
                "must": dsl(&self.must),
                "must_not": dsl(&self.must_not),
            }
        })
    }

    /// Full search body including paging and sort.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query_dsl(),
            "from": self.from,
            "size": self.size,
        });
        if let Some(sort) = &self.sort {
            let order = if sort.descending { "desc" } else { "asc" };
            body["sort"] = json!([{ &sort.field: { "order": order } }]);
        }
        body
    }

    /// Body for a count request (no paging or sort).
    pub fn to_count_body(&self) -> Value {
        json!({ "query": self.query_dsl() })
    }
}

/// Operations a search engine must support.
///
/// NotFound outcomes are values, not errors: deleting a missing index or
/// document yields `Ok(false)`, reading a missing document `Ok(None)`.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn index_exists(&self, index: &str) -> Result<bool, BackendError>;

    async fn index_state(&self, index: &str) -> Result<IndexState, BackendError>;

    /// Apply an index settings update.
    async fn put_settings(&self, index: &str, settings: &Value) -> Result<(), BackendError>;

    /// Copy `source` into a new index `target`. The source must be
    /// write-blocked; the target inherits its settings.
    async fn clone_index(&self, source: &str, target: &str) -> Result<(), BackendError>;

    /// Wait until `index` is at least yellow. Expiry is
    /// [`BackendError::Timeout`].
    async fn wait_for_health(
        &self,
        index: &str,
        timeout: Duration,
    ) -> Result<HealthStatus, BackendError>;

    async fn delete_index(&self, index: &str) -> Result<bool, BackendError>;

    /// Create an index from a `{settings, mappings}` document.
    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), BackendError>;

    /// Copy every document of `source` into `dest`. Returns the number copied.
    async fn reindex(&self, source: &str, dest: &str) -> Result<u64, BackendError>;

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, BackendError>;

    /// Create or replace a document. Visible to searches on return.
    async fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), BackendError>;

    /// Merge top-level fields into an existing document.
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<bool, BackendError>;

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, BackendError>;

    async fn search(&self, index: &str, request: &SearchRequest)
        -> Result<Vec<Value>, BackendError>;

    async fn count(&self, index: &str, request: &SearchRequest) -> Result<u64, BackendError>;

    /// Set the write block on an index.
    async fn block_writes(&self, index: &str) -> Result<(), BackendError> {
        self.put_settings(index, &json!({ WRITE_BLOCK_SETTING: true }))
            .await
    }
}
