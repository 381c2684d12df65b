//! In-memory search backend.
//!
//! Behaves like a single-node cluster closely enough to exercise the
//! lifecycle manager and the search client without a server, and records
//! every call so tests can assert exactly which operations were issued.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use tagbot_types::MatchKind;

use crate::backend::{
    is_write_blocked, merge_settings, Clause, HealthStatus, IndexState, SearchBackend,
    SearchRequest,
};
use crate::error::BackendError;

/// A backend operation, as recorded by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    IndexExists(String),
    IndexState(String),
    PutSettings(String),
    Clone { source: String, target: String },
    WaitForHealth(String),
    DeleteIndex(String),
    CreateIndex(String),
    Reindex { source: String, dest: String },
    GetDocument(String, String),
    PutDocument(String, String),
    UpdateDocument(String, String),
    DeleteDocument(String, String),
    Search(String),
    Count(String),
}

impl BackendCall {
    /// Whether the call changes index or document state.
    pub fn is_mutation(&self) -> bool {
        match self {
            BackendCall::PutSettings(_)
            | BackendCall::Clone { .. }
            | BackendCall::DeleteIndex(_)
            | BackendCall::CreateIndex(_)
            | BackendCall::Reindex { .. }
            | BackendCall::PutDocument(..)
            | BackendCall::UpdateDocument(..)
            | BackendCall::DeleteDocument(..) => true,
            BackendCall::IndexExists(_)
            | BackendCall::IndexState(_)
            | BackendCall::WaitForHealth(_)
            | BackendCall::GetDocument(..)
            | BackendCall::Search(_)
            | BackendCall::Count(_) => false,
        }
    }

    /// The index the call targets (the source for clone and reindex).
    pub fn index(&self) -> &str {
        match self {
            BackendCall::IndexExists(i)
            | BackendCall::IndexState(i)
            | BackendCall::PutSettings(i)
            | BackendCall::WaitForHealth(i)
            | BackendCall::DeleteIndex(i)
            | BackendCall::CreateIndex(i)
            | BackendCall::GetDocument(i, _)
            | BackendCall::PutDocument(i, _)
            | BackendCall::UpdateDocument(i, _)
            | BackendCall::DeleteDocument(i, _)
            | BackendCall::Search(i)
            | BackendCall::Count(i) => i,
            BackendCall::Clone { source, .. } => source,
            BackendCall::Reindex { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryIndex {
    settings: Value,
    mappings: Value,
    docs: BTreeMap<String, Value>,
}

impl MemoryIndex {
    fn state(&self) -> IndexState {
        IndexState::from_parts(&self.settings, &self.mappings)
    }

    fn check_writable(&self, index: &str) -> Result<(), BackendError> {
        if is_write_blocked(&self.settings) {
            return Err(BackendError::WriteBlocked(index.to_string()));
        }
        Ok(())
    }
}

/// Backend keeping every index in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    indices: Mutex<HashMap<String, MemoryIndex>>,
    calls: Mutex<Vec<BackendCall>>,
    stall_health: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every health wait time out, as a stuck clone would.
    pub fn stall_health_checks(&self, stall: bool) {
        self.stall_health.store(stall, Ordering::SeqCst);
    }

    /// Every call issued so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn mutation_calls(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(BackendCall::is_mutation)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Raw documents of an index, keyed by id.
    pub fn documents(&self, index: &str) -> BTreeMap<String, Value> {
        self.lock()
            .get(index)
            .map(|i| i.docs.clone())
            .unwrap_or_default()
    }

    /// Current settings of an index.
    pub fn settings(&self, index: &str) -> Option<Value> {
        self.lock().get(index).map(|i| i.settings.clone())
    }

    fn record(&self, call: BackendCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryIndex>> {
        self.indices.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn matching(&self, index: &str, request: &SearchRequest) -> Result<Vec<Value>, BackendError> {
        let indices = self.lock();
        let idx = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexMissing(index.to_string()))?;

        let mut hits: Vec<(&String, &Value)> = idx
            .docs
            .iter()
            .filter(|(_, doc)| {
                request.filter.iter().all(|c| clause_matches(c, doc))
                    && request.must.iter().all(|c| clause_matches(c, doc))
                    && !request.must_not.iter().any(|c| clause_matches(c, doc))
            })
            .collect();

        if let Some(sort) = &request.sort {
            hits.sort_by(|(ka, a), (kb, b)| {
                let va = a.get(&sort.field).and_then(Value::as_i64).unwrap_or(0);
                let vb = b.get(&sort.field).and_then(Value::as_i64).unwrap_or(0);
                let ord = if sort.descending { vb.cmp(&va) } else { va.cmp(&vb) };
                ord.then_with(|| ka.cmp(kb))
            });
        }

        Ok(hits.into_iter().map(|(_, doc)| doc.clone()).collect())
    }
}

fn clause_matches(clause: &Clause, doc: &Value) -> bool {
    let Some(stored) = doc.get(&clause.field) else {
        return false;
    };
    let candidates: Vec<&Value> = match stored {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    candidates.into_iter().any(|candidate| match clause.kind {
        MatchKind::Exact | MatchKind::Flag => values_equal(candidate, &clause.value),
        MatchKind::FullText => match (candidate.as_str(), clause.value.as_str()) {
            (Some(text), Some(query)) => {
                let words = tokenize(text);
                tokenize(query).iter().all(|w| words.contains(w))
            }
            _ => false,
        },
    })
}

fn values_equal(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
        (Value::Number(a), Value::Number(b)) => a.as_i64() == b.as_i64(),
        (a, b) => a == b,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        self.record(BackendCall::IndexExists(index.to_string()));
        Ok(self.lock().contains_key(index))
    }

    async fn index_state(&self, index: &str) -> Result<IndexState, BackendError> {
        self.record(BackendCall::IndexState(index.to_string()));
        Ok(self
            .lock()
            .get(index)
            .map(MemoryIndex::state)
            .unwrap_or_else(IndexState::missing))
    }

    async fn put_settings(&self, index: &str, settings: &Value) -> Result<(), BackendError> {
        self.record(BackendCall::PutSettings(index.to_string()));
        let mut indices = self.lock();
        let idx = indices
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexMissing(index.to_string()))?;
        merge_settings(&mut idx.settings, settings);
        Ok(())
    }

    async fn clone_index(&self, source: &str, target: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Clone {
            source: source.to_string(),
            target: target.to_string(),
        });
        let mut indices = self.lock();
        if indices.contains_key(target) {
            return Err(BackendError::IndexExists(target.to_string()));
        }
        let src = indices
            .get(source)
            .ok_or_else(|| BackendError::IndexMissing(source.to_string()))?;
        if !is_write_blocked(&src.settings) {
            return Err(BackendError::InvalidState(format!(
                "{} must be write-blocked before cloning",
                source
            )));
        }
        let copy = src.clone();
        indices.insert(target.to_string(), copy);
        Ok(())
    }

    async fn wait_for_health(
        &self,
        index: &str,
        timeout: Duration,
    ) -> Result<HealthStatus, BackendError> {
        self.record(BackendCall::WaitForHealth(index.to_string()));
        if self.stall_health.load(Ordering::SeqCst) || !self.lock().contains_key(index) {
            return Err(BackendError::Timeout(format!(
                "{} not yellow after {}s",
                index,
                timeout.as_secs()
            )));
        }
        Ok(HealthStatus::Green)
    }

    async fn delete_index(&self, index: &str) -> Result<bool, BackendError> {
        self.record(BackendCall::DeleteIndex(index.to_string()));
        Ok(self.lock().remove(index).is_some())
    }

    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), BackendError> {
        self.record(BackendCall::CreateIndex(index.to_string()));
        let mut indices = self.lock();
        if indices.contains_key(index) {
            return Err(BackendError::IndexExists(index.to_string()));
        }
        indices.insert(
            index.to_string(),
            MemoryIndex {
                settings: schema.get("settings").cloned().unwrap_or_default(),
                mappings: schema.get("mappings").cloned().unwrap_or_default(),
                docs: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<u64, BackendError> {
        self.record(BackendCall::Reindex {
            source: source.to_string(),
            dest: dest.to_string(),
        });
        let mut indices = self.lock();
        let docs = indices
            .get(source)
            .ok_or_else(|| BackendError::IndexMissing(source.to_string()))?
            .docs
            .clone();
        let target = indices
            .get_mut(dest)
            .ok_or_else(|| BackendError::IndexMissing(dest.to_string()))?;
        target.check_writable(dest)?;

        let count = docs.len() as u64;
        target.docs.extend(docs);
        Ok(count)
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, BackendError> {
        self.record(BackendCall::GetDocument(index.to_string(), id.to_string()));
        Ok(self
            .lock()
            .get(index)
            .and_then(|i| i.docs.get(id).cloned()))
    }

    async fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), BackendError> {
        self.record(BackendCall::PutDocument(index.to_string(), id.to_string()));
        let mut indices = self.lock();
        let idx = indices
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexMissing(index.to_string()))?;
        idx.check_writable(index)?;
        idx.docs.insert(id.to_string(), doc.clone());
        Ok(())
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<bool, BackendError> {
        self.record(BackendCall::UpdateDocument(index.to_string(), id.to_string()));
        let mut indices = self.lock();
        let idx = indices
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexMissing(index.to_string()))?;
        idx.check_writable(index)?;

        let Some(Value::Object(doc)) = idx.docs.get_mut(id) else {
            return Ok(false);
        };
        if let Some(fields) = partial.as_object() {
            for (key, value) in fields {
                doc.insert(key.clone(), value.clone());
            }
        }
        Ok(true)
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, BackendError> {
        self.record(BackendCall::DeleteDocument(index.to_string(), id.to_string()));
        let mut indices = self.lock();
        let Some(idx) = indices.get_mut(index) else {
            return Ok(false);
        };
        idx.check_writable(index)?;
        Ok(idx.docs.remove(id).is_some())
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Value>, BackendError> {
        self.record(BackendCall::Search(index.to_string()));
        let hits = self.matching(index, request)?;
        Ok(hits
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .collect())
    }

    async fn count(&self, index: &str, request: &SearchRequest) -> Result<u64, BackendError> {
        self.record(BackendCall::Count(index.to_string()));
        Ok(self.matching(index, request)?.len() as u64)
    }
}
