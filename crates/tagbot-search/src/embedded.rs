//! Embedded search backend on Tantivy.
//!
//! Each index lives in its own directory under the backend root:
//!
//! ```text
//! <root>/<index>/index-meta.json   settings + mappings (write block lives here)
//! <root>/<index>/data/             Tantivy index files
//! ```
//!
//! The Tantivy schema is derived from `mappings.properties`. The original
//! JSON of every document is kept in a stored `_source` field so reads
//! return exactly what was written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field as IndexField, IndexRecordOption, Schema, TextOptions, Value as _, FAST, INDEXED,
    STORED, STRING, TEXT,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, Order, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use tagbot_types::MatchKind;

use crate::backend::{
    is_write_blocked, merge_settings, Clause, HealthStatus, IndexState, SearchBackend,
    SearchRequest,
};
use crate::error::BackendError;
use crate::schema::{mapped_fields, MappedType};

const META_FILE: &str = "index-meta.json";
const DATA_DIR: &str = "data";
const ID_FIELD: &str = "_id";
const SOURCE_FIELD: &str = "_source";

/// Tantivy refuses writer budgets below this per thread.
const MIN_WRITER_MEMORY_MB: usize = 15;

/// Embedded backend configuration
#[derive(Debug, Clone)]
pub struct EmbeddedConfig {
    /// Directory holding one subdirectory per index
    pub root: PathBuf,
    /// Memory budget for writers in MB
    pub writer_memory_mb: usize,
}

impl EmbeddedConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer_memory_mb: 50,
        }
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexMeta {
    settings: Value,
    mappings: Value,
}

/// Open Tantivy handles for one index.
struct OpenIndex {
    index: Index,
    reader: IndexReader,
    id: IndexField,
    source: IndexField,
    fields: HashMap<String, (IndexField, MappedType)>,
}

impl OpenIndex {
    fn open(data_dir: &Path, mappings: &Value) -> Result<Self, BackendError> {
        let index = Index::open_in_dir(data_dir)?;
        let schema = index.schema();

        let id = schema.get_field(ID_FIELD)?;
        let source = schema.get_field(SOURCE_FIELD)?;
        let fields = mapped_fields(mappings)
            .into_iter()
            .filter_map(|(name, kind)| {
                let field = schema.get_field(&name).ok()?;
                Some((name, (field, kind)))
            })
            .collect();

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            id,
            source,
            fields,
        })
    }

    fn to_document(&self, id: &str, source: &Value) -> Result<TantivyDocument, BackendError> {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.id, id);
        doc.add_text(self.source, serde_json::to_string(source)?);

        for (name, (field, kind)) in &self.fields {
            let values: Vec<&Value> = match source.get(name) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(other) => vec![other],
                None => continue,
            };
            for value in values {
                match kind {
                    MappedType::Keyword { lowercase } => {
                        if let Some(text) = keyword_text(value) {
                            let text = if *lowercase { text.to_lowercase() } else { text };
                            doc.add_text(*field, text);
                        }
                    }
                    MappedType::Text => {
                        if let Some(text) = value.as_str() {
                            doc.add_text(*field, text);
                        }
                    }
                    MappedType::Long => {
                        if let Some(n) = value.as_i64() {
                            doc.add_i64(*field, n);
                        }
                    }
                    MappedType::Boolean => {
                        if let Some(b) = flag_value(value) {
                            doc.add_bool(*field, b);
                        }
                    }
                }
            }
        }
        Ok(doc)
    }

    /// Query for one clause. `None` means the clause can never match.
    fn clause_query(&self, clause: &Clause) -> Result<Option<Box<dyn Query>>, BackendError> {
        let Some((field, kind)) = self.fields.get(&clause.field) else {
            return Ok(None);
        };
        let field = *field;

        let term = match (kind, clause.kind) {
            (MappedType::Text, _) | (_, MatchKind::FullText) => {
                let Some(text) = clause.value.as_str() else {
                    return Ok(None);
                };
                return self.full_text_query(field, *kind, text);
            }
            (MappedType::Keyword { lowercase }, _) => match keyword_text(&clause.value) {
                Some(text) if *lowercase => Term::from_field_text(field, &text.to_lowercase()),
                Some(text) => Term::from_field_text(field, &text),
                None => return Ok(None),
            },
            (MappedType::Long, _) => match clause.value.as_i64() {
                Some(n) => Term::from_field_i64(field, n),
                None => return Ok(None),
            },
            (MappedType::Boolean, _) => match flag_value(&clause.value) {
                Some(b) => Term::from_field_bool(field, b),
                None => return Ok(None),
            },
        };
        Ok(Some(Box::new(TermQuery::new(term, IndexRecordOption::Basic))))
    }

    /// Every analyzed word of `text` must be present.
    fn full_text_query(
        &self,
        field: IndexField,
        kind: MappedType,
        text: &str,
    ) -> Result<Option<Box<dyn Query>>, BackendError> {
        if kind != MappedType::Text {
            // full text against a keyword field degrades to an exact match
            return Ok(Some(Box::new(TermQuery::new(
                Term::from_field_text(field, text),
                IndexRecordOption::Basic,
            ))));
        }

        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut stream = analyzer.token_stream(text);
        let mut words: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        while stream.advance() {
            let term = Term::from_field_text(field, &stream.token().text);
            words.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        if words.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(BooleanQuery::new(words))))
    }

    /// Combined query, or `None` when a required clause cannot match.
    fn request_query(&self, request: &SearchRequest) -> Result<Option<BooleanQuery>, BackendError> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, Box::new(AllQuery))];

        for clause in request.filter.iter().chain(&request.must) {
            match self.clause_query(clause)? {
                Some(query) => clauses.push((Occur::Must, query)),
                None => return Ok(None),
            }
        }
        for clause in &request.must_not {
            if let Some(query) = self.clause_query(clause)? {
                clauses.push((Occur::MustNot, query));
            }
        }
        Ok(Some(BooleanQuery::new(clauses)))
    }

    fn is_sortable(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some((_, MappedType::Long)))
    }

    fn load(&self, address: DocAddress) -> Result<(String, Value), BackendError> {
        let searcher = self.reader.searcher();
        let doc: TantivyDocument = searcher.doc(address)?;
        let id = doc
            .get_first(self.id)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let source = doc
            .get_first(self.source)
            .and_then(|v| v.as_str())
            .ok_or_else(|| BackendError::InvalidState(format!("document {} has no source", id)))?;
        Ok((id, serde_json::from_str(source)?))
    }

    fn find(&self, id: &str) -> Result<Option<Value>, BackendError> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(Term::from_field_text(self.id, id), IndexRecordOption::Basic);
        let hits = searcher.search(&query, &TopDocs::with_limit(1))?;
        match hits.first() {
            Some((_, address)) => Ok(Some(self.load(*address)?.1)),
            None => Ok(None),
        }
    }

    fn all_documents(&self) -> Result<Vec<(String, Value)>, BackendError> {
        let searcher = self.reader.searcher();
        let total = searcher.num_docs() as usize;
        if total == 0 {
            return Ok(Vec::new());
        }
        searcher
            .search(&AllQuery, &TopDocs::with_limit(total))?
            .into_iter()
            .map(|(_, address)| self.load(address))
            .collect()
    }
}

fn keyword_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn build_schema(mappings: &Value) -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field(ID_FIELD, STRING | STORED);
    builder.add_text_field(SOURCE_FIELD, TextOptions::default().set_stored());

    for (name, kind) in mapped_fields(mappings) {
        match kind {
            MappedType::Keyword { .. } => {
                builder.add_text_field(&name, STRING);
            }
            MappedType::Text => {
                builder.add_text_field(&name, TEXT);
            }
            MappedType::Long => {
                builder.add_i64_field(&name, INDEXED | FAST);
            }
            MappedType::Boolean => {
                builder.add_bool_field(&name, INDEXED | FAST);
            }
        }
    }
    builder.build()
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), BackendError> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(".lock") {
            continue;
        }
        let target = to.join(&name);
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Index directories and open handles. Every method blocks.
struct EmbeddedStore {
    config: EmbeddedConfig,
    open: Mutex<HashMap<String, Arc<OpenIndex>>>,
    /// Serializes writers; Tantivy allows one per index directory
    write_lock: Mutex<()>,
}

impl EmbeddedStore {
    fn index_dir(&self, index: &str) -> Result<PathBuf, BackendError> {
        let valid = !index.is_empty()
            && !index.starts_with('.')
            && index
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(BackendError::InvalidState(format!(
                "invalid index name: {:?}",
                index
            )));
        }
        Ok(self.config.root.join(index))
    }

    fn exists(&self, index: &str) -> Result<bool, BackendError> {
        Ok(self.index_dir(index)?.join(META_FILE).exists())
    }

    fn read_meta(&self, index: &str) -> Result<Option<IndexMeta>, BackendError> {
        let path = self.index_dir(index)?.join(META_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn require_meta(&self, index: &str) -> Result<IndexMeta, BackendError> {
        self.read_meta(index)?
            .ok_or_else(|| BackendError::IndexMissing(index.to_string()))
    }

    fn write_meta(&self, index: &str, meta: &IndexMeta) -> Result<(), BackendError> {
        let dir = self.index_dir(index)?;
        let tmp = dir.join(format!("{}.tmp", META_FILE));
        std::fs::write(&tmp, serde_json::to_vec_pretty(meta)?)?;
        std::fs::rename(&tmp, dir.join(META_FILE))?;
        Ok(())
    }

    fn handle(&self, index: &str) -> Result<Arc<OpenIndex>, BackendError> {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = open.get(index) {
            return Ok(Arc::clone(handle));
        }

        let meta = self.require_meta(index)?;
        let handle = Arc::new(OpenIndex::open(
            &self.index_dir(index)?.join(DATA_DIR),
            &meta.mappings,
        )?);
        open.insert(index.to_string(), Arc::clone(&handle));
        debug!(index, "Opened embedded index");
        Ok(handle)
    }

    fn forget(&self, index: &str) {
        self.open
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(index);
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self, index: &str) -> Result<(), BackendError> {
        let meta = self.require_meta(index)?;
        if is_write_blocked(&meta.settings) {
            return Err(BackendError::WriteBlocked(index.to_string()));
        }
        Ok(())
    }

    fn writer(&self, handle: &OpenIndex) -> Result<IndexWriter, BackendError> {
        let mb = self.config.writer_memory_mb.max(MIN_WRITER_MEMORY_MB);
        Ok(handle.index.writer_with_num_threads(1, mb * 1024 * 1024)?)
    }

    /// Apply `apply` with a fresh writer, then commit and reload.
    fn write<F>(&self, index: &str, apply: F) -> Result<(), BackendError>
    where
        F: FnOnce(&OpenIndex, &mut IndexWriter) -> Result<(), BackendError>,
    {
        self.check_writable(index)?;
        let handle = self.handle(index)?;
        let mut writer = self.writer(&handle)?;
        apply(&handle, &mut writer)?;
        writer.commit()?;
        handle.reader.reload()?;
        Ok(())
    }

    fn upsert(&self, index: &str, id: &str, source: &Value) -> Result<(), BackendError> {
        self.write(index, |handle, writer| {
            writer.delete_term(Term::from_field_text(handle.id, id));
            writer.add_document(handle.to_document(id, source)?)?;
            Ok(())
        })
    }

    fn index_state(&self, index: &str) -> Result<IndexState, BackendError> {
        Ok(match self.read_meta(index)? {
            Some(meta) => IndexState::from_parts(&meta.settings, &meta.mappings),
            None => IndexState::missing(),
        })
    }

    fn put_settings(&self, index: &str, settings: &Value) -> Result<(), BackendError> {
        let _guard = self.lock_writes();
        let mut meta = self.require_meta(index)?;
        merge_settings(&mut meta.settings, settings);
        self.write_meta(index, &meta)?;
        debug!(index, "Updated index settings");
        Ok(())
    }

    fn clone_index(&self, source: &str, target: &str) -> Result<(), BackendError> {
        let _guard = self.lock_writes();
        let meta = self.require_meta(source)?;
        if !is_write_blocked(&meta.settings) {
            return Err(BackendError::InvalidState(format!(
                "{} must be write-blocked before cloning",
                source
            )));
        }
        if self.exists(target)? {
            return Err(BackendError::IndexExists(target.to_string()));
        }

        copy_dir(&self.index_dir(source)?, &self.index_dir(target)?)?;
        info!(source, target, "Cloned embedded index");
        Ok(())
    }

    fn delete_index(&self, index: &str) -> Result<bool, BackendError> {
        let _guard = self.lock_writes();
        let dir = self.index_dir(index)?;
        self.forget(index);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        info!(index, "Deleted embedded index");
        Ok(true)
    }

    fn create_index(&self, index: &str, schema: &Value) -> Result<(), BackendError> {
        let _guard = self.lock_writes();
        if self.exists(index)? {
            return Err(BackendError::IndexExists(index.to_string()));
        }
        let meta = IndexMeta {
            settings: schema.get("settings").cloned().unwrap_or_default(),
            mappings: schema.get("mappings").cloned().unwrap_or_default(),
        };

        let dir = self.index_dir(index)?;
        let data = dir.join(DATA_DIR);
        std::fs::create_dir_all(&data)?;
        Index::create_in_dir(&data, build_schema(&meta.mappings))?;
        self.write_meta(index, &meta)?;

        info!(index, "Created embedded index");
        Ok(())
    }

    fn reindex(&self, source: &str, dest: &str) -> Result<u64, BackendError> {
        let _guard = self.lock_writes();
        let documents = self.handle(source)?.all_documents()?;
        let count = documents.len() as u64;

        self.write(dest, |handle, writer| {
            for (id, doc) in &documents {
                writer.delete_term(Term::from_field_text(handle.id, id));
                writer.add_document(handle.to_document(id, doc)?)?;
            }
            Ok(())
        })?;

        info!(source, dest, count, "Reindexed embedded index");
        Ok(count)
    }

    fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, BackendError> {
        if !self.exists(index)? {
            return Ok(None);
        }
        self.handle(index)?.find(id)
    }

    fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), BackendError> {
        let _guard = self.lock_writes();
        self.upsert(index, id, doc)
    }

    fn update_document(&self, index: &str, id: &str, partial: &Value) -> Result<bool, BackendError> {
        let _guard = self.lock_writes();
        let Some(mut doc) = self.handle(index)?.find(id)? else {
            return Ok(false);
        };
        if let (Some(doc), Some(fields)) = (doc.as_object_mut(), partial.as_object()) {
            for (key, value) in fields {
                doc.insert(key.clone(), value.clone());
            }
        }
        self.upsert(index, id, &doc)?;
        Ok(true)
    }

    fn delete_document(&self, index: &str, id: &str) -> Result<bool, BackendError> {
        let _guard = self.lock_writes();
        if !self.exists(index)? || self.handle(index)?.find(id)?.is_none() {
            return Ok(false);
        }
        self.write(index, |handle, writer| {
            writer.delete_term(Term::from_field_text(handle.id, id));
            Ok(())
        })?;
        Ok(true)
    }

    fn search(&self, index: &str, request: &SearchRequest) -> Result<Vec<Value>, BackendError> {
        let handle = self.handle(index)?;
        if request.size == 0 {
            return Ok(Vec::new());
        }
        let Some(query) = handle.request_query(request)? else {
            return Ok(Vec::new());
        };

        let searcher = handle.reader.searcher();
        let addresses: Vec<DocAddress> = match &request.sort {
            Some(sort) if handle.is_sortable(&sort.field) => {
                let order = if sort.descending { Order::Desc } else { Order::Asc };
                let collector = TopDocs::with_limit(request.size)
                    .and_offset(request.from)
                    .order_by_fast_field::<i64>(&sort.field, order);
                searcher
                    .search(&query, &collector)?
                    .into_iter()
                    .map(|(_, address)| address)
                    .collect()
            }
            _ => {
                let collector = TopDocs::with_limit(request.size).and_offset(request.from);
                searcher
                    .search(&query, &collector)?
                    .into_iter()
                    .map(|(_, address)| address)
                    .collect()
            }
        };

        let results = addresses
            .into_iter()
            .map(|address| handle.load(address).map(|(_, source)| source))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(index, results = results.len(), "Embedded search complete");
        Ok(results)
    }

    fn count(&self, index: &str, request: &SearchRequest) -> Result<u64, BackendError> {
        let handle = self.handle(index)?;
        let Some(query) = handle.request_query(request)? else {
            return Ok(0);
        };
        let count = handle.reader.searcher().search(&query, &Count)?;
        Ok(count as u64)
    }
}

/// Tantivy-backed [`SearchBackend`] for single-host deployments.
///
/// Index work runs on tokio's blocking pool, never on a runtime worker.
#[derive(Clone)]
pub struct EmbeddedBackend {
    store: Arc<EmbeddedStore>,
}

impl EmbeddedBackend {
    pub fn new(config: EmbeddedConfig) -> Result<Self, BackendError> {
        std::fs::create_dir_all(&config.root)?;
        info!(root = ?config.root, "Opened embedded search backend");
        Ok(Self {
            store: Arc::new(EmbeddedStore {
                config,
                open: Mutex::new(HashMap::new()),
                write_lock: Mutex::new(()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.store.config.root
    }

    /// Run `work` against the store on the blocking pool.
    async fn blocking<T, F>(&self, operation: &'static str, work: F) -> Result<T, BackendError>
    where
        F: FnOnce(&EmbeddedStore) -> Result<T, BackendError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || work(&*store))
            .await
            .map_err(|e| BackendError::Task(format!("{}: {}", operation, e)))?
    }
}

#[async_trait]
impl SearchBackend for EmbeddedBackend {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        let index = index.to_string();
        self.blocking("index_exists", move |store| store.exists(&index))
            .await
    }

    async fn index_state(&self, index: &str) -> Result<IndexState, BackendError> {
        let index = index.to_string();
        self.blocking("index_state", move |store| store.index_state(&index))
            .await
    }

    async fn put_settings(&self, index: &str, settings: &Value) -> Result<(), BackendError> {
        let index = index.to_string();
        let settings = settings.clone();
        self.blocking("put_settings", move |store| {
            store.put_settings(&index, &settings)
        })
        .await
    }

    async fn clone_index(&self, source: &str, target: &str) -> Result<(), BackendError> {
        let source = source.to_string();
        let target = target.to_string();
        self.blocking("clone_index", move |store| {
            store.clone_index(&source, &target)
        })
        .await
    }

    async fn wait_for_health(
        &self,
        index: &str,
        timeout: Duration,
    ) -> Result<HealthStatus, BackendError> {
        let name = index.to_string();
        // a local index is usable as soon as it opens
        match self.blocking("wait_for_health", move |store| store.handle(&name)).await {
            Ok(_) => Ok(HealthStatus::Green),
            Err(e) => Err(BackendError::Timeout(format!(
                "{} unavailable after {}s: {}",
                index,
                timeout.as_secs(),
                e
            ))),
        }
    }

    async fn delete_index(&self, index: &str) -> Result<bool, BackendError> {
        let index = index.to_string();
        self.blocking("delete_index", move |store| store.delete_index(&index))
            .await
    }

    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), BackendError> {
        let index = index.to_string();
        let schema = schema.clone();
        self.blocking("create_index", move |store| {
            store.create_index(&index, &schema)
        })
        .await
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<u64, BackendError> {
        let source = source.to_string();
        let dest = dest.to_string();
        self.blocking("reindex", move |store| store.reindex(&source, &dest))
            .await
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, BackendError> {
        let index = index.to_string();
        let id = id.to_string();
        self.blocking("get_document", move |store| store.get_document(&index, &id))
            .await
    }

    async fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), BackendError> {
        let index = index.to_string();
        let id = id.to_string();
        let doc = doc.clone();
        self.blocking("put_document", move |store| {
            store.put_document(&index, &id, &doc)
        })
        .await
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<bool, BackendError> {
        let index = index.to_string();
        let id = id.to_string();
        let partial = partial.clone();
        self.blocking("update_document", move |store| {
            store.update_document(&index, &id, &partial)
        })
        .await
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, BackendError> {
        let index = index.to_string();
        let id = id.to_string();
        self.blocking("delete_document", move |store| {
            store.delete_document(&index, &id)
        })
        .await
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Value>, BackendError> {
        let index = index.to_string();
        let request = request.clone();
        self.blocking("search", move |store| store.search(&index, &request))
            .await
    }

    async fn count(&self, index: &str, request: &SearchRequest) -> Result<u64, BackendError> {
        let index = index.to_string();
        let request = request.clone();
        self.blocking("count", move |store| store.count(&index, &request))
            .await
    }
}
