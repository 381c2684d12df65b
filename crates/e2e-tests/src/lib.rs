//! End-to-end test infrastructure for tagbot.
//!
//! Provides a shared TestHarness wiring the parser, tagging service,
//! search client and index lifecycle over one in-memory backend, plus
//! helpers for building media and seeding documents.

use std::sync::Arc;

use tagbot_query::{FieldTable, QueryParser};
use tagbot_search::{
    DocumentStore, MemoryBackend, MemoryHashStore, SchemaDocument, SearchBackend,
    SearchIndexClient, Startup,
};
use tagbot_tagging::{PackCache, StaticPackSource, StickerPack, TagReply, TagRequest, TaggingService};
use tagbot_types::{IndexNames, MediaFile, MediaKind, MediaShape, TagLimits, TaggedDocument};

/// Shared test harness for E2E tests.
pub struct TestHarness {
    pub backend: Arc<MemoryBackend>,
    pub hashes: Arc<MemoryHashStore>,
    pub indices: IndexNames,
    pub limits: TagLimits,
    pub parser: Arc<QueryParser>,
    pub tagging: TaggingService,
    pub search: SearchIndexClient,
}

impl TestHarness {
    /// Harness with default limits and an initialized main index.
    pub async fn new() -> Self {
        Self::with_limits(TagLimits::default(), Vec::new()).await
    }

    /// Harness with custom limits and known sticker packs.
    pub async fn with_limits(limits: TagLimits, packs: Vec<StickerPack>) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let hashes = Arc::new(MemoryHashStore::default());
        let indices = IndexNames::default();
        let parser = Arc::new(QueryParser::new(FieldTable::default(), &limits));

        let store = DocumentStore::new(backend.clone(), indices.main.clone());
        let packs = PackCache::new(Arc::new(StaticPackSource::new(packs)), 64);
        let tagging = TaggingService::new(store, packs, Arc::clone(&parser), limits.clone());
        let search = SearchIndexClient::new(backend.clone(), indices.main.clone())
            .with_page_size(limits.page_size);

        let harness = Self {
            backend,
            hashes,
            indices,
            limits,
            parser,
            tagging,
            search,
        };
        harness
            .startup()
            .run()
            .await
            .expect("Initial startup failed");
        harness.backend.clear_calls();
        harness
    }

    /// A startup sequence over the harness backend with the built-in schema.
    pub fn startup(&self) -> Startup {
        Startup::new(
            self.backend.clone(),
            self.hashes.clone(),
            SchemaDocument::builtin().expect("Built-in schema is invalid"),
            self.indices.clone(),
        )
    }

    /// Send a tag message replying to `media`.
    pub async fn tag(&self, owner: i64, media: &MediaFile, text: &str) -> TagReply {
        self.tagging
            .handle_message(TagRequest {
                owner,
                text: text.to_string(),
                reply: Some(media.clone()),
            })
            .await
            .expect("Tag message failed")
    }

    /// Write a document straight to the main index.
    pub async fn seed(&self, doc: &TaggedDocument) {
        self.backend
            .put_document(
                &self.indices.main,
                &doc.key(),
                &doc.to_value().expect("Failed to serialize document"),
            )
            .await
            .expect("Failed to seed document");
    }

    /// Serialized bytes of a stored document, for byte-level comparisons.
    pub fn stored_bytes(&self, owner: i64, id: i64) -> Option<Vec<u8>> {
        self.backend
            .documents(&self.indices.main)
            .get(&TaggedDocument::key_for(owner, id))
            .map(|doc| serde_json::to_vec(doc).expect("Failed to serialize stored document"))
    }

    /// Number of documents in the main index.
    pub fn main_len(&self) -> usize {
        self.backend.documents(&self.indices.main).len()
    }
}

/// A photo media descriptor.
pub fn photo(id: i64) -> MediaFile {
    MediaFile::new(id, id * 10, MediaShape::Photo)
}

/// A document with the given tags and recency.
pub fn document(owner: i64, id: i64, kind: MediaKind, tags: &[&str], last_used: i64) -> TaggedDocument {
    let mut doc = TaggedDocument::new(owner, id, id * 10, kind);
    doc.tags = tags.iter().map(|t| t.to_string()).collect();
    doc.last_used = last_used;
    doc
}

/// Unwrap a successful tag reply.
pub fn tagged(reply: TagReply) -> TaggedDocument {
    match reply {
        TagReply::Tagged { document, .. } => document,
        other => panic!("Expected a tagged document, got {:?}", other),
    }
}
