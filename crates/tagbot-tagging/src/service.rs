//! Tagging service: the write path from a tag message to a stored document.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tagbot_query::{FieldTable, ParsedQuery, QueryParser};
use tagbot_search::DocumentStore;
use tagbot_types::{Field, MediaFile, TagLimits, TaggedDocument};

use crate::attrs::generated_attrs;
use crate::error::TagError;
use crate::merge::{MergeEngine, MergeMode};
use crate::packs::PackCache;
use crate::pipeline::{Halt, Pipeline, TagRequest};

/// Fields listed on the info line of a document description, in order.
const INFO_FIELDS: [Field; 5] = [
    Field::Title,
    Field::Emoji,
    Field::Filename,
    Field::PackName,
    Field::PackLink,
];

/// Outcome of a tag message.
#[derive(Debug, Clone, PartialEq)]
pub enum TagReply {
    /// The message was not a tag edit
    Ignored,
    /// The edit was refused; the message says why
    Rejected(String),
    Tagged {
        document: TaggedDocument,
        warnings: Vec<String>,
    },
}

pub struct TaggingService {
    store: DocumentStore,
    packs: PackCache,
    engine: MergeEngine,
    pipeline: Pipeline,
    parser: Arc<QueryParser>,
}

impl TaggingService {
    pub fn new(
        store: DocumentStore,
        packs: PackCache,
        parser: Arc<QueryParser>,
        limits: TagLimits,
    ) -> Self {
        Self {
            store,
            packs,
            engine: MergeEngine::new(limits),
            pipeline: Pipeline::standard(Arc::clone(&parser)),
            parser,
        }
    }

    pub fn fields(&self) -> &FieldTable {
        self.parser.fields()
    }

    /// Run a message through the pipeline and apply it as an update edit.
    ///
    /// User-facing rejections come back as [`TagReply::Rejected`]; only
    /// infrastructure failures are errors.
    pub async fn handle_message(&self, request: TagRequest) -> Result<TagReply, TagError> {
        let ctx = match self.pipeline.run(request) {
            Ok(ctx) => ctx,
            Err(Halt::Ignore) => return Ok(TagReply::Ignored),
            Err(Halt::Reject(message)) => return Ok(TagReply::Rejected(message)),
        };
        let Some(prepared) = ctx.into_prepared() else {
            return Ok(TagReply::Ignored);
        };

        let result = self
            .tag(prepared.owner, &prepared.media, &prepared.parsed.query, MergeMode::Update)
            .await;
        reply_for(result, prepared.parsed.warnings)
    }

    /// Replace the owner's tags and emoji for `media` with those in `text`.
    ///
    /// A direct edit: no message pipeline, negated tokens are ignored.
    pub async fn handle_replace(
        &self,
        owner: i64,
        media: &MediaFile,
        text: &str,
    ) -> Result<TagReply, TagError> {
        let parsed = self.parser.parse_tags(text);
        let result = self
            .tag(owner, media, &parsed.query, MergeMode::Replace)
            .await;
        reply_for(result, parsed.warnings)
    }

    /// Apply a parsed edit to the owner's document for `media`.
    ///
    /// The document is created on first use. Nothing is written unless the
    /// merge succeeds.
    pub async fn tag(
        &self,
        owner: i64,
        media: &MediaFile,
        edit: &ParsedQuery,
        mode: MergeMode,
    ) -> Result<TaggedDocument, TagError> {
        let kind = media.kind().ok_or(TagError::UnsupportedMedia)?;

        let base = match self.store.get(owner, media.id).await? {
            Some(doc) => doc,
            None => {
                let limit = self.engine.limits().max_media_per_user;
                let count = self.store.count_for_owner(owner).await?;
                if count >= limit {
                    warn!(owner, count, limit, "Owner is at the media limit");
                    return Err(TagError::MediaCapReached { limit });
                }
                debug!(owner, id = media.id, %kind, "Creating document");
                TaggedDocument::new(owner, media.id, media.access_hash, kind)
            }
        };

        let pack = self.packs.get(media.sticker_set).await?;
        let attrs = generated_attrs(media, pack.as_deref());
        let merged = self.engine.merge(&base, &attrs, edit, mode)?;

        self.store.put(&merged).await?;
        info!(owner, id = media.id, tags = merged.tags.len(), "Tagged media");
        Ok(merged)
    }

    pub async fn show(&self, owner: i64, id: i64) -> Result<Option<TaggedDocument>, TagError> {
        Ok(self.store.get(owner, id).await?)
    }

    /// Returns false when there was nothing to delete.
    pub async fn delete(&self, owner: i64, id: i64) -> Result<bool, TagError> {
        let deleted = self.store.delete(owner, id).await?;
        info!(owner, id, deleted, "Delete media");
        Ok(deleted)
    }
}

fn reply_for(
    result: Result<TaggedDocument, TagError>,
    warnings: Vec<String>,
) -> Result<TagReply, TagError> {
    match result {
        Ok(document) => Ok(TagReply::Tagged { document, warnings }),
        Err(e @ (TagError::Backend(_) | TagError::PackLookup(_))) => Err(e),
        Err(e) => Ok(TagReply::Rejected(e.user_message())),
    }
}

/// Plain-text description of a document, using each field's short alias.
pub fn describe_document(doc: &TaggedDocument, fields: &FieldTable) -> String {
    let emoji = doc.emoji.iter().cloned().collect::<Vec<_>>().join("");
    let info: Vec<String> = INFO_FIELDS
        .iter()
        .filter_map(|field| {
            let value = match field {
                Field::Title => doc.title.as_deref(),
                Field::Emoji => Some(emoji.as_str()),
                Field::Filename => doc.filename.as_deref(),
                Field::PackName => doc.pack_name.as_deref(),
                Field::PackLink => doc.pack_link.as_deref(),
                _ => None,
            }?;
            (!value.is_empty()).then(|| format!("{}:{}", fields.short_alias(*field), value))
        })
        .collect();

    let mut out = format!(
        "Info for {}:\ninfo: {}\ntags: {}",
        doc.id,
        info.join(" "),
        doc.tags.iter().cloned().collect::<Vec<_>>().join(" ")
    );
    if !doc.emoji.is_empty() {
        out.push_str("\nemoji: ");
        out.push_str(&doc.emoji.iter().cloned().collect::<Vec<_>>().join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::{StaticPackSource, StickerPack, StickerPackSource};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use serde_json::json;
    use std::collections::HashMap;
    use tagbot_search::{MemoryBackend, SearchBackend};
    use tagbot_types::{DocumentAttribute, MediaKind, MediaShape, StickerSetRef};

    async fn service(limits: TagLimits) -> TaggingService {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .create_index("tagbot", &json!({ "settings": {}, "mappings": {} }))
            .await
            .unwrap();
        let pack = StickerPack {
            id: 9,
            title: "Cats".to_string(),
            short_name: "cats".to_string(),
            sticker_emoji: HashMap::from([(30, vec!["🐱".to_string()])]),
        };
        let packs = PackCache::new(Arc::new(StaticPackSource::new([pack])), 16);
        let parser = Arc::new(QueryParser::new(FieldTable::default(), &limits));
        TaggingService::new(DocumentStore::new(backend, "tagbot"), packs, parser, limits)
    }

    fn photo(id: i64) -> MediaFile {
        MediaFile::new(id, 77, MediaShape::Photo)
    }

    fn message(text: &str, reply: MediaFile) -> TagRequest {
        TagRequest {
            owner: 1,
            text: text.to_string(),
            reply: Some(reply),
        }
    }

    fn tagged(reply: TagReply) -> TaggedDocument {
        match reply {
            TagReply::Tagged { document, .. } => document,
            other => panic!("expected a tagged document, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_tag_creates_document() {
        let service = service(TagLimits::default()).await;
        let doc = tagged(
            service
                .handle_message(message("cat cute", photo(10)))
                .await
                .unwrap(),
        );
        assert_eq!(doc.kind, MediaKind::Photo);
        assert_eq!(doc.access_hash, 77);
        assert!(doc.last_used > 0);

        let stored = service.show(1, 10).await.unwrap().unwrap();
        assert_eq!(stored, doc);
    }

    #[tokio::test]
    async fn test_limit_rejection_keeps_stored_document() {
        let limits = TagLimits {
            max_tags_per_file: 2,
            ..TagLimits::default()
        };
        let service = service(limits).await;
        service
            .handle_message(message("a b", photo(10)))
            .await
            .unwrap();
        let before = service.show(1, 10).await.unwrap();

        let reply = service
            .handle_message(message("c", photo(10)))
            .await
            .unwrap();
        assert_eq!(
            reply,
            TagReply::Rejected("Only 2 tags are allowed per file!".to_string())
        );
        assert_eq!(service.show(1, 10).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_long_tag_is_rejected() {
        let service = service(TagLimits::default()).await;
        let text = "y".repeat(40);
        let reply = service
            .handle_message(message(&text, photo(10)))
            .await
            .unwrap();
        assert_eq!(
            reply,
            TagReply::Rejected("Tags are limited to a length of 32!".to_string())
        );
        assert_eq!(service.show(1, 10).await.unwrap(), None);
    }

    struct CountingSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl StickerPackSource for CountingSource {
        async fn fetch(&self, _set: StickerSetRef) -> Result<Option<StickerPack>, TagError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_long_tag_rejected_before_any_lookup() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .create_index("tagbot", &json!({ "settings": {}, "mappings": {} }))
            .await
            .unwrap();
        backend.clear_calls();
        let source = Arc::new(CountingSource {
            fetches: AtomicUsize::new(0),
        });
        let limits = TagLimits::default();
        let parser = Arc::new(QueryParser::new(FieldTable::default(), &limits));
        let service = TaggingService::new(
            DocumentStore::new(backend.clone(), "tagbot"),
            PackCache::new(source.clone(), 16),
            parser,
            limits,
        );
        let sticker = MediaFile::new(
            30,
            1,
            MediaShape::Document {
                attributes: vec![DocumentAttribute::Sticker],
            },
        )
        .with_sticker_set(StickerSetRef {
            id: 9,
            access_hash: 0,
        });

        let reply = service
            .handle_message(message(&format!("cat {}", "z".repeat(33)), sticker))
            .await
            .unwrap();
        assert_eq!(
            reply,
            TagReply::Rejected("Tags are limited to a length of 32!".to_string())
        );
        assert!(backend.calls().is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_media_cap_applies_to_new_documents_only() {
        let limits = TagLimits {
            max_media_per_user: 1,
            ..TagLimits::default()
        };
        let service = service(limits).await;
        service
            .handle_message(message("a", photo(1)))
            .await
            .unwrap();

        let err = service
            .tag(1, &photo(2), &ParsedQuery::from_pairs([(Field::Tags, false, "b")]), MergeMode::Update)
            .await
            .unwrap_err();
        assert!(matches!(err, TagError::MediaCapReached { limit: 1 }));

        let updated = service
            .tag(1, &photo(1), &ParsedQuery::from_pairs([(Field::Tags, false, "b")]), MergeMode::Update)
            .await
            .unwrap();
        assert_eq!(updated.tags.len(), 2);
    }

    #[tokio::test]
    async fn test_pack_sticker_gets_pack_attrs() {
        let service = service(TagLimits::default()).await;
        let sticker = MediaFile::new(
            30,
            1,
            MediaShape::Document {
                attributes: vec![DocumentAttribute::Sticker],
            },
        )
        .with_name("sticker.webp")
        .with_sticker_set(StickerSetRef {
            id: 9,
            access_hash: 0,
        });

        let doc = tagged(
            service
                .handle_message(message("cat", sticker))
                .await
                .unwrap(),
        );
        assert_eq!(doc.kind, MediaKind::Sticker);
        assert_eq!(doc.pack_name.as_deref(), Some("Cats"));
        assert_eq!(doc.filename, None);
        assert!(doc.emoji.contains("🐱"));
    }

    #[tokio::test]
    async fn test_replace_overwrites_tags() {
        let service = service(TagLimits::default()).await;
        service
            .handle_message(message("a b c", photo(1)))
            .await
            .unwrap();

        let doc = tagged(service.handle_replace(1, &photo(1), "x -y").await.unwrap());
        assert_eq!(doc.tags.into_iter().collect::<Vec<_>>(), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_reports_found() {
        let service = service(TagLimits::default()).await;
        service
            .handle_message(message("a", photo(1)))
            .await
            .unwrap();
        assert!(service.delete(1, 1).await.unwrap());
        assert!(!service.delete(1, 1).await.unwrap());
        assert!(!service.delete(2, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_commands_are_ignored() {
        let service = service(TagLimits::default()).await;
        let reply = service
            .handle_message(message("/tags", photo(1)))
            .await
            .unwrap();
        assert_eq!(reply, TagReply::Ignored);
    }

    #[test]
    fn test_describe_document() {
        let mut doc = TaggedDocument::new(1, 42, 0, MediaKind::Sticker);
        doc.tags = ["cat", "cute"].iter().map(|t| t.to_string()).collect();
        doc.emoji = ["😺"].iter().map(|t| t.to_string()).collect();
        doc.pack_name = Some("Cats".to_string());
        doc.pack_link = Some("cats".to_string());

        assert_eq!(
            describe_document(&doc, &FieldTable::default()),
            "Info for 42:\ninfo: e:😺 p:Cats a:cats\ntags: cat cute\nemoji: 😺"
        );
    }
}
