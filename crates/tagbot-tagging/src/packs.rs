//! Sticker pack lookup with a bounded cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tagbot_types::{BoundedCache, StickerSetRef};

use crate::error::TagError;

/// Default number of packs kept in memory.
pub const DEFAULT_PACK_CACHE_CAPACITY: usize = 1024;

/// The parts of a sticker pack the tagger uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerPack {
    pub id: i64,
    pub title: String,
    pub short_name: String,
    /// Emoji per sticker document id
    #[serde(default)]
    pub sticker_emoji: HashMap<i64, Vec<String>>,
}

impl StickerPack {
    /// Emoji the pack assigns to a sticker; empty when it has none.
    pub fn emoji_for(&self, document_id: i64) -> BTreeSet<String> {
        self.sticker_emoji
            .get(&document_id)
            .map(|emoji| emoji.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Fetches sticker packs from the messaging platform.
#[async_trait]
pub trait StickerPackSource: Send + Sync {
    /// Returns None when the platform does not know the pack.
    async fn fetch(&self, set: StickerSetRef) -> Result<Option<StickerPack>, TagError>;
}

/// Pack source backed by a fixed set of packs.
#[derive(Debug, Default)]
pub struct StaticPackSource {
    packs: HashMap<i64, StickerPack>,
}

impl StaticPackSource {
    pub fn new(packs: impl IntoIterator<Item = StickerPack>) -> Self {
        Self {
            packs: packs.into_iter().map(|pack| (pack.id, pack)).collect(),
        }
    }
}

#[async_trait]
impl StickerPackSource for StaticPackSource {
    async fn fetch(&self, set: StickerSetRef) -> Result<Option<StickerPack>, TagError> {
        Ok(self.packs.get(&set.id).cloned())
    }
}

/// LRU cache in front of a [`StickerPackSource`].
///
/// Unknown packs are cached too so repeated lookups of an invalid pack do
/// not hit the platform. Errors are not cached.
pub struct PackCache {
    source: Arc<dyn StickerPackSource>,
    cache: BoundedCache<i64, Option<Arc<StickerPack>>>,
}

impl PackCache {
    pub fn new(source: Arc<dyn StickerPackSource>, capacity: usize) -> Self {
        Self {
            source,
            cache: BoundedCache::new(capacity),
        }
    }

    pub async fn get(
        &self,
        set: Option<StickerSetRef>,
    ) -> Result<Option<Arc<StickerPack>>, TagError> {
        let Some(set) = set else {
            return Ok(None);
        };
        if let Some(cached) = self.cache.get(&set.id) {
            return Ok(cached);
        }

        let pack = self.source.fetch(set).await?.map(Arc::new);
        debug!(pack_id = set.id, found = pack.is_some(), "Fetched sticker pack");
        self.cache.insert(set.id, pack.clone());
        Ok(pack)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
