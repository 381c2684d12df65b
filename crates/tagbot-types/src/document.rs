//! Tagged document type.
//!
//! A tagged document is one owner's tagging record for one media item.
//! It is created lazily the first time an owner tags a media item and is
//! only ever changed through the merge engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::TagbotError;
use crate::media::MediaKind;

/// One owner's tags, emoji and derived metadata for one media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedDocument {
    /// Owner of the record; every read and write is scoped by it
    pub owner: i64,

    /// Platform media id
    pub id: i64,

    /// Platform access hash
    pub access_hash: i64,

    #[serde(rename = "type")]
    pub kind: MediaKind,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub emoji: BTreeSet<String>,

    /// File extension without the leading dot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,

    #[serde(default)]
    pub is_animated: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Sticker pack title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_name: Option<String>,

    /// Sticker pack short name, used to build the pack link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_link: Option<String>,

    /// Unix seconds of the last tag edit or search selection
    #[serde(default)]
    pub last_used: i64,
}

impl TaggedDocument {
    /// Create a blank document for a media item.
    pub fn new(owner: i64, id: i64, access_hash: i64, kind: MediaKind) -> Self {
        Self {
            owner,
            id,
            access_hash,
            kind,
            tags: BTreeSet::new(),
            emoji: BTreeSet::new(),
            ext: None,
            is_animated: false,
            filename: None,
            title: None,
            pack_name: None,
            pack_link: None,
            last_used: 0,
        }
    }

    /// Backend document key for an (owner, media id) pair.
    pub fn key_for(owner: i64, id: i64) -> String {
        format!("{}_{}", owner, id)
    }

    pub fn key(&self) -> String {
        Self::key_for(self.owner, self.id)
    }

    /// Copy generated attributes onto the document.
    ///
    /// Attributes that were not generated leave the stored value alone.
    pub fn apply_generated(&mut self, attrs: &GeneratedAttrs) {
        if let Some(ext) = &attrs.ext {
            self.ext = Some(ext.clone());
        }
        self.is_animated = attrs.is_animated;
        if let Some(filename) = &attrs.filename {
            self.filename = Some(filename.clone());
        }
        if let Some(title) = &attrs.title {
            self.title = Some(title.clone());
        }
        if let Some(pack_name) = &attrs.pack_name {
            self.pack_name = Some(pack_name.clone());
        }
        if let Some(pack_link) = &attrs.pack_link {
            self.pack_link = Some(pack_link.clone());
        }
        if let Some(emoji) = &attrs.emoji {
            self.emoji = emoji.clone();
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value, TagbotError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, TagbotError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Attributes derived from media metadata rather than authored by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedAttrs {
    pub ext: Option<String>,
    pub is_animated: bool,
    pub filename: Option<String>,
    pub title: Option<String>,
    pub pack_name: Option<String>,
    pub pack_link: Option<String>,
    /// Emoji the sticker pack associates with this sticker
    pub emoji: Option<BTreeSet<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_key_format() {
        let doc = TaggedDocument::new(42, 1001, 7, MediaKind::Sticker);
        assert_eq!(doc.key(), "42_1001");
        assert_eq!(TaggedDocument::key_for(-5, 3), "-5_3");
    }

    #[test]
    fn test_type_field_is_renamed() {
        let doc = TaggedDocument::new(1, 2, 3, MediaKind::Gif);
        let value = doc.to_value().unwrap();
        assert_eq!(value["type"], "gif");
        assert!(value.get("kind").is_none());
        // unset optional attributes are left out entirely
        assert!(value.get("filename").is_none());
    }

    #[test]
    fn test_from_value_defaults_missing_sets() {
        let value = serde_json::json!({
            "owner": 1,
            "id": 2,
            "access_hash": 3,
            "type": "photo"
        });
        let doc = TaggedDocument::from_value(value).unwrap();
        assert!(doc.tags.is_empty());
        assert!(doc.emoji.is_empty());
        assert_eq!(doc.last_used, 0);
    }

    #[test]
    fn test_apply_generated_keeps_unset_attributes() {
        let mut doc = TaggedDocument::new(1, 2, 3, MediaKind::File);
        doc.filename = Some("report.pdf".to_string());

        let attrs = GeneratedAttrs {
            ext: Some("pdf".to_string()),
            ..Default::default()
        };
        doc.apply_generated(&attrs);

        assert_eq!(doc.ext.as_deref(), Some("pdf"));
        assert_eq!(doc.filename.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_apply_generated_replaces_emoji() {
        let mut doc = TaggedDocument::new(1, 2, 3, MediaKind::Sticker);
        let attrs = GeneratedAttrs {
            is_animated: true,
            pack_name: Some("Cats".to_string()),
            pack_link: Some("cats_by_bot".to_string()),
            emoji: Some(set(&["😺"])),
            ..Default::default()
        };
        doc.apply_generated(&attrs);

        assert!(doc.is_animated);
        assert_eq!(doc.emoji, set(&["😺"]));
        assert_eq!(doc.pack_link.as_deref(), Some("cats_by_bot"));
    }
}
