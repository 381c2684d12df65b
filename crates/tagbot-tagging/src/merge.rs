//! Document merge engine.
//!
//! Folds generated attributes and a parsed tag edit into a document. The
//! input document is never modified; the caller persists the returned copy
//! only when the merge succeeds, so a rejected edit leaves storage as it was.

use std::collections::BTreeSet;

use tracing::debug;

use tagbot_query::ParsedQuery;
use tagbot_types::{Field, GeneratedAttrs, TagLimits, TaggedDocument};

use crate::error::MergeError;

/// How the user-authored sets are combined with the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// `(old ∪ added) − removed`
    #[default]
    Update,
    /// The added values become the whole set; negated values are ignored.
    Replace,
}

/// Applies tag edits under the configured limits.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    limits: TagLimits,
}

impl MergeEngine {
    pub fn new(limits: TagLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &TagLimits {
        &self.limits
    }

    /// Merge at the current time.
    pub fn merge(
        &self,
        doc: &TaggedDocument,
        attrs: &GeneratedAttrs,
        query: &ParsedQuery,
        mode: MergeMode,
    ) -> Result<TaggedDocument, MergeError> {
        self.merge_at(doc, attrs, query, mode, chrono::Utc::now().timestamp())
    }

    /// Merge with an explicit `last_used` timestamp.
    pub fn merge_at(
        &self,
        doc: &TaggedDocument,
        attrs: &GeneratedAttrs,
        query: &ParsedQuery,
        mode: MergeMode,
        now: i64,
    ) -> Result<TaggedDocument, MergeError> {
        let added_tags = query.get(Field::Tags, false);
        self.check_tag_lengths(&added_tags)?;

        let mut merged = doc.clone();

        // User-authored emoji win over the pack's
        if merged.emoji.is_empty() {
            merged.apply_generated(attrs);
        } else {
            let mut attrs = attrs.clone();
            attrs.emoji = None;
            merged.apply_generated(&attrs);
        }

        merged.tags = combine(&merged.tags, added_tags, &query.get(Field::Tags, true), mode);
        merged.emoji = combine(
            &merged.emoji,
            query.get(Field::Emoji, false),
            &query.get(Field::Emoji, true),
            mode,
        );

        if merged.tags.len() > self.limits.max_tags_per_file {
            return Err(MergeError::LimitExceeded {
                field: Field::Tags,
                limit: self.limits.max_tags_per_file,
            });
        }
        if merged.emoji.len() > self.limits.max_emoji_per_file {
            return Err(MergeError::LimitExceeded {
                field: Field::Emoji,
                limit: self.limits.max_emoji_per_file,
            });
        }

        merged.last_used = now;
        debug!(
            owner = merged.owner,
            id = merged.id,
            tags = merged.tags.len(),
            emoji = merged.emoji.len(),
            ?mode,
            "Merged tag edit"
        );
        Ok(merged)
    }

    fn check_tag_lengths(&self, tags: &BTreeSet<String>) -> Result<(), MergeError> {
        let max = self.limits.max_tag_length;
        match tags.iter().find(|tag| tag.chars().count() > max) {
            Some(tag) => Err(MergeError::TagTooLong {
                tag: tag.clone(),
                max,
            }),
            None => Ok(()),
        }
    }
}

/// Removal is applied after the union, so a value both added and removed
/// in one edit ends up absent.
fn combine(
    old: &BTreeSet<String>,
    added: BTreeSet<String>,
    removed: &BTreeSet<String>,
    mode: MergeMode,
) -> BTreeSet<String> {
    match mode {
        MergeMode::Update => old
            .union(&added)
            .filter(|value| !removed.contains(*value))
            .cloned()
            .collect(),
        MergeMode::Replace => added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tagbot_types::MediaKind;

    fn engine() -> MergeEngine {
        MergeEngine::new(TagLimits::default())
    }

    fn doc_with(tags: &[&str], emoji: &[&str]) -> TaggedDocument {
        let mut doc = TaggedDocument::new(1, 2, 3, MediaKind::Sticker);
        doc.tags = set(tags);
        doc.emoji = set(emoji);
        doc
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn edit(pairs: &[(Field, bool, &str)]) -> ParsedQuery {
        ParsedQuery::from_pairs(pairs.iter().map(|(f, n, v)| (*f, *n, *v)))
    }

    #[test]
    fn test_add_and_remove_tags() {
        let doc = doc_with(&["cat", "dog", "blurry"], &[]);
        let query = edit(&[
            (Field::Tags, false, "cat"),
            (Field::Tags, false, "cute"),
            (Field::Tags, true, "blurry"),
        ]);

        let merged = engine()
            .merge_at(&doc, &GeneratedAttrs::default(), &query, MergeMode::Update, 42)
            .unwrap();
        assert_eq!(merged.tags, set(&["cat", "dog", "cute"]));
        assert_eq!(merged.last_used, 42);
    }

    #[test]
    fn test_removal_wins_in_same_edit() {
        let doc = doc_with(&[], &[]);
        let query = edit(&[(Field::Tags, false, "cat"), (Field::Tags, true, "cat")]);

        let merged = engine()
            .merge_at(&doc, &GeneratedAttrs::default(), &query, MergeMode::Update, 0)
            .unwrap();
        assert!(merged.tags.is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let doc = doc_with(&["a", "b"], &["😺"]);
        let query = edit(&[
            (Field::Tags, false, "c"),
            (Field::Tags, true, "a"),
            (Field::Emoji, false, "🐶"),
        ]);
        let engine = engine();
        let attrs = GeneratedAttrs::default();

        let once = engine
            .merge_at(&doc, &attrs, &query, MergeMode::Update, 1)
            .unwrap();
        let twice = engine
            .merge_at(&once, &attrs, &query, MergeMode::Update, 1)
            .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_tag_limit_rejects_whole_edit() {
        let tags: Vec<String> = (0..10).map(|i| format!("t{}", i)).collect();
        let refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        let doc = doc_with(&refs, &[]);
        let before = doc.clone();

        let err = engine()
            .merge_at(
                &doc,
                &GeneratedAttrs::default(),
                &edit(&[(Field::Tags, false, "extra")]),
                MergeMode::Update,
                5,
            )
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::LimitExceeded {
                field: Field::Tags,
                limit: 10
            }
        );
        assert_eq!(doc, before);
    }

    #[test]
    fn test_swap_at_limit_is_allowed() {
        let tags: Vec<String> = (0..10).map(|i| format!("t{}", i)).collect();
        let refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        let doc = doc_with(&refs, &[]);

        let merged = engine()
            .merge_at(
                &doc,
                &GeneratedAttrs::default(),
                &edit(&[(Field::Tags, false, "new"), (Field::Tags, true, "t0")]),
                MergeMode::Update,
                0,
            )
            .unwrap();
        assert_eq!(merged.tags.len(), 10);
        assert!(merged.tags.contains("new"));
    }

    #[test]
    fn test_emoji_limit() {
        let limits = TagLimits {
            max_emoji_per_file: 2,
            ..TagLimits::default()
        };
        let doc = doc_with(&[], &["😺", "🐶"]);
        let err = MergeEngine::new(limits)
            .merge_at(
                &doc,
                &GeneratedAttrs::default(),
                &edit(&[(Field::Emoji, false, "🦊")]),
                MergeMode::Update,
                0,
            )
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::LimitExceeded {
                field: Field::Emoji,
                limit: 2
            }
        );
    }

    #[test]
    fn test_tag_length_checked_in_replace_mode() {
        let doc = doc_with(&[], &[]);
        let long = "x".repeat(33);
        let err = engine()
            .merge_at(
                &doc,
                &GeneratedAttrs::default(),
                &edit(&[(Field::Tags, false, long.as_str())]),
                MergeMode::Replace,
                0,
            )
            .unwrap_err();
        assert_eq!(err, MergeError::TagTooLong { tag: long, max: 32 });
    }

    #[test]
    fn test_replace_mode_overwrites_sets() {
        let doc = doc_with(&["old", "stale"], &["😺"]);
        let merged = engine()
            .merge_at(
                &doc,
                &GeneratedAttrs::default(),
                &edit(&[(Field::Tags, false, "fresh"), (Field::Tags, true, "fresh")]),
                MergeMode::Replace,
                0,
            )
            .unwrap();
        assert_eq!(merged.tags, set(&["fresh"]));
        assert!(merged.emoji.is_empty());
    }

    #[test]
    fn test_user_emoji_beat_pack_emoji() {
        let attrs = GeneratedAttrs {
            pack_name: Some("Cats".to_string()),
            emoji: Some(set(&["🐱"])),
            ..GeneratedAttrs::default()
        };

        let authored = doc_with(&[], &["😺"]);
        let merged = engine()
            .merge_at(&authored, &attrs, &ParsedQuery::default(), MergeMode::Update, 0)
            .unwrap();
        assert_eq!(merged.emoji, set(&["😺"]));
        assert_eq!(merged.pack_name.as_deref(), Some("Cats"));

        let blank = doc_with(&[], &[]);
        let merged = engine()
            .merge_at(&blank, &attrs, &ParsedQuery::default(), MergeMode::Update, 0)
            .unwrap();
        assert_eq!(merged.emoji, set(&["🐱"]));
    }
}
