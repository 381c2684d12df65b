//! Canonical predicate fields.

use serde::{Deserialize, Serialize};

/// A field a query predicate can target.
///
/// The variant names map one-to-one onto stored document fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Tags,
    Emoji,
    Title,
    Filename,
    PackName,
    PackLink,
    Ext,
    Type,
    IsAnimated,
}

/// How a field's values are compared against a query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Whole-value comparison (keyword fields)
    Exact,
    /// Analyzed text, every query word must appear
    FullText,
    /// Boolean flag
    Flag,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Tags,
        Field::Emoji,
        Field::Title,
        Field::Filename,
        Field::PackName,
        Field::PackLink,
        Field::Ext,
        Field::Type,
        Field::IsAnimated,
    ];

    /// Name of the stored document field.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Tags => "tags",
            Field::Emoji => "emoji",
            Field::Title => "title",
            Field::Filename => "filename",
            Field::PackName => "pack_name",
            Field::PackLink => "pack_link",
            Field::Ext => "ext",
            Field::Type => "type",
            Field::IsAnimated => "is_animated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == s)
    }

    pub fn match_kind(&self) -> MatchKind {
        match self {
            Field::Title | Field::Filename | Field::PackName => MatchKind::FullText,
            Field::IsAnimated => MatchKind::Flag,
            Field::Tags | Field::Emoji | Field::PackLink | Field::Ext | Field::Type => {
                MatchKind::Exact
            }
        }
    }

    /// Whether users may add or remove values of this field directly.
    pub fn is_user_editable(&self) -> bool {
        matches!(self, Field::Tags | Field::Emoji)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
