//! Query and tag parsing.
//!
//! Both modes share one tokenizer. Search mode accepts every field the
//! alias table knows; tag mode only fills the user-editable buckets
//! (`tags`, `emoji`) and reports anything else as a warning.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use tagbot_types::{Field, MediaKind, TagLimits};

use crate::emoji::split_emoji;
use crate::fields::FieldTable;

/// Structured predicates keyed by `(field, negated)`.
///
/// Values are deduplicated; the first-seen order is kept for display only.
/// Built once by the parser (or [`ParsedQuery::from_pairs`]) and never
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    fields: BTreeMap<(Field, bool), Vec<String>>,
}

impl ParsedQuery {
    /// Build a query from `(field, negated, value)` triples.
    ///
    /// Values are taken verbatim; no alias resolution or validation.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Field, bool, S)>,
        S: Into<String>,
    {
        let mut query = Self::default();
        for (field, negated, value) in pairs {
            query.push(field, negated, value.into());
        }
        query
    }

    fn push(&mut self, field: Field, negated: bool, value: String) {
        let values = self.fields.entry((field, negated)).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Values for a key in first-seen order. Empty when the key is absent.
    pub fn values(&self, field: Field, negated: bool) -> &[String] {
        self.fields
            .get(&(field, negated))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Values for a key as a set.
    pub fn get(&self, field: Field, negated: bool) -> BTreeSet<String> {
        self.values(field, negated).iter().cloned().collect()
    }

    pub fn get_first(&self, field: Field, negated: bool) -> Option<&str> {
        self.values(field, negated).first().map(String::as_str)
    }

    pub fn contains_key(&self, field: Field, negated: bool) -> bool {
        self.fields.contains_key(&(field, negated))
    }

    /// Iterate over `(field, negated, values)` in field order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, bool, &[String])> {
        self.fields
            .iter()
            .map(|((field, negated), values)| (*field, *negated, values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of `(field, negated)` keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Render one line per field, negated values prefixed with `!`.
    pub fn describe(&self) -> String {
        let mut lines: BTreeMap<Field, Vec<String>> = BTreeMap::new();
        for (field, negated, values) in self.iter() {
            let line = lines.entry(field).or_default();
            for value in values {
                if negated {
                    line.push(format!("!{}", value));
                } else {
                    line.push(value.clone());
                }
            }
        }

        lines
            .into_iter()
            .map(|(field, values)| format!("{}: {}", field, values.join(" ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parser output: predicates plus warnings for every dropped token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    pub query: ParsedQuery,
    pub warnings: Vec<String>,
}

impl ParseResult {
    /// Human-readable dump for query debugging. Warnings come first.
    pub fn describe(&self) -> String {
        let mut out: Vec<String> = self
            .warnings
            .iter()
            .map(|w| format!("warning: {}", w))
            .collect();

        if self.query.is_empty() {
            out.push("(empty query)".to_string());
        } else {
            out.push(self.query.describe());
        }
        out.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Search,
    Tagging,
}

/// Tokenizer and validator for search queries and tag edits.
#[derive(Debug, Clone)]
pub struct QueryParser {
    fields: FieldTable,
    max_tag_length: usize,
}

impl QueryParser {
    pub fn new(fields: FieldTable, limits: &TagLimits) -> Self {
        Self {
            fields,
            max_tag_length: limits.max_tag_length,
        }
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn max_tag_length(&self) -> usize {
        self.max_tag_length
    }

    /// Parse a search query. Alias for [`QueryParser::parse_query`].
    pub fn parse(&self, text: &str) -> ParseResult {
        self.parse_query(text)
    }

    /// Parse a search query; every known field may be targeted.
    pub fn parse_query(&self, text: &str) -> ParseResult {
        self.run(text, Mode::Search)
    }

    /// Parse a tag edit; only `tags` and `emoji` are collected.
    ///
    /// Over-long tags are kept so the merge step can reject the whole edit.
    pub fn parse_tags(&self, text: &str) -> ParseResult {
        self.run(text, Mode::Tagging)
    }

    fn run(&self, text: &str, mode: Mode) -> ParseResult {
        let mut result = ParseResult::default();
        let mut tokens = 0usize;

        for token in text.split_whitespace() {
            tokens += 1;
            self.parse_token(token, mode, &mut result);
        }

        debug!(
            tokens,
            keys = result.query.len(),
            warnings = result.warnings.len(),
            ?mode,
            "Parsed query text"
        );
        result
    }

    fn parse_token(&self, token: &str, mode: Mode, out: &mut ParseResult) {
        let (negated, body) = match token.strip_prefix(['!', '-']) {
            Some(rest) => (true, rest),
            None => (false, token),
        };

        if body.is_empty() {
            out.warnings
                .push(format!("\"{}\" has nothing after the negation", token));
            return;
        }

        if let Some((alias, value)) = body.split_once(':') {
            let Some(field) = self.fields.resolve(alias) else {
                out.warnings.push(format!("Unknown field \"{}\"", alias));
                return;
            };
            if value.is_empty() {
                out.warnings.push(format!("Missing value for \"{}\"", alias));
                return;
            }
            if mode == Mode::Tagging && !field.is_user_editable() {
                out.warnings
                    .push(format!("\"{}\" is generated and cannot be edited", field));
                return;
            }
            self.push_value(field, negated, value, mode, out);
            return;
        }

        if split_emoji(body).is_some() {
            self.push_value(Field::Emoji, negated, body, mode, out);
        } else {
            self.push_value(Field::Tags, negated, body, mode, out);
        }
    }

    fn push_value(&self, field: Field, negated: bool, value: &str, mode: Mode, out: &mut ParseResult) {
        match field {
            Field::Tags => {
                let tag = value.to_lowercase();
                if mode == Mode::Search && tag.chars().count() > self.max_tag_length {
                    out.warnings.push(format!(
                        "Tag \"{}\" is longer than {} characters",
                        tag, self.max_tag_length
                    ));
                    return;
                }
                out.query.push(field, negated, tag);
            }
            Field::Emoji => match split_emoji(value) {
                Some(emoji) => {
                    for e in emoji {
                        out.query.push(field, negated, e);
                    }
                }
                None => out.warnings.push(format!("\"{}\" is not an emoji", value)),
            },
            Field::Type => match MediaKind::parse(&value.to_lowercase()) {
                Some(kind) => out.query.push(field, negated, kind.as_str().to_string()),
                None => out
                    .warnings
                    .push(format!("Unknown media type \"{}\"", value)),
            },
            Field::IsAnimated => match parse_flag(value) {
                Some(flag) => out.query.push(field, negated, flag.to_string()),
                None => out
                    .warnings
                    .push(format!("Expected yes or no for {}, got \"{}\"", field, value)),
            },
            Field::Ext => {
                let ext = value.trim_start_matches('.').to_lowercase();
                if ext.is_empty() {
                    out.warnings.push(format!("Missing value for \"{}\"", field));
                    return;
                }
                out.query.push(field, negated, ext);
            }
            Field::Title | Field::Filename | Field::PackName | Field::PackLink => {
                out.query.push(field, negated, value.to_string());
            }
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser() -> QueryParser {
        QueryParser::new(FieldTable::default(), &TagLimits::default())
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bare_tags_and_negation() {
        let result = parser().parse_tags("cat cute !blurry");
        assert!(result.warnings.is_empty());
        assert_eq!(result.query.get(Field::Tags, false), set(&["cat", "cute"]));
        assert_eq!(result.query.get(Field::Tags, true), set(&["blurry"]));
    }

    #[test]
    fn test_dash_negates() {
        let result = parser().parse_query("cat -dog");
        assert_eq!(result.query.values(Field::Tags, false), ["cat"]);
        assert_eq!(result.query.values(Field::Tags, true), ["dog"]);
    }

    #[test]
    fn test_only_one_negation_marker_is_stripped() {
        let result = parser().parse_query("!!x");
        assert_eq!(result.query.values(Field::Tags, true), ["!x"]);
    }

    #[test]
    fn test_duplicates_collapse_keeping_first_order() {
        let result = parser().parse_query("b a b c a");
        assert_eq!(result.query.values(Field::Tags, false), ["b", "a", "c"]);
    }

    #[test]
    fn test_tags_are_lowercased() {
        let result = parser().parse_query("Cat CAT");
        assert_eq!(result.query.values(Field::Tags, false), ["cat"]);
    }

    #[test]
    fn test_bare_emoji_go_to_emoji_field() {
        let result = parser().parse_tags("😺🔥 cat -😿");
        assert_eq!(result.query.values(Field::Emoji, false), ["😺", "🔥"]);
        assert_eq!(result.query.values(Field::Emoji, true), ["😿"]);
        assert_eq!(result.query.values(Field::Tags, false), ["cat"]);
    }

    #[test]
    fn test_mixed_emoji_and_text_is_a_tag() {
        let result = parser().parse_query("cat😺");
        assert_eq!(result.query.values(Field::Tags, false), ["cat😺"]);
        assert!(result.query.values(Field::Emoji, false).is_empty());
    }

    #[test]
    fn test_aliases_resolve() {
        let result = parser().parse_query("t:hello p:Cats fn:report a:cats_by_bot e:😺");
        assert!(result.warnings.is_empty());
        assert_eq!(result.query.get_first(Field::Title, false), Some("hello"));
        assert_eq!(result.query.get_first(Field::PackName, false), Some("Cats"));
        assert_eq!(result.query.get_first(Field::Filename, false), Some("report"));
        assert_eq!(result.query.get_first(Field::PackLink, false), Some("cats_by_bot"));
        assert_eq!(result.query.get_first(Field::Emoji, false), Some("😺"));
    }

    #[test]
    fn test_unknown_alias_warns_and_drops() {
        let result = parser().parse_query("zz:top cat");
        assert_eq!(result.warnings, vec!["Unknown field \"zz\"".to_string()]);
        assert_eq!(result.query.len(), 1);
        assert_eq!(result.query.values(Field::Tags, false), ["cat"]);
    }

    #[test]
    fn test_missing_value_warns() {
        let result = parser().parse_query("t:");
        assert!(result.query.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_type_values_are_validated() {
        let result = parser().parse_query("type:PHOTO !type:gif type:hologram");
        assert_eq!(result.query.values(Field::Type, false), ["photo"]);
        assert_eq!(result.query.values(Field::Type, true), ["gif"]);
        assert_eq!(result.warnings, vec!["Unknown media type \"hologram\"".to_string()]);
    }

    #[test]
    fn test_animated_flag_values() {
        let result = parser().parse_query("anim:yes");
        assert_eq!(result.query.values(Field::IsAnimated, false), ["true"]);

        let result = parser().parse_query("anim:0");
        assert_eq!(result.query.values(Field::IsAnimated, false), ["false"]);

        let result = parser().parse_query("anim:maybe");
        assert!(result.query.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_ext_is_normalized() {
        let result = parser().parse_query("ext:.PDF");
        assert_eq!(result.query.values(Field::Ext, false), ["pdf"]);
    }

    #[test]
    fn test_search_drops_long_tags() {
        let long = "x".repeat(33);
        let result = parser().parse_query(&format!("{} ok", long));
        assert_eq!(result.query.values(Field::Tags, false), ["ok"]);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_tagging_keeps_long_tags_for_merge() {
        let long = "x".repeat(33);
        let result = parser().parse_tags(&long);
        assert!(result.warnings.is_empty());
        assert_eq!(result.query.values(Field::Tags, false), [long]);
    }

    #[test]
    fn test_tagging_rejects_generated_fields() {
        let result = parser().parse_tags("t:hello e:😺 tag:cat");
        assert_eq!(result.warnings.len(), 1);
        assert!(!result.query.contains_key(Field::Title, false));
        assert_eq!(result.query.values(Field::Emoji, false), ["😺"]);
        assert_eq!(result.query.values(Field::Tags, false), ["cat"]);
    }

    #[test]
    fn test_emoji_alias_requires_emoji() {
        let result = parser().parse_query("e:cat");
        assert!(result.query.is_empty());
        assert_eq!(result.warnings, vec!["\"cat\" is not an emoji".to_string()]);
    }

    #[test]
    fn test_lone_negation_marker_warns() {
        let result = parser().parse_query("- !");
        assert!(result.query.is_empty());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_parsing_is_total() {
        let inputs = [
            "",
            "   ",
            ":",
            "::",
            "!:",
            "-:x",
            "a:b:c",
            "http://example.com",
            "\u{200d}",
            "🏳️‍🌈 ! - t:: type:",
            "\t\n cat \r\n",
        ];
        for input in inputs {
            let result = parser().parse_query(input);
            let _ = result.describe();
            let result = parser().parse_tags(input);
            let _ = result.describe();
        }
    }

    #[test]
    fn test_value_may_contain_colons() {
        let result = parser().parse_query("t:a:b");
        assert_eq!(result.query.get_first(Field::Title, false), Some("a:b"));
    }

    #[test]
    fn test_describe() {
        let result = parser().parse_query("cat !dog type:gif zz:1");
        assert_eq!(
            result.describe(),
            "warning: Unknown field \"zz\"\ntags: cat !dog\ntype: gif"
        );
    }

    #[test]
    fn test_describe_empty() {
        assert_eq!(parser().parse_query("").describe(), "(empty query)");
    }

    #[test]
    fn test_from_pairs() {
        let query = ParsedQuery::from_pairs([
            (Field::Tags, false, "a"),
            (Field::Tags, false, "a"),
            (Field::Tags, true, "b"),
        ]);
        assert_eq!(query.values(Field::Tags, false), ["a"]);
        assert_eq!(query.get(Field::Tags, true), set(&["b"]));
    }
}
