//! Desired index schema and its content hash.
//!
//! The schema document has two top-level sections, `settings` and
//! `mappings`, in Elasticsearch vocabulary. Its canonical serialization
//! (sorted keys, `", "` and `": "` separators, non-ASCII escaped as
//! `\uXXXX`) is hashed with SHA-256; a changed hash triggers a migration.
//! The canonical form matches the hash records written by earlier
//! deployments, so upgrading does not force a spurious reindex.

use std::fmt::Write as _;
use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::BackendError;

const BUILTIN_SCHEMA: &str = include_str!("../schema/index.json");

/// Field types the document mappings can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedType {
    /// Exact-match string, optionally lowercased
    Keyword { lowercase: bool },
    /// Analyzed full text
    Text,
    Long,
    Boolean,
}

/// The `{settings, mappings}` document an index is created from.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    value: Value,
    hash: String,
}

impl SchemaDocument {
    /// The schema compiled into the binary.
    pub fn builtin() -> Result<Self, BackendError> {
        Self::from_json(BUILTIN_SCHEMA)
    }

    pub fn from_json(text: &str) -> Result<Self, BackendError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, BackendError> {
        for section in ["settings", "mappings"] {
            if !value.get(section).is_some_and(Value::is_object) {
                return Err(BackendError::InvalidSchema(format!(
                    "missing \"{}\" object",
                    section
                )));
            }
        }
        let hash = schema_hash(&value);
        Ok(Self { value, hash })
    }

    /// Load a schema override from disk.
    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn settings(&self) -> &Value {
        &self.value["settings"]
    }

    pub fn mappings(&self) -> &Value {
        &self.value["mappings"]
    }

    /// Hex SHA-256 of the canonical serialization.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// The document to create an index from, with the hash recorded under
    /// `mappings._meta.schema_hash` so backend state reports it.
    pub fn stamped(&self) -> Value {
        let mut value = self.value.clone();
        let mappings = &mut value["mappings"];
        if !mappings.get("_meta").is_some_and(Value::is_object) {
            mappings["_meta"] = Value::Object(Default::default());
        }
        mappings["_meta"]["schema_hash"] = Value::String(self.hash.clone());
        value
    }

    /// Declared field types from `mappings.properties`.
    ///
    /// Unsupported types are left out.
    pub fn fields(&self) -> Vec<(String, MappedType)> {
        mapped_fields(self.mappings())
    }
}

/// Field types declared in a mappings object.
pub fn mapped_fields(mappings: &Value) -> Vec<(String, MappedType)> {
    let Some(properties) = mappings.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .filter_map(|(name, spec)| {
            let mapped = match spec.get("type").and_then(Value::as_str)? {
                "keyword" => MappedType::Keyword {
                    lowercase: spec.get("normalizer").and_then(Value::as_str) == Some("lowercase"),
                },
                "text" => MappedType::Text,
                "long" | "integer" | "short" | "date" => MappedType::Long,
                "boolean" => MappedType::Boolean,
                _ => return None,
            };
            Some((name.clone(), mapped))
        })
        .collect()
}

/// Hex SHA-256 of a value's canonical serialization.
pub fn schema_hash(value: &Value) -> String {
    let canonical = canonical_json(value);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Serialize with sorted keys, spaced separators and ASCII-only output.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_ascii_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_ascii_string(key, out);
                out.push_str(": ");
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_ascii_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_canonical_form() {
        let value = json!({ "b": 1, "a": "é", "c": [1, 2, { "z": null, "y": true }] });
        assert_eq!(
            canonical_json(&value),
            r#"{"a": "\u00e9", "b": 1, "c": [1, 2, {"y": true, "z": null}]}"#
        );
    }

    #[test]
    fn test_hash_matches_recorded_format() {
        let value = json!({ "b": 1, "a": "é", "c": [1, 2, { "z": null, "y": true }] });
        assert_eq!(
            schema_hash(&value),
            "80feaf4c15a1a7a89749df63eebb02beaf0fe8cf0c3531bb4eb17f155a9346af"
        );

        let empty = json!({ "settings": {}, "mappings": {} });
        assert_eq!(
            schema_hash(&empty),
            "817f81ad9defd4b527ed354a75b6d9b5a8fad9c2f7e2c48a6fbb6c5ade1ccdfe"
        );
    }

    #[test]
    fn test_astral_chars_use_surrogate_pairs() {
        assert_eq!(canonical_json(&json!("😺\n\"")), r#""\ud83d\ude3a\n\"""#);
    }

    #[test]
    fn test_hash_ignores_key_order() {
        let a = SchemaDocument::from_json(r#"{"settings": {"x": 1, "y": 2}, "mappings": {}}"#).unwrap();
        let b = SchemaDocument::from_json(r#"{"mappings": {}, "settings": {"y": 2, "x": 1}}"#).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = SchemaDocument::from_json(r#"{"settings": {}, "mappings": {}}"#).unwrap();
        let b = SchemaDocument::from_json(r#"{"settings": {"x": 1}, "mappings": {}}"#).unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_missing_sections_rejected() {
        assert!(matches!(
            SchemaDocument::from_json(r#"{"settings": {}}"#),
            Err(BackendError::InvalidSchema(_))
        ));
        assert!(SchemaDocument::from_json("not json").is_err());
    }

    #[test]
    fn test_builtin_schema_fields() {
        let schema = SchemaDocument::builtin().unwrap();
        let fields = schema.fields();
        assert!(fields.contains(&("tags".to_string(), MappedType::Keyword { lowercase: true })));
        assert!(fields.contains(&("title".to_string(), MappedType::Text)));
        assert!(fields.contains(&("last_used".to_string(), MappedType::Long)));
        assert!(fields.contains(&("is_animated".to_string(), MappedType::Boolean)));
        assert_eq!(schema.hash().len(), 64);
    }

    #[test]
    fn test_stamped_keeps_hash_input_unchanged() {
        let schema = SchemaDocument::builtin().unwrap();
        let stamped = schema.stamped();
        assert_eq!(stamped["mappings"]["_meta"]["schema_hash"], schema.hash());
        assert!(schema.mappings().get("_meta").is_none());
        assert_eq!(stamped["settings"], *schema.settings());
    }
}
