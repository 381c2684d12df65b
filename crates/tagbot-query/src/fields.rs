//! Field alias table.
//!
//! Aliases only decide which predicate bucket a token lands in; they never
//! change stored data. The table is built once at startup and shared by
//! reference.

use std::collections::HashMap;

use tagbot_types::Field;

/// Immutable mapping from query aliases to canonical fields.
#[derive(Debug, Clone)]
pub struct FieldTable {
    aliases: HashMap<String, Field>,
    /// Preferred short alias per field, for display
    short: HashMap<Field, String>,
}

impl FieldTable {
    /// Build a table from `(alias, field)` pairs.
    ///
    /// Canonical field names are always accepted. The first alias listed
    /// for a field becomes its short display alias.
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        let mut table = Self {
            aliases: HashMap::new(),
            short: HashMap::new(),
        };

        for field in Field::ALL {
            table.aliases.insert(field.name().to_string(), field);
        }
        for (alias, field) in aliases {
            let alias = alias.into();
            table.short.entry(field).or_insert_with(|| alias.clone());
            table.aliases.insert(alias, field);
        }
        table
    }

    /// Resolve an alias or canonical name (case-insensitive).
    pub fn resolve(&self, alias: &str) -> Option<Field> {
        self.aliases
            .get(alias)
            .or_else(|| self.aliases.get(&alias.to_lowercase()))
            .copied()
    }

    /// Short alias for display, falling back to the canonical name.
    pub fn short_alias(&self, field: Field) -> &str {
        self.short
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.name())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::new([
            ("t", Field::Title),
            ("e", Field::Emoji),
            ("fn", Field::Filename),
            ("p", Field::PackName),
            ("a", Field::PackLink),
            ("tag", Field::Tags),
            ("name", Field::Filename),
            ("pack", Field::PackName),
            ("anim", Field::IsAnimated),
            ("animated", Field::IsAnimated),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_aliases() {
        let table = FieldTable::default();
        assert_eq!(table.resolve("t"), Some(Field::Title));
        assert_eq!(table.resolve("p"), Some(Field::PackName));
        assert_eq!(table.resolve("a"), Some(Field::PackLink));
        assert_eq!(table.resolve("fn"), Some(Field::Filename));
        assert_eq!(table.resolve("e"), Some(Field::Emoji));
        assert_eq!(table.resolve("x"), None);
    }

    #[test]
    fn test_canonical_names_resolve() {
        let table = FieldTable::new(Vec::<(String, Field)>::new());
        assert_eq!(table.resolve("type"), Some(Field::Type));
        assert_eq!(table.resolve("pack_link"), Some(Field::PackLink));
        assert_eq!(table.len(), Field::ALL.len());
    }

    #[test]
    fn test_resolve_ignores_case() {
        let table = FieldTable::default();
        assert_eq!(table.resolve("T"), Some(Field::Title));
        assert_eq!(table.resolve("TYPE"), Some(Field::Type));
    }

    #[test]
    fn test_short_alias_prefers_first_listed() {
        let table = FieldTable::default();
        assert_eq!(table.short_alias(Field::Filename), "fn");
        assert_eq!(table.short_alias(Field::PackName), "p");
        assert_eq!(table.short_alias(Field::Ext), "ext");
    }
}
