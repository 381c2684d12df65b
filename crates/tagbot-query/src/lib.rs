//! # tagbot-query
//!
//! Turns raw message text into structured, validated field predicates.
//!
//! ## Syntax
//! - Whitespace separates tokens; every token is one predicate
//! - A leading `!` or `-` negates the token (remove when tagging, exclude
//!   when searching)
//! - `alias:value` targets a specific field, e.g. `t:hello`, `type:gif`
//! - Bare tokens made only of emoji target `emoji`, everything else `tags`
//!
//! Parsing never fails. Tokens that cannot be interpreted are dropped and
//! reported as human-readable warnings.

pub mod emoji;
pub mod fields;
pub mod parser;

pub use emoji::{is_emoji, split_emoji};
pub use fields::FieldTable;
pub use parser::{ParseResult, ParsedQuery, QueryParser};
