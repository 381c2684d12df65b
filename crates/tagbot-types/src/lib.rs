//! # tagbot-types
//!
//! Shared domain types for the tagbot system.
//!
//! This crate defines the core data structures used throughout the system:
//! - Documents: one owner's tagging record for one media item
//! - Media: the closed set of media kinds and the descriptor supplied by
//!   the messaging front-end
//! - Fields: the canonical predicate fields a query can target
//! - Settings: layered configuration and tagging limits
//! - Cache: a bounded LRU cache owned by whichever component needs one

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod field;
pub mod media;

pub use cache::BoundedCache;
pub use config::{BackendKind, ElasticSettings, IndexNames, Settings, TagLimits};
pub use document::{GeneratedAttrs, TaggedDocument};
pub use error::TagbotError;
pub use field::{Field, MatchKind};
pub use media::{DocumentAttribute, MediaFile, MediaKind, MediaShape, StickerSetRef};
