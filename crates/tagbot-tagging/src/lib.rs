//! # tagbot-tagging
//!
//! Write path for tagged documents.
//!
//! A tag message runs through an ordered [`Pipeline`] of checks, the
//! replied-to media is described by [`generated_attrs`], and the
//! [`MergeEngine`] folds the parsed edit into the stored document under the
//! configured capacity limits. [`TaggingService`] wires these together on
//! top of a [`tagbot_search::DocumentStore`].

pub mod attrs;
pub mod error;
pub mod merge;
pub mod packs;
pub mod pipeline;
pub mod service;

pub use attrs::{extension_for, generated_attrs};
pub use error::{MergeError, TagError};
pub use merge::{MergeEngine, MergeMode};
pub use packs::{PackCache, StaticPackSource, StickerPack, StickerPackSource};
pub use pipeline::{Halt, Pipeline, PreparedTag, Stage, TagContext, TagRequest};
pub use service::{describe_document, TagReply, TaggingService};
