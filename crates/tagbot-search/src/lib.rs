//! # tagbot-search
//!
//! Search index access for tagbot.
//!
//! ## Features
//! - [`SearchBackend`] capability trait with Elasticsearch, embedded Tantivy
//!   and in-memory implementations
//! - Schema document with a canonical content hash
//! - Blue-green schema migration driven by that hash ([`IndexLifecycleManager`])
//! - Owner-scoped document storage and paged search

pub mod backend;
pub mod client;
pub mod elastic;
pub mod embedded;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod schema;
pub mod startup;
pub mod store;

pub use backend::{
    Clause, HealthStatus, IndexState, SearchBackend, SearchRequest, SortKey, WRITE_BLOCK_SETTING,
};
pub use client::{QueryHistory, SearchIndexClient, SearchPage, DEFAULT_PAGE_SIZE};
pub use elastic::{ElasticBackend, ElasticConfig, ElasticProvisioner};
pub use embedded::{EmbeddedBackend, EmbeddedConfig};
pub use error::{BackendError, LifecycleError};
pub use lifecycle::{
    FileHashStore, IndexLifecycleManager, LifecyclePhase, MemoryHashStore, MigrationReport,
    SchemaHashStore,
};
pub use memory::{BackendCall, MemoryBackend};
pub use schema::{canonical_json, schema_hash, MappedType, SchemaDocument};
pub use startup::{reset_transfer_index, AccessProvisioner, Startup};
pub use store::{owner_clause, DocumentStore};
