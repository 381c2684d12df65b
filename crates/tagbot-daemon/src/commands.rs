//! Command implementations for the tagbot binary.
//!
//! Handles:
//! - init: provisioning, main index migration, transfer index reset
//! - status: backend index state and schema hashes
//! - parse/search/tag/show/delete/select: operator access to the core

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use tagbot_query::{FieldTable, QueryParser};
use tagbot_search::{
    DocumentStore, ElasticBackend, ElasticConfig, ElasticProvisioner, EmbeddedBackend,
    EmbeddedConfig, FileHashStore, IndexState, MigrationReport, QueryHistory, SchemaDocument,
    SchemaHashStore, SearchBackend, SearchIndexClient, SearchPage, Startup,
};
use tagbot_tagging::{
    describe_document, PackCache, StaticPackSource, StickerPack, TagReply, TagRequest,
    TaggingService,
};
use tagbot_types::{BackendKind, MediaFile, Settings};

use crate::cli::Commands;

/// CLI flags that override loaded settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<BackendKind>,
    pub elastic_url: Option<String>,
    pub embedded_path: Option<String>,
    pub log_level: Option<String>,
}

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(config_path: Option<&str>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(backend) = overrides.backend {
        settings.backend = backend;
    }
    if let Some(url) = &overrides.elastic_url {
        settings.elastic.url = url.clone();
    }
    if let Some(path) = &overrides.embedded_path {
        settings.embedded_path = path.clone();
    }
    if let Some(level) = &overrides.log_level {
        settings.log_level = level.clone();
    }
    Ok(settings)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Desired schema: the configured override file, or the built-in document.
pub fn load_schema(settings: &Settings) -> Result<SchemaDocument> {
    match &settings.schema_path {
        Some(path) => {
            let path = Settings::expand_path(path);
            SchemaDocument::load(&path)
                .with_context(|| format!("Failed to load schema from {:?}", path))
        }
        None => SchemaDocument::builtin().context("Built-in schema is invalid"),
    }
}

/// Connect to the configured backend.
pub fn open_backend(settings: &Settings) -> Result<Arc<dyn SearchBackend>> {
    match settings.backend {
        BackendKind::Elastic => {
            let config = ElasticConfig::from_settings(&settings.elastic);
            let backend = ElasticBackend::new(config).context("Failed to build HTTP client")?;
            Ok(Arc::new(backend))
        }
        BackendKind::Embedded => {
            let root = Settings::expand_path(&settings.embedded_path);
            info!(path = ?root, "Using embedded backend");
            let config = EmbeddedConfig::new(root).with_memory_mb(settings.writer_memory_mb);
            let backend = EmbeddedBackend::new(config).context("Failed to open embedded index")?;
            Ok(Arc::new(backend))
        }
    }
}

/// Index state and hashes as shown by `status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub backend: &'static str,
    pub desired_hash: String,
    pub recorded_hash: Option<String>,
    pub indices: Vec<IndexStatus>,
}

#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub name: String,
    #[serde(flatten)]
    pub state: IndexState,
}

/// Everything the commands need, wired once.
pub struct App {
    settings: Settings,
    backend: Arc<dyn SearchBackend>,
    parser: Arc<QueryParser>,
    search: SearchIndexClient,
}

impl App {
    pub fn new(settings: Settings, backend: Arc<dyn SearchBackend>) -> Result<Self> {
        let parser = Arc::new(QueryParser::new(FieldTable::default(), &settings.limits));
        let history_path = Settings::expand_path(&settings.history_path);
        let history = QueryHistory::open(&history_path, settings.query_cache_capacity)
            .with_context(|| format!("Failed to load query history from {:?}", history_path))?;
        let search = SearchIndexClient::new(Arc::clone(&backend), settings.indices.main.clone())
            .with_page_size(settings.limits.page_size)
            .with_history(history);
        Ok(Self {
            settings,
            backend,
            parser,
            search,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn hash_store(&self) -> FileHashStore {
        FileHashStore::new(Settings::expand_path(&self.settings.hash_path))
    }

    fn store(&self) -> DocumentStore {
        DocumentStore::new(Arc::clone(&self.backend), self.settings.indices.main.clone())
    }

    fn tagging(&self, packs: Vec<StickerPack>) -> TaggingService {
        let packs = PackCache::new(
            Arc::new(StaticPackSource::new(packs)),
            self.settings.pack_cache_capacity,
        );
        TaggingService::new(
            self.store(),
            packs,
            Arc::clone(&self.parser),
            self.settings.limits.clone(),
        )
    }

    /// Run the startup sequence.
    pub async fn init(&self) -> Result<MigrationReport> {
        let schema = load_schema(&self.settings)?;
        let mut startup = Startup::new(
            Arc::clone(&self.backend),
            Arc::new(self.hash_store()),
            schema,
            self.settings.indices.clone(),
        )
        .with_health_timeout(self.settings.health_timeout());

        if self.settings.backend == BackendKind::Elastic {
            if let Some(admin) = ElasticConfig::admin_from_settings(&self.settings.elastic) {
                let service = ElasticConfig::from_settings(&self.settings.elastic);
                let provisioner = ElasticProvisioner::new(admin, &service)
                    .context("Failed to set up user provisioning")?;
                startup = startup.with_provisioner(Arc::new(provisioner));
            }
        }

        match startup.run().await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(error = %e, conflict = e.is_conflict(), timeout = e.is_timeout(), "Startup failed");
                Err(e).context("Index initialization failed")
            }
        }
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let schema = load_schema(&self.settings)?;
        let recorded_hash = self
            .hash_store()
            .load()
            .context("Failed to read recorded schema hash")?;

        let mut indices = Vec::new();
        for name in self.settings.indices.all() {
            let state = self
                .backend
                .index_state(name)
                .await
                .with_context(|| format!("Failed to read state of index {}", name))?;
            indices.push(IndexStatus {
                name: name.to_string(),
                state,
            });
        }

        Ok(StatusReport {
            backend: self.backend.name(),
            desired_hash: schema.hash().to_string(),
            recorded_hash,
            indices,
        })
    }

    /// Fail unless the main index exists with the desired schema applied.
    ///
    /// Data commands must not reach an index `init` has not migrated.
    pub async fn ensure_ready(&self) -> Result<()> {
        let schema = load_schema(&self.settings)?;
        let main = &self.settings.indices.main;
        let state = self
            .backend
            .index_state(main)
            .await
            .with_context(|| format!("Failed to read state of index {}", main))?;

        if !state.exists {
            bail!("Index {} does not exist; run `tagbot init`", main);
        }
        if state.schema_hash.as_deref() != Some(schema.hash()) {
            bail!(
                "Index {} is not on the current schema ({}); run `tagbot init`",
                main,
                schema.hash()
            );
        }
        if state.write_blocked {
            bail!("Index {} is write-blocked by an unfinished migration; run `tagbot init`", main);
        }
        Ok(())
    }

    /// Describe how the owner's last search query parses.
    pub fn parse_last(&self, owner: i64) -> String {
        match self.search.history().last_query(owner) {
            Some(text) => self.parser.parse_query(&text).describe(),
            None => "No previous query found.".to_string(),
        }
    }

    pub async fn search(&self, owner: i64, text: &str, offset: usize) -> Result<SearchPage> {
        if let Err(e) = self.search.history().remember(owner, text) {
            warn!(owner, error = %e, "Failed to record last query");
        }
        let parsed = self.parser.parse_query(text);
        let page = self
            .search
            .search(owner, &parsed.query, offset)
            .await
            .context("Search failed")?;
        Ok(page)
    }

    /// Apply a tag edit to the media described in `media_path`.
    pub async fn tag(
        &self,
        owner: i64,
        media_path: &Path,
        packs_path: Option<&Path>,
        replace: bool,
        text: &str,
    ) -> Result<TagReply> {
        let media: MediaFile = read_json(media_path)?;
        let packs: Vec<StickerPack> = match packs_path {
            Some(path) => read_json(path)?,
            None => Vec::new(),
        };
        let service = self.tagging(packs);

        let reply = if replace {
            service.handle_replace(owner, &media, text).await
        } else {
            service
                .handle_message(TagRequest {
                    owner,
                    text: text.to_string(),
                    reply: Some(media),
                })
                .await
        };
        reply.context("Tagging failed")
    }

    /// Run one command and return its text output.
    pub async fn run(&self, command: Commands) -> Result<String> {
        if command.needs_index() {
            self.ensure_ready().await?;
        }
        match command {
            Commands::Init => {
                let report = self.init().await?;
                let outcome = if report.migrated { "applied" } else { "unchanged" };
                Ok(format!(
                    "Schema {} {} ({} documents restored)",
                    report.schema_hash, outcome, report.restored
                ))
            }
            Commands::Status => {
                let report = self.status().await?;
                serde_json::to_string_pretty(&report).context("Failed to render status")
            }
            Commands::Parse {
                last: true,
                owner: Some(owner),
                ..
            } => Ok(self.parse_last(owner)),
            Commands::Parse { last: true, .. } => bail!("--last needs --owner"),
            Commands::Parse { tags, text, .. } => {
                let text = text.join(" ");
                let parsed = if tags {
                    self.parser.parse_tags(&text)
                } else {
                    self.parser.parse_query(&text)
                };
                Ok(parsed.describe())
            }
            Commands::Search {
                owner,
                offset,
                text,
            } => {
                let page = self.search(owner, &text.join(" "), offset).await?;
                Ok(render_page(&page))
            }
            Commands::Tag {
                owner,
                media,
                packs,
                replace,
                text,
            } => {
                let reply = self
                    .tag(
                        owner,
                        Path::new(&media),
                        packs.as_deref().map(Path::new),
                        replace,
                        &text.join(" "),
                    )
                    .await?;
                Ok(match reply {
                    TagReply::Ignored => "Nothing to do.".to_string(),
                    TagReply::Rejected(message) => message,
                    TagReply::Tagged { document, warnings } => {
                        let mut lines: Vec<String> =
                            warnings.iter().map(|w| format!("warning: {}", w)).collect();
                        lines.push(describe_document(&document, self.parser.fields()));
                        lines.join("\n")
                    }
                })
            }
            Commands::Show { owner, id } => {
                let doc = self.store().get(owner, id).await.context("Lookup failed")?;
                Ok(match doc {
                    Some(doc) => describe_document(&doc, self.parser.fields()),
                    None => "No tags found.".to_string(),
                })
            }
            Commands::Delete { owner, id } => {
                let deleted = self.store().delete(owner, id).await.context("Delete failed")?;
                Ok(if deleted { "Media deleted." } else { "Media not found." }.to_string())
            }
            Commands::Select { owner, id } => {
                let found = self
                    .search
                    .record_selection(owner, id)
                    .await
                    .context("Failed to record selection")?;
                Ok(if found { "Selection recorded." } else { "Media not found." }.to_string())
            }
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))
}

fn render_page(page: &SearchPage) -> String {
    if page.documents.is_empty() {
        return "No results.".to_string();
    }
    let mut lines: Vec<String> = Vec::with_capacity(page.documents.len() + 2);
    if let Some(kind) = page.result_kind {
        let layout = if page.gallery { "gallery" } else { "list" };
        lines.push(format!("as {} {}", kind, layout));
    }
    lines.extend(page.documents.iter().map(|doc| {
        let tags = doc.tags.iter().cloned().collect::<Vec<_>>().join(" ");
        format!("{}\t{}\t{}", doc.id, doc.kind, tags)
    }));
    lines.push(match page.next_offset {
        Some(next) => format!("next offset: {}", next),
        None => "(last page)".to_string(),
    });
    lines.join("\n")
}
