//! Configuration loading for tagbot.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/tagbot/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TagbotError;

/// Hard limits applied to tagging and searching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLimits {
    /// Longest accepted tag, in characters.
    #[serde(default = "default_max_tag_length")]
    pub max_tag_length: usize,

    #[serde(default = "default_max_tags_per_file")]
    pub max_tags_per_file: usize,

    #[serde(default = "default_max_emoji_per_file")]
    pub max_emoji_per_file: usize,

    /// Number of distinct media items one owner may tag.
    #[serde(default = "default_max_media_per_user")]
    pub max_media_per_user: u64,

    /// Search results per page. The messaging platform caps this at 50.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_max_tag_length() -> usize {
    32
}

fn default_max_tags_per_file() -> usize {
    10
}

fn default_max_emoji_per_file() -> usize {
    48
}

fn default_max_media_per_user() -> u64 {
    1000
}

fn default_page_size() -> usize {
    50
}

impl Default for TagLimits {
    fn default() -> Self {
        Self {
            max_tag_length: default_max_tag_length(),
            max_tags_per_file: default_max_tags_per_file(),
            max_emoji_per_file: default_max_emoji_per_file(),
            max_media_per_user: default_max_media_per_user(),
            page_size: default_page_size(),
        }
    }
}

impl TagLimits {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tag_length == 0 {
            return Err("max_tag_length must be > 0".to_string());
        }
        if self.page_size == 0 || self.page_size > 50 {
            return Err(format!("page_size must be 1-50, got {}", self.page_size));
        }
        Ok(())
    }
}

/// Which search backend the daemon talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Remote Elasticsearch cluster (default)
    #[default]
    Elastic,
    /// Tantivy index on local disk
    Embedded,
}

/// Elasticsearch connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticSettings {
    #[serde(default = "default_elastic_url")]
    pub url: String,

    #[serde(default = "default_elastic_username")]
    pub username: String,

    /// Service user password (set via env var, not the config file)
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// When set, startup provisions the service role and user.
    #[serde(default)]
    pub admin_password: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_elastic_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_elastic_username() -> String {
    "tagbot".to_string()
}

fn default_admin_username() -> String {
    "elastic".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ElasticSettings {
    fn default() -> Self {
        Self {
            url: default_elastic_url(),
            username: default_elastic_username(),
            password: None,
            admin_username: default_admin_username(),
            admin_password: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Names of the indices the system manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNames {
    #[serde(default = "default_main_index")]
    pub main: String,

    /// Temporary copy of the main index during schema migration
    #[serde(default = "default_backup_index")]
    pub backup: String,

    /// Disposable index holding ownership-transfer state
    #[serde(default = "default_transfer_index")]
    pub transfer: String,
}

fn default_main_index() -> String {
    "tagbot".to_string()
}

fn default_backup_index() -> String {
    "tagbot_tmp".to_string()
}

fn default_transfer_index() -> String {
    "tagbot_transfer".to_string()
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            main: default_main_index(),
            backup: default_backup_index(),
            transfer: default_transfer_index(),
        }
    }
}

impl IndexNames {
    pub fn all(&self) -> [&str; 3] {
        [&self.main, &self.backup, &self.transfer]
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub elastic: ElasticSettings,

    /// Directory holding embedded (Tantivy) indices
    #[serde(default = "default_embedded_path")]
    pub embedded_path: String,

    /// Memory budget for the embedded index writer, in MB
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,

    #[serde(default)]
    pub indices: IndexNames,

    /// Optional schema document overriding the built-in one
    #[serde(default)]
    pub schema_path: Option<String>,

    /// Where the hash of the last applied schema is recorded
    #[serde(default = "default_hash_path")]
    pub hash_path: String,

    /// Upper bound on waiting for a cloned index to become healthy
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    #[serde(default)]
    pub limits: TagLimits,

    #[serde(default = "default_pack_cache_capacity")]
    pub pack_cache_capacity: usize,

    #[serde(default = "default_query_cache_capacity")]
    pub query_cache_capacity: usize,

    /// Where each owner's last search query is kept between runs
    #[serde(default = "default_history_path")]
    pub history_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn data_dir() -> PathBuf {
    ProjectDirs::from("", "", "tagbot")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn default_embedded_path() -> String {
    data_dir().join("index").to_string_lossy().to_string()
}

fn default_writer_memory_mb() -> usize {
    50
}

fn default_hash_path() -> String {
    data_dir().join("settings.hash").to_string_lossy().to_string()
}

fn default_history_path() -> String {
    data_dir().join("last_queries.json").to_string_lossy().to_string()
}

fn default_health_timeout_secs() -> u64 {
    30
}

fn default_pack_cache_capacity() -> usize {
    1024
}

fn default_query_cache_capacity() -> usize {
    128
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            elastic: ElasticSettings::default(),
            embedded_path: default_embedded_path(),
            writer_memory_mb: default_writer_memory_mb(),
            indices: IndexNames::default(),
            schema_path: None,
            hash_path: default_hash_path(),
            health_timeout_secs: default_health_timeout_secs(),
            limits: TagLimits::default(),
            pack_cache_capacity: default_pack_cache_capacity(),
            query_cache_capacity: default_query_cache_capacity(),
            history_path: default_history_path(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/tagbot/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (TAGBOT_*, nested keys joined with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TagbotError> {
        let config_dir = ProjectDirs::from("", "", "tagbot")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("embedded_path", default_embedded_path())
            .map_err(|e| TagbotError::Config(e.to_string()))?
            .set_default("hash_path", default_hash_path())
            .map_err(|e| TagbotError::Config(e.to_string()))?
            .set_default("history_path", default_history_path())
            .map_err(|e| TagbotError::Config(e.to_string()))?
            .set_default("health_timeout_secs", default_health_timeout_secs() as i64)
            .map_err(|e| TagbotError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| TagbotError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // TAGBOT_LOG_LEVEL, TAGBOT_ELASTIC__PASSWORD, TAGBOT_LIMITS__PAGE_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("TAGBOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TagbotError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TagbotError::Config(e.to_string()))?;

        settings.limits.validate().map_err(TagbotError::Config)?;
        Ok(settings)
    }

    pub fn health_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.health_timeout_secs)
    }

    /// Expand ~ in a configured path to the home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new() {
                return home.home_dir().join(rest);
            }
        }
        PathBuf::from(path)
    }
}
