//! Index lifecycle: schema migration by backup, recreate and restore.
//!
//! Runs once at startup, before any traffic is accepted:
//!
//! ```text
//! Idle -> Checking -> Done                         (hash unchanged, index present)
//! Idle -> Checking -> Aborted                      (backup index already exists)
//! Idle -> Checking -> [BackingUp] -> Recreating -> [Restoring] -> Cleanup -> Done
//! ```
//!
//! BackingUp and Restoring only happen when a main index existed. The new
//! schema hash is persisted in Cleanup, after every other step succeeded,
//! so an interrupted migration is retried in full on the next start.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use tagbot_types::IndexNames;

use crate::backend::SearchBackend;
use crate::error::{BackendError, LifecycleError};
use crate::schema::SchemaDocument;

/// Durable record of the last successfully applied schema hash.
pub trait SchemaHashStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, LifecycleError>;

    fn store(&self, hash: &str) -> Result<(), LifecycleError>;
}

/// Hash record kept in a plain text file.
#[derive(Debug, Clone)]
pub struct FileHashStore {
    path: PathBuf,
}

impl FileHashStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SchemaHashStore for FileHashStore {
    fn load(&self) -> Result<Option<String>, LifecycleError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let hash = text.trim();
                Ok((!hash.is_empty()).then(|| hash.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LifecycleError::HashStore(format!(
                "reading {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn store(&self, hash: &str) -> Result<(), LifecycleError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = self.path.with_extension("tmp");
            std::fs::write(&tmp, hash)?;
            std::fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            LifecycleError::HashStore(format!("writing {}: {}", self.path.display(), e))
        })
    }
}

/// Hash record held in memory.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    hash: Mutex<Option<String>>,
}

impl MemoryHashStore {
    pub fn new(initial: Option<&str>) -> Self {
        Self {
            hash: Mutex::new(initial.map(str::to_string)),
        }
    }
}

impl SchemaHashStore for MemoryHashStore {
    fn load(&self) -> Result<Option<String>, LifecycleError> {
        Ok(self.hash.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn store(&self, hash: &str) -> Result<(), LifecycleError> {
        *self.hash.lock().unwrap_or_else(|e| e.into_inner()) = Some(hash.to_string());
        Ok(())
    }
}

/// States of the migration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Idle,
    Checking,
    BackingUp,
    Recreating,
    Restoring,
    Cleanup,
    Done,
    Aborted,
}

/// What a completed migration did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Every phase entered, in order
    pub phases: Vec<LifecyclePhase>,
    /// False when nothing needed to change
    pub migrated: bool,
    /// Documents copied back from the backup
    pub restored: u64,
    pub schema_hash: String,
}

/// Drives the main index to the desired schema.
///
/// Not re-entrant: `migrate` takes `&mut self`, and a manager that reached
/// a terminal phase refuses to run again.
pub struct IndexLifecycleManager {
    backend: Arc<dyn SearchBackend>,
    hashes: Arc<dyn SchemaHashStore>,
    schema: SchemaDocument,
    indices: IndexNames,
    health_timeout: Duration,
    phase: LifecyclePhase,
    phases: Vec<LifecyclePhase>,
}

impl IndexLifecycleManager {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        hashes: Arc<dyn SchemaHashStore>,
        schema: SchemaDocument,
        indices: IndexNames,
    ) -> Self {
        Self {
            backend,
            hashes,
            schema,
            indices,
            health_timeout: Duration::from_secs(30),
            phase: LifecyclePhase::Idle,
            phases: vec![LifecyclePhase::Idle],
        }
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    fn enter(&mut self, phase: LifecyclePhase) {
        info!(from = ?self.phase, to = ?phase, index = %self.indices.main, "Index lifecycle transition");
        self.phase = phase;
        self.phases.push(phase);
    }

    fn report(&self, migrated: bool, restored: u64) -> MigrationReport {
        MigrationReport {
            phases: self.phases.clone(),
            migrated,
            restored,
            schema_hash: self.schema.hash().to_string(),
        }
    }

    /// Run the state machine to `Done` or `Aborted`.
    pub async fn migrate(&mut self) -> Result<MigrationReport, LifecycleError> {
        if self.phase != LifecyclePhase::Idle {
            return Err(LifecycleError::Backend(BackendError::InvalidState(format!(
                "lifecycle manager already ran (phase {:?})",
                self.phase
            ))));
        }

        match self.run().await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(error = %e, phase = ?self.phase, "Index migration failed");
                self.enter(LifecyclePhase::Aborted);
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<MigrationReport, LifecycleError> {
        self.enter(LifecyclePhase::Checking);

        let hash = self.schema.hash().to_string();
        let previous = self.hashes.load()?;
        info!(current = %hash, previous = ?previous, "Checking index schema hash");

        let main = self.indices.main.clone();
        let backup = self.indices.backup.clone();

        if self.backend.index_exists(&backup).await? {
            error!(index = %backup, "Backup index already exists");
            return Err(LifecycleError::BackupExists(backup));
        }

        let main_exists = self.backend.index_exists(&main).await?;
        if !main_exists {
            info!(index = %main, "Main index not found");
        }

        if main_exists && previous.as_deref() == Some(hash.as_str()) {
            self.enter(LifecyclePhase::Done);
            return Ok(self.report(false, 0));
        }
        info!(index = %main, "Index will be (re-)initialized");

        if main_exists {
            self.enter(LifecyclePhase::BackingUp);
            self.backend.block_writes(&main).await?;
            self.backend.clone_index(&main, &backup).await?;
            match self
                .backend
                .wait_for_health(&backup, self.health_timeout)
                .await
            {
                Ok(status) => info!(index = %backup, ?status, "Backup complete"),
                Err(BackendError::Timeout(reason)) => {
                    warn!(index = %backup, %reason, "Backup did not become healthy");
                    return Err(LifecycleError::HealthTimeout {
                        index: backup,
                        timeout_secs: self.health_timeout.as_secs(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.enter(LifecyclePhase::Recreating);
        if main_exists {
            self.backend.delete_index(&main).await?;
        }
        self.backend
            .create_index(&main, &self.schema.stamped())
            .await?;

        let mut restored = 0;
        if main_exists {
            self.enter(LifecyclePhase::Restoring);
            restored = self.backend.reindex(&backup, &main).await?;
            info!(index = %main, restored, "Restored backup");
            self.backend.delete_index(&backup).await?;
        }

        self.enter(LifecyclePhase::Cleanup);
        self.hashes.store(&hash)?;
        info!(hash = %hash, "Wrote new schema hash");

        self.enter(LifecyclePhase::Done);
        Ok(self.report(true, restored))
    }
}
