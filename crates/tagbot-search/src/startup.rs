//! Startup sequence: provisioning, main index migration, transfer reset.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use tagbot_types::IndexNames;

use crate::backend::SearchBackend;
use crate::error::LifecycleError;
use crate::lifecycle::{IndexLifecycleManager, MigrationReport, SchemaHashStore};
use crate::schema::SchemaDocument;

/// Grants the service account access to the managed indices.
#[async_trait]
pub trait AccessProvisioner: Send + Sync {
    async fn provision(&self, indices: &IndexNames) -> Result<(), LifecycleError>;
}

/// Everything startup needs, wired once by the daemon.
pub struct Startup {
    backend: Arc<dyn SearchBackend>,
    hashes: Arc<dyn SchemaHashStore>,
    schema: SchemaDocument,
    indices: IndexNames,
    health_timeout: Duration,
    provisioner: Option<Arc<dyn AccessProvisioner>>,
}

impl Startup {
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
            provisioner: None,
        }
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn AccessProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Provision access, migrate the main index, then reset the transfer
    /// index. Any error stops startup before the transfer index is touched.
    pub async fn run(self) -> Result<MigrationReport, LifecycleError> {
        if let Some(provisioner) = &self.provisioner {
            provisioner.provision(&self.indices).await?;
        }

        let mut manager = IndexLifecycleManager::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.hashes),
            self.schema.clone(),
            self.indices.clone(),
        )
        .with_health_timeout(self.health_timeout);
        let report = manager.migrate().await?;

        reset_transfer_index(self.backend.as_ref(), &self.indices.transfer, &self.schema).await?;
        Ok(report)
    }
}

/// Drop and recreate the transfer index empty. It holds transient
/// ownership-transfer state only, so nothing is backed up.
pub async fn reset_transfer_index(
    backend: &dyn SearchBackend,
    index: &str,
    schema: &SchemaDocument,
) -> Result<(), LifecycleError> {
    info!(index, "Creating transfer index");
    if !backend.delete_index(index).await? {
        info!(index, "Previous transfer index not found");
    }
    backend.create_index(index, &schema.stamped()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::MemoryHashStore;
    use crate::memory::{BackendCall, MemoryBackend};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvisioner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AccessProvisioner for CountingProvisioner {
        async fn provision(&self, _indices: &IndexNames) -> Result<(), LifecycleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn startup(backend: &Arc<MemoryBackend>, hashes: &Arc<MemoryHashStore>) -> Startup {
        Startup::new(
            backend.clone(),
            hashes.clone(),
            SchemaDocument::builtin().unwrap(),
            IndexNames::default(),
        )
    }

    #[tokio::test]
    async fn test_transfer_index_is_recreated_empty() {
        let backend = Arc::new(MemoryBackend::new());
        let hashes = Arc::new(MemoryHashStore::default());
        startup(&backend, &hashes).run().await.unwrap();

        backend
            .put_document("tagbot_transfer", "x", &json!({ "owner": 1 }))
            .await
            .unwrap();
        backend.clear_calls();

        startup(&backend, &hashes).run().await.unwrap();
        assert!(backend.documents("tagbot_transfer").is_empty());
        assert_eq!(
            backend.mutation_calls(),
            vec![
                BackendCall::DeleteIndex("tagbot_transfer".to_string()),
                BackendCall::CreateIndex("tagbot_transfer".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_abort_leaves_transfer_index_alone() {
        let backend = Arc::new(MemoryBackend::new());
        let hashes = Arc::new(MemoryHashStore::default());
        backend
            .create_index("tagbot_tmp", &json!({ "settings": {}, "mappings": {} }))
            .await
            .unwrap();
        backend.clear_calls();

        let err = startup(&backend, &hashes).run().await.unwrap_err();
        assert!(err.is_conflict());
        assert!(backend.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_provisioner_runs_first() {
        let backend = Arc::new(MemoryBackend::new());
        let hashes = Arc::new(MemoryHashStore::default());
        let provisioner = Arc::new(CountingProvisioner::default());

        startup(&backend, &hashes)
            .with_provisioner(provisioner.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(provisioner.calls.load(Ordering::SeqCst), 1);
    }
}
