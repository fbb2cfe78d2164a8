//! Composition root: opens the store and hands each service its repository.
use super::audit::Audit;
use super::config::BackendConfig;
use super::document::Document;
use super::repository::SledRepository;
use super::service::{AuditService, DocumentService};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

pub struct Backend {
    pub audits: AuditService,
    pub documents: DocumentService,
    db: sled::Db,
}

impl Backend {
    pub fn open(config: &BackendConfig) -> anyhow::Result<Self> {
        let db = config.open_store()?;
        let backend = Self::from_db(db, config)?;

        info!(
            path = %config.store.path.display(),
            temporary = config.store.temporary,
            "backend ready"
        );
        Ok(backend)
    }

    pub fn from_db(db: sled::Db, config: &BackendConfig) -> anyhow::Result<Self> {
        let flush = config.store.flush_on_write;
        let audits = SledRepository::<Audit>::open(&db, flush).context("opening audit trees")?;
        let documents =
            SledRepository::<Document>::open(&db, flush).context("opening document trees")?;

        Ok(Self {
            audits: AuditService::new(Arc::new(audits), config.search.clone()),
            documents: DocumentService::new(Arc::new(documents), config.search.clone()),
            db,
        })
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush().context("flushing store")?;
        Ok(())
    }
}
