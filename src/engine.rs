//! Wiring: builds every component from an [`AppCfg`] and hands them to the host.

use std::sync::Arc;
use std::time::Duration;

use crate::common::config::AppCfg;
use crate::common::error::SyncResult;
use crate::remote::domain::ConfigBackend;
use crate::remote::repo_http::RestConfigBackend;
use crate::remote::service::RemoteConfigRepository;
use crate::session::domain::UserResolver;
use crate::session::repo_http::HttpUserResolver;
use crate::session::service::SessionState;
use crate::store::domain::LocalStorage;
use crate::store::repo_fs::FsLocalStorage;
use crate::store::service::{ModelStore, StoreStatus, TrainingStore};
use crate::sync::domain::SyncTarget;
use crate::sync::service::SyncOrchestrator;

/// Sync status of every store, for the status badge.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineStatus {
    pub training: StoreStatus,
    pub model: StoreStatus,
}

pub struct SyncEngine {
    session: SessionState,
    training: TrainingStore,
    model: ModelStore,
    remote: RemoteConfigRepository,
    debounce: Duration,
    orchestrator: Option<SyncOrchestrator>,
}

impl SyncEngine {
    /// Filesystem storage, REST remote store and HTTP user resolution, as configured.
    pub fn from_cfg(cfg: &AppCfg) -> Self {
        Self::with_parts(
            Arc::new(FsLocalStorage::new(cfg)),
            Arc::new(RestConfigBackend::new(cfg)),
            Arc::new(HttpUserResolver::new(cfg)),
            cfg.debounce(),
        )
    }

    pub fn with_parts(
        storage: Arc<dyn LocalStorage>,
        backend: Arc<dyn ConfigBackend>,
        resolver: Arc<dyn UserResolver>,
        debounce: Duration,
    ) -> Self {
        let remote = RemoteConfigRepository::new(backend);
        Self {
            session: SessionState::open(storage.clone(), resolver),
            training: TrainingStore::open(storage.clone(), remote.clone()),
            model: ModelStore::open(storage, remote.clone()),
            remote,
            debounce,
            orchestrator: None,
        }
    }

    /// Start the orchestrator. Calling it again while running is a no-op.
    pub fn start(&mut self) -> SyncResult<()> {
        if self.orchestrator.is_some() {
            return Ok(());
        }
        let targets: Vec<Arc<dyn SyncTarget>> = vec![
            Arc::new(self.training.clone()) as Arc<dyn SyncTarget>,
            Arc::new(self.model.clone()),
        ];
        self.orchestrator = Some(SyncOrchestrator::start(
            self.session.clone(),
            targets,
            self.debounce,
        )?);
        Ok(())
    }

    /// Tear the orchestrator down, cancelling any pending debounced push.
    pub fn shutdown(&mut self) {
        self.orchestrator = None;
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn training(&self) -> &TrainingStore {
        &self.training
    }

    pub fn model(&self) -> &ModelStore {
        &self.model
    }

    pub fn remote(&self) -> &RemoteConfigRepository {
        &self.remote
    }

    pub fn orchestrator(&self) -> Option<&SyncOrchestrator> {
        self.orchestrator.as_ref()
    }

    /// "Sync now" for the logged-in user.
    pub async fn manual_sync(&self) -> bool {
        match &self.orchestrator {
            Some(orchestrator) => orchestrator.sync_now().await,
            None => false,
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            training: self.training.status(),
            model: self.model.status(),
        }
    }
}
