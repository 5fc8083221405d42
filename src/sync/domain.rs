//! Gate states and the store-facing contract of the orchestrator.

use std::sync::Arc;

use crate::store::domain::{ConfigDomain, DomainConfig};
use crate::store::service::{ConfigStore, Listener, Subscription};

/// Load-once protocol state for one session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GatePhase {
    Idle,
    Loading,
    Loaded,
}

/// Per-session gate; `generation` ties it to one [`Session`](crate::session::Session).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Gate {
    pub generation: u64,
    pub phase: GatePhase,
}

impl Gate {
    pub fn idle(generation: u64) -> Self {
        Self {
            generation,
            phase: GatePhase::Idle,
        }
    }

    /// Pushes are allowed only once the current session finished its initial load.
    pub fn allows_push(&self, generation: u64) -> bool {
        self.generation == generation && self.phase == GatePhase::Loaded
    }
}

/// Answers whether the session that started a load is still the current one.
pub type StillCurrent = Arc<dyn Fn() -> bool + Send + Sync>;

/// What the orchestrator needs from a local store, independent of its domain type.
#[async_trait::async_trait]
pub trait SyncTarget: Send + Sync {
    fn domain(&self) -> ConfigDomain;
    async fn sync_to_cloud(&self, user_id: &str) -> bool;
    /// Load the remote value, applying it only while `still_current` holds.
    async fn load_from_cloud(&self, user_id: &str, still_current: StillCurrent) -> bool;
    fn subscribe(&self, listener: Listener) -> Subscription;
}

#[async_trait::async_trait]
impl<T: DomainConfig> SyncTarget for ConfigStore<T> {
    fn domain(&self) -> ConfigDomain {
        T::DOMAIN
    }

    async fn sync_to_cloud(&self, user_id: &str) -> bool {
        ConfigStore::sync_to_cloud(self, user_id).await
    }

    async fn load_from_cloud(&self, user_id: &str, still_current: StillCurrent) -> bool {
        self.load_from_cloud_while(user_id, move || still_current()).await
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        ConfigStore::subscribe(self, listener)
    }
}
