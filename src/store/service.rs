//! Local config store: in-memory value, durable mirror, cloud push/pull and
//! change subscriptions. One instance per configuration domain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::common::error::SyncResult;
use crate::common::time::{self, Timestamp};
use crate::remote::domain::LoadOutcome;
use crate::remote::service::RemoteConfigRepository;

use super::domain::{
    as_fields, merge_fields, model_catalog, model_name, to_fields, ChangeOrigin, ConfigChanged,
    DomainConfig, LocalStorage, MergeMode, ModelConfig, ModelInfo, TrainingConfig,
};

/// Observer invoked synchronously after every value change.
pub type Listener = Arc<dyn Fn(&ConfigChanged) + Send + Sync>;

/// Sync status fields other components may render.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreStatus {
    pub is_syncing: bool,
    pub is_loading: bool,
    pub last_sync_time: Option<Timestamp>,
}

/// Coarse badge for the UI.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncIndicator {
    LocalOnly,
    Synced,
}

impl StoreStatus {
    pub fn indicator(&self) -> SyncIndicator {
        if self.last_sync_time.is_some() {
            SyncIndicator::Synced
        } else {
            SyncIndicator::LocalOnly
        }
    }
}

struct StoreState<T> {
    value: T,
    status: StoreStatus,
    syncing: u32,
    loading: u32,
}

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener)>>,
}

impl Listeners {
    fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).push((id, listener));
        id
    }

    fn remove(&self, id: u64) {
        lock(&self.entries).retain(|(entry, _)| *entry != id);
    }

    fn notify(&self, event: &ConfigChanged) {
        // Snapshot first so a listener may subscribe or mutate without deadlocking.
        let listeners: Vec<Listener> = lock(&self.entries)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

/// Unsubscribes its listener when dropped.
pub struct Subscription {
    listeners: Weak<Listeners>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct StoreInner<T> {
    state: Mutex<StoreState<T>>,
    storage: Arc<dyn LocalStorage>,
    remote: RemoteConfigRepository,
    listeners: Arc<Listeners>,
}

/// Which status flag a [`FlagGuard`] owns.
#[derive(Copy, Clone)]
enum Flag {
    Syncing,
    Loading,
}

/// Raises a status flag and lowers it on drop, whatever way the call settles.
/// Overlapping calls are counted; the flag drops when the last one settles.
struct FlagGuard<'a, T> {
    inner: &'a StoreInner<T>,
    flag: Flag,
}

impl<'a, T> FlagGuard<'a, T> {
    fn raise(inner: &'a StoreInner<T>, flag: Flag) -> Self {
        Self::update(inner, flag, true);
        Self { inner, flag }
    }

    fn update(inner: &StoreInner<T>, flag: Flag, raise: bool) {
        let mut state = lock(&inner.state);
        let state = &mut *state;
        let (count, shown) = match flag {
            Flag::Syncing => (&mut state.syncing, &mut state.status.is_syncing),
            Flag::Loading => (&mut state.loading, &mut state.status.is_loading),
        };
        *count = if raise {
            *count + 1
        } else {
            count.saturating_sub(1)
        };
        *shown = *count > 0;
    }
}

impl<T> Drop for FlagGuard<'_, T> {
    fn drop(&mut self) {
        Self::update(self.inner, self.flag, false);
    }
}

/// Cheap handle; clones share the same store.
pub struct ConfigStore<T: DomainConfig> {
    inner: Arc<StoreInner<T>>,
}

impl<T: DomainConfig> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub type TrainingStore = ConfigStore<TrainingConfig>;
pub type ModelStore = ConfigStore<ModelConfig>;

impl<T: DomainConfig> ConfigStore<T> {
    /// Open the store, restoring the last persisted value or the domain default.
    pub fn open(storage: Arc<dyn LocalStorage>, remote: RemoteConfigRepository) -> Self {
        let value = restore::<T>(storage.as_ref());
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState {
                    value,
                    status: StoreStatus::default(),
                    syncing: 0,
                    loading: 0,
                }),
                storage,
                remote,
                listeners: Arc::new(Listeners::default()),
            }),
        }
    }

    pub fn value(&self) -> T {
        lock(&self.inner.state).value.clone()
    }

    pub fn status(&self) -> StoreStatus {
        lock(&self.inner.state).status.clone()
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.inner.listeners.add(listener);
        Subscription {
            listeners: Arc::downgrade(&self.inner.listeners),
            id,
        }
    }

    /// Shallow-merge `patch` into the value, persist it, then notify subscribers.
    pub fn set(&self, patch: Value) -> SyncResult<()> {
        let patch = as_fields(patch)?;
        self.commit(ChangeOrigin::Local, |current| {
            merge_fields(current, &patch, MergeMode::Strict)
        })
    }

    /// Restore the domain default.
    pub fn reset(&self) {
        if let Err(err) = self.commit(ChangeOrigin::Local, |_| Ok(T::default())) {
            warn!(domain = %T::DOMAIN, "reset failed: {err}");
        }
    }

    fn commit<F>(&self, origin: ChangeOrigin, next: F) -> SyncResult<()>
    where
        F: FnOnce(&T) -> SyncResult<T>,
    {
        {
            let mut state = lock(&self.inner.state);
            let value = next(&state.value)?;
            persist(self.inner.storage.as_ref(), &value);
            state.value = value;
        }
        self.inner.listeners.notify(&ConfigChanged {
            domain: T::DOMAIN,
            origin,
        });
        Ok(())
    }

    /// Push the current value to the remote store. Returns whether the upsert succeeded.
    pub async fn sync_to_cloud(&self, user_id: &str) -> bool {
        if user_id.is_empty() {
            return false;
        }

        let _syncing = FlagGuard::raise(&self.inner, Flag::Syncing);
        let data = match to_fields(&self.value()) {
            Ok(data) => data,
            Err(err) => {
                warn!(domain = %T::DOMAIN, "cannot encode config: {err}");
                return false;
            }
        };

        let saved = self.inner.remote.save(user_id, T::DOMAIN, &data).await;
        if saved {
            lock(&self.inner.state).status.last_sync_time = Some(time::now());
        }
        saved
    }

    /// Pull the remote value, replacing the local one with `default ⊕ remote`.
    /// Returns whether a remote value was applied.
    pub async fn load_from_cloud(&self, user_id: &str) -> bool {
        self.load_from_cloud_while(user_id, || true).await
    }

    /// [`load_from_cloud`](Self::load_from_cloud), but the fetched value is only
    /// applied if `still_current` holds once the remote call returns.
    pub async fn load_from_cloud_while<F>(&self, user_id: &str, still_current: F) -> bool
    where
        F: Fn() -> bool + Send + Sync,
    {
        if user_id.is_empty() {
            return false;
        }

        let _loading = FlagGuard::raise(&self.inner, Flag::Loading);
        let data = match self.inner.remote.load(user_id, T::DOMAIN).await {
            LoadOutcome::Found(data) => data,
            LoadOutcome::Missing | LoadOutcome::Failed => return false,
        };
        if !still_current() {
            debug!(domain = %T::DOMAIN, user_id, "session moved on, discarding loaded config");
            return false;
        }

        let applied = self.commit(ChangeOrigin::Remote, |_| {
            merge_fields(&T::default(), &data, MergeMode::Lenient)
        });
        match applied {
            Ok(()) => {
                lock(&self.inner.state).status.last_sync_time = Some(time::now());
                info!(domain = %T::DOMAIN, user_id, "config loaded from cloud");
                true
            }
            Err(err) => {
                warn!(domain = %T::DOMAIN, user_id, "ignoring malformed remote config: {err}");
                false
            }
        }
    }
}

impl ModelStore {
    pub fn set_selected_model(&self, model_id: &str) -> SyncResult<()> {
        self.set(serde_json::json!({ "selectedModel": model_id }))
    }

    pub fn models(&self) -> Vec<ModelInfo> {
        model_catalog()
    }

    pub fn selected_model_name(&self) -> String {
        model_name(&model_catalog(), &self.value().selected_model)
    }
}

fn restore<T: DomainConfig>(storage: &dyn LocalStorage) -> T {
    let raw = match storage.get(T::STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!(key = T::STORAGE_KEY, "cannot read persisted config: {err}");
            return T::default();
        }
    };

    let restored = serde_json::from_str::<Value>(&raw)
        .map_err(Into::into)
        .and_then(as_fields)
        .and_then(|fields| merge_fields(&T::default(), &fields, MergeMode::Lenient));
    match restored {
        Ok(value) => {
            debug!(key = T::STORAGE_KEY, "restored persisted config");
            value
        }
        Err(err) => {
            warn!(key = T::STORAGE_KEY, "discarding corrupt persisted config: {err}");
            T::default()
        }
    }
}

/// Mirror the value to local storage. A failed write keeps the in-memory value.
fn persist<T: DomainConfig>(storage: &dyn LocalStorage, value: &T) {
    let written = serde_json::to_string(value)
        .map_err(Into::into)
        .and_then(|raw| storage.set(T::STORAGE_KEY, &raw));
    if let Err(err) = written {
        warn!(key = T::STORAGE_KEY, "failed to persist config locally: {err}");
    }
}
