//! In-process stand-in for the remote table, with fault injection and a call log.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::common::error::{SyncError, SyncResult};
use crate::common::time;
use crate::store::domain::{ConfigData, ConfigDomain};

use super::domain::{ConfigBackend, ConfigRow, UserConfigRecord};

/// Operation observed by the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Upsert {
        user_id: String,
        domain: ConfigDomain,
        data: ConfigData,
    },
    SelectOne {
        user_id: String,
        domain: ConfigDomain,
    },
    SelectAll {
        user_id: String,
    },
}

#[derive(Default)]
struct MemState {
    rows: HashMap<(String, ConfigDomain), UserConfigRecord>,
    failing: HashSet<ConfigDomain>,
    fail_all: bool,
    calls: Vec<BackendCall>,
}

#[derive(Default)]
pub struct MemoryConfigBackend {
    state: Mutex<MemState>,
    latency: Mutex<Duration>,
}

impl MemoryConfigBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delay applied to every call before it touches the table.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|p| p.into_inner()) = latency;
    }

    /// Make every call for `domain` fail with a transport error.
    pub fn fail_domain(&self, domain: ConfigDomain) {
        self.lock().failing.insert(domain);
    }

    pub fn heal_domain(&self, domain: ConfigDomain) {
        self.lock().failing.remove(&domain);
    }

    pub fn fail_all(&self, failing: bool) {
        self.lock().fail_all = failing;
    }

    /// Insert a row directly, bypassing the call log.
    pub fn seed(&self, user_id: &str, domain: ConfigDomain, data: ConfigData) {
        let record = UserConfigRecord {
            user_id: user_id.to_string(),
            config_type: domain,
            config_data: data,
            updated_at: time::now(),
        };
        self.lock().rows.insert((user_id.to_string(), domain), record);
    }

    pub fn row(&self, user_id: &str, domain: ConfigDomain) -> Option<UserConfigRecord> {
        self.lock().rows.get(&(user_id.to_string(), domain)).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Upserts recorded so far for one domain.
    pub fn upserts_for(&self, domain: ConfigDomain) -> Vec<ConfigData> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Upsert {
                    domain: d, data, ..
                } if *d == domain => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap_or_else(|p| p.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(state: &MemState, domain: Option<ConfigDomain>) -> SyncResult<()> {
        let failing = state.fail_all || domain.is_some_and(|d| state.failing.contains(&d));
        if failing {
            Err(SyncError::transport("injected backend failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ConfigBackend for MemoryConfigBackend {
    async fn upsert(&self, record: &UserConfigRecord) -> SyncResult<()> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.push(BackendCall::Upsert {
            user_id: record.user_id.clone(),
            domain: record.config_type,
            data: record.config_data.clone(),
        });
        Self::check(&state, Some(record.config_type))?;
        state
            .rows
            .insert((record.user_id.clone(), record.config_type), record.clone());
        Ok(())
    }

    async fn select_one(
        &self,
        user_id: &str,
        domain: ConfigDomain,
    ) -> SyncResult<Option<ConfigData>> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.push(BackendCall::SelectOne {
            user_id: user_id.to_string(),
            domain,
        });
        Self::check(&state, Some(domain))?;
        Ok(state
            .rows
            .get(&(user_id.to_string(), domain))
            .map(|record| record.config_data.clone()))
    }

    async fn select_all(&self, user_id: &str) -> SyncResult<Vec<ConfigRow>> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.push(BackendCall::SelectAll {
            user_id: user_id.to_string(),
        });
        Self::check(&state, None)?;
        Ok(state
            .rows
            .values()
            .filter(|record| record.user_id == user_id)
            .map(|record| ConfigRow {
                config_type: record.config_type.as_str().to_string(),
                config_data: record.config_data.clone(),
            })
            .collect())
    }
}
