//! Repository over the remote config table. Never fails outward: every
//! backend error is logged here and turned into `false` / `Failed` / absent.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::common::time;
use crate::store::domain::{ConfigData, ConfigDomain};

use super::domain::{AllConfigs, ConfigBackend, LoadOutcome, UserConfigRecord};

#[derive(Clone)]
pub struct RemoteConfigRepository {
    backend: Arc<dyn ConfigBackend>,
}

impl RemoteConfigRepository {
    pub fn new(backend: Arc<dyn ConfigBackend>) -> Self {
        Self { backend }
    }

    /// Upsert one domain for a user, stamping `updated_at` with the current time.
    pub async fn save(&self, user_id: &str, domain: ConfigDomain, data: &ConfigData) -> bool {
        let record = UserConfigRecord {
            user_id: user_id.to_string(),
            config_type: domain,
            config_data: data.clone(),
            updated_at: time::now(),
        };

        match self.backend.upsert(&record).await {
            Ok(()) => {
                debug!(user_id, %domain, "config saved");
                true
            }
            Err(err) => {
                error!(user_id, %domain, code = err.code() as u32, "failed to save config: {err}");
                false
            }
        }
    }

    pub async fn load(&self, user_id: &str, domain: ConfigDomain) -> LoadOutcome {
        match self.backend.select_one(user_id, domain).await {
            Ok(Some(data)) => LoadOutcome::Found(data),
            Ok(None) => {
                debug!(user_id, %domain, "no remote config yet");
                LoadOutcome::Missing
            }
            Err(err) => {
                error!(user_id, %domain, code = err.code() as u32, "failed to load config: {err}");
                LoadOutcome::Failed
            }
        }
    }

    /// Batched read of every domain; a failure yields all-absent.
    pub async fn load_all(&self, user_id: &str) -> AllConfigs {
        match self.backend.select_all(user_id).await {
            Ok(rows) => AllConfigs::from_rows(rows),
            Err(err) => {
                warn!(user_id, code = err.code() as u32, "failed to load all configs: {err}");
                AllConfigs::default()
            }
        }
    }
}
