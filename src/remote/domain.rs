//! Remote row model and the backend contract for the per-user config table.

use serde::{Deserialize, Serialize};

use crate::common::error::SyncResult;
use crate::common::time::Timestamp;
use crate::store::domain::{ConfigData, ConfigDomain};

/// One row of the remote table. `(user_id, config_type)` is unique.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserConfigRecord {
    pub user_id: String,
    pub config_type: ConfigDomain,
    pub config_data: ConfigData,
    pub updated_at: Timestamp,
}

/// Partial row returned by a batched read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigRow {
    /// Kept as text so rows of domains this build does not know still parse.
    pub config_type: String,
    pub config_data: ConfigData,
}

/// Raw access to the remote table. Errors are real transport/auth failures;
/// a missing row is `Ok(None)`.
#[async_trait::async_trait]
pub trait ConfigBackend: Send + Sync {
    /// Insert or update the row keyed on `(user_id, config_type)`.
    async fn upsert(&self, record: &UserConfigRecord) -> SyncResult<()>;
    async fn select_one(&self, user_id: &str, domain: ConfigDomain)
        -> SyncResult<Option<ConfigData>>;
    async fn select_all(&self, user_id: &str) -> SyncResult<Vec<ConfigRow>>;
}

/// Result of a single-domain load, with "no row yet" kept apart from failure.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    Found(ConfigData),
    Missing,
    Failed,
}

/// Every domain of one user, fetched in a single round trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllConfigs {
    pub training: Option<ConfigData>,
    pub model: Option<ConfigData>,
    pub general: Option<ConfigData>,
}

impl AllConfigs {
    pub fn get(&self, domain: ConfigDomain) -> Option<&ConfigData> {
        match domain {
            ConfigDomain::Training => self.training.as_ref(),
            ConfigDomain::Model => self.model.as_ref(),
            ConfigDomain::General => self.general.as_ref(),
        }
    }

    fn slot(&mut self, domain: ConfigDomain) -> &mut Option<ConfigData> {
        match domain {
            ConfigDomain::Training => &mut self.training,
            ConfigDomain::Model => &mut self.model,
            ConfigDomain::General => &mut self.general,
        }
    }

    /// Fold batched rows into per-domain slots; unknown types are skipped.
    pub fn from_rows(rows: Vec<ConfigRow>) -> Self {
        let mut all = Self::default();
        for row in rows {
            match ConfigDomain::parse(&row.config_type) {
                Some(domain) => *all.slot(domain) = Some(row.config_data),
                None => tracing::debug!(config_type = %row.config_type, "skipping unknown config row"),
            }
        }
        all
    }
}
