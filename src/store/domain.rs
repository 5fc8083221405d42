//! Configuration domains, their values and the local durability contract.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::common::error::{SyncError, SyncResult};

/// Flat field map as stored remotely and accepted by `set`.
pub type ConfigData = Map<String, Value>;

/// Category of configuration; selects the local store and the remote row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigDomain {
    Training,
    Model,
    /// Reserved; no store implements it yet.
    General,
}

impl ConfigDomain {
    pub const ALL: [ConfigDomain; 3] = [
        ConfigDomain::Training,
        ConfigDomain::Model,
        ConfigDomain::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigDomain::Training => "training",
            ConfigDomain::Model => "model",
            ConfigDomain::General => "general",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|domain| domain.as_str() == raw)
    }
}

impl fmt::Display for ConfigDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration value owned by one local store.
///
/// `Default` is the domain default, so a store is never unset.
pub trait DomainConfig:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const DOMAIN: ConfigDomain;
    /// Key of the local durable entry mirroring this value.
    const STORAGE_KEY: &'static str;
}

/// Training hyper-parameters edited on the training form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub target_col: String,
    pub seq_len: u32,
    pub d_model: u32,
    pub n_layers: u32,
    pub dropout: f64,
    pub lr: f64,
    pub batch_size: u32,
    pub epochs: u32,
    pub top_k: u32,
    pub n_models: u32,
    #[serde(rename = "selectedDatasetId")]
    pub selected_dataset_id: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_col: String::new(),
            seq_len: 12,
            d_model: 64,
            n_layers: 2,
            dropout: 0.3,
            lr: 0.001,
            batch_size: 32,
            epochs: 50,
            top_k: 12,
            n_models: 1,
            selected_dataset_id: String::new(),
        }
    }
}

impl DomainConfig for TrainingConfig {
    const DOMAIN: ConfigDomain = ConfigDomain::Training;
    const STORAGE_KEY: &'static str = "training-config-storage";
}

/// Model architecture selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "selectedModel")]
    pub selected_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            selected_model: DEFAULT_MODEL_ID.to_string(),
        }
    }
}

impl DomainConfig for ModelConfig {
    const DOMAIN: ConfigDomain = ConfigDomain::Model;
    const STORAGE_KEY: &'static str = "model-storage";
}

pub const DEFAULT_MODEL_ID: &str = "mamformer";
const FALLBACK_MODEL_NAME: &str = "Mamformer";

/// Entry of the model catalog shown in the model picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Models the dashboard can train. Not synchronized, only the selection is.
pub fn model_catalog() -> Vec<ModelInfo> {
    [("mamformer", "Mamformer"), ("auto-mamformer", "Auto-Mamformer")]
        .into_iter()
        .map(|(id, name)| ModelInfo {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}

/// Display name for a model id, falling back to the default model's name.
pub fn model_name(catalog: &[ModelInfo], id: &str) -> String {
    catalog
        .iter()
        .find(|model| model.id == id)
        .map(|model| model.name.clone())
        .unwrap_or_else(|| FALLBACK_MODEL_NAME.to_string())
}

/// How patch keys that the domain does not know are treated.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MergeMode {
    /// Reject unknown keys (user edits).
    Strict,
    /// Drop unknown keys (remote and persisted payloads).
    Lenient,
}

/// Serialize a value into its flat field map.
pub fn to_fields<T: DomainConfig>(value: &T) -> SyncResult<ConfigData> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(SyncError::Internal("domain value is not a JSON object")),
    }
}

/// Require a patch to be a JSON object.
pub fn as_fields(patch: Value) -> SyncResult<ConfigData> {
    match patch {
        Value::Object(fields) => Ok(fields),
        other => Err(SyncError::invalid(format!(
            "patch must be an object, got {other}"
        ))),
    }
}

/// Shallow merge: every patch field overrides the base field of the same name.
/// Strict mode rejects the whole patch on an unknown or mistyped field; lenient
/// mode drops just that field and keeps the rest.
pub fn merge_fields<T: DomainConfig>(base: &T, patch: &ConfigData, mode: MergeMode) -> SyncResult<T> {
    let mut fields = to_fields(base)?;
    for (key, value) in patch {
        let Some(previous) = fields.insert(key.clone(), value.clone()) else {
            fields.remove(key);
            match mode {
                MergeMode::Strict => {
                    return Err(SyncError::invalid(format!(
                        "unknown {} field `{key}`",
                        T::DOMAIN
                    )))
                }
                MergeMode::Lenient => continue,
            }
        };
        if mode == MergeMode::Lenient {
            if let Err(err) = serde_json::from_value::<T>(Value::Object(fields.clone())) {
                warn!(domain = %T::DOMAIN, field = %key, "dropping unusable field: {err}");
                fields.insert(key.clone(), previous);
            }
        }
    }
    serde_json::from_value(Value::Object(fields))
        .map_err(|err| SyncError::invalid(format!("{} value rejected: {err}", T::DOMAIN)))
}

/// Durable key-value storage, one entry per store plus the session token.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> SyncResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> SyncResult<()>;
    fn remove(&self, key: &str) -> SyncResult<()>;
}

/// Where a value change came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChangeOrigin {
    /// `set` or `reset` on the store.
    Local,
    /// Replacement by `load_from_cloud`.
    Remote,
}

/// Notification delivered to store subscribers after a value change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConfigChanged {
    pub domain: ConfigDomain,
    pub origin: ChangeOrigin,
}
