//! Local config stores, one per configuration domain, mirrored to durable storage.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{
    ChangeOrigin, ConfigChanged, ConfigData, ConfigDomain, DomainConfig, LocalStorage, ModelConfig,
    ModelInfo, TrainingConfig,
};
pub use repo_fs::{FsLocalStorage, MemoryStorage};
pub use service::{
    ConfigStore, Listener, ModelStore, StoreStatus, Subscription, SyncIndicator, TrainingStore,
};
