//! Remote config repository: the per-user `(user_id, config_type)` table.

pub mod domain;
pub mod repo_http;
pub mod repo_mem;
pub mod service;

pub use domain::{AllConfigs, ConfigBackend, LoadOutcome, UserConfigRecord};
pub use repo_http::RestConfigBackend;
pub use repo_mem::MemoryConfigBackend;
pub use service::RemoteConfigRepository;
