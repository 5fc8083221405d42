//! Client-side configuration synchronization engine.
//!
//! Local config stores (training parameters, selected model) are mirrored to
//! durable local storage on every edit and kept in step with a per-user remote
//! table: one parallel load after login, then debounced combined pushes.
pub mod common;
pub mod engine;
pub mod remote;
pub mod session;
pub mod store;
pub mod sync;

pub use common::{AppCfg, SyncCode, SyncError, SyncResult};
pub use engine::{EngineStatus, SyncEngine};
pub use session::{Session, SessionState, User, UserResolver};
pub use store::{ConfigDomain, ConfigStore, ModelStore, TrainingStore};
pub use sync::{GatePhase, SyncOrchestrator};
