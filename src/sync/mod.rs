//! Sync orchestrator: gates pushes behind the post-login load and debounces edits.

pub mod domain;
pub mod scheduler;
pub mod service;

pub use domain::{Gate, GatePhase, StillCurrent, SyncTarget};
pub use scheduler::Debouncer;
pub use service::{DomainResults, SyncOrchestrator};
