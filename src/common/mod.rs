//! Shared utilities that glue the different components together.
pub mod config;
pub mod error;
pub mod log;
pub mod time;

pub use config::AppCfg;
pub use error::{SyncCode, SyncError, SyncResult};
