//! Runtime configuration loaded from the process environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Debounce window applied to pushes when nothing else is configured.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Output format for the log subscriber.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Snapshot of configuration values consumed by the engine.
#[derive(Clone, Debug)]
pub struct AppCfg {
    pub data_root: String,
    pub api_url: String,
    pub remote_url: String,
    pub remote_key: String,
    pub remote_table: String,
    pub debounce_ms: u64,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl AppCfg {
    /// Create a configuration snapshot from the process environment.
    pub fn load() -> Self {
        fn env_or(key: &str, default: &str) -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        }

        let log_format = match env_or("CFGSYNC_LOG_FORMAT", "json").as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Self {
            data_root: env_or("CFGSYNC_DATA_ROOT", "./data"),
            api_url: env_or("CFGSYNC_API_URL", "http://localhost:8000/api/v1"),
            remote_url: env_or("CFGSYNC_REMOTE_URL", "http://localhost:54321"),
            remote_key: env_or("CFGSYNC_REMOTE_KEY", ""),
            remote_table: env_or("CFGSYNC_REMOTE_TABLE", "user_configs"),
            debounce_ms: env_or("CFGSYNC_DEBOUNCE_MS", "")
                .parse()
                .unwrap_or(DEFAULT_DEBOUNCE_MS),
            log_filter: env_or("CFGSYNC_LOG", "info"),
            log_format,
        }
    }

    /// Directory holding the local durable key-value entries.
    pub fn local_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_root).join("local")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            data_root: "./data".to_string(),
            api_url: "http://localhost:8000/api/v1".to_string(),
            remote_url: "http://localhost:54321".to_string(),
            remote_key: String::new(),
            remote_table: "user_configs".to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            log_filter: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_debounce_is_two_seconds() {
        let cfg = AppCfg::default();
        assert_eq!(cfg.debounce(), Duration::from_millis(2000));
        assert_eq!(cfg.local_dir(), PathBuf::from("./data").join("local"));
    }
}
