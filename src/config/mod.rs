//! Kernel configuration: a `serde`-deserializable top-level [`Config`]
//! assembled from sub-structs, with a `Default` impl for demo use and a
//! `load` that falls back to defaults when no file is present.

use crate::errors::KernelError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub max_parallel: usize,
    pub tool_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self { max_parallel: 6, tool_timeout_ms: 10_000, max_retries: 2, retry_backoff_ms: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub enabled: bool,
    pub audit_path: PathBuf,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self { enabled: true, audit_path: PathBuf::from("./audit") }
    }
}

/// Top-level kernel configuration. Deserializes from a JSON file; any
/// field omitted from the file falls back to its `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub executor: ExecutorSettings,
    pub audit: AuditSettings,
    /// Demo-mode flag: when true, `Auth::check` allows every call
    /// unconditionally (§4.4).
    pub auth_disabled: bool,
}

impl Config {
    /// Validates cross-field invariants not expressible via `serde` alone.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.executor.max_parallel == 0 {
            return Err(KernelError::Config("executor.max_parallel must be at least 1".to_string()));
        }
        if self.executor.tool_timeout_ms == 0 {
            return Err(KernelError::Config("executor.tool_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn into_kernel_config(self) -> crate::kernel::KernelConfig {
        crate::kernel::KernelConfig {
            executor: crate::executor::ExecutorConfig {
                max_parallel: self.executor.max_parallel,
                tool_timeout_ms: self.executor.tool_timeout_ms,
                max_retries: self.executor.max_retries,
                retry_backoff_ms: self.executor.retry_backoff_ms,
            },
            audit_enabled: self.audit.enabled,
            audit_path: self.audit.audit_path,
            auth_disabled: self.auth_disabled,
        }
    }
}

/// Loads configuration from `path`, falling back to [`Config::default`]
/// when the file does not exist. A present-but-malformed file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, KernelError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| KernelError::Config(format!("failed to read kernel config from {}: {e}", path.display())))?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| KernelError::Config(format!("failed to parse kernel config JSON from {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.executor.max_parallel, 6);
        assert!(config.audit.enabled);
        assert!(!config.auth_disabled);
    }

    #[test]
    fn nonexistent_file_yields_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/kernel-config.json"))).unwrap();
        assert_eq!(config.executor.max_retries, 2);
    }

    #[test]
    fn loads_partial_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"executor": {"max_parallel": 3}, "auth_disabled": true}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.executor.max_parallel, 3);
        assert_eq!(config.executor.tool_timeout_ms, 10_000);
        assert!(config.auth_disabled);
    }

    #[test]
    fn validate_rejects_zero_max_parallel() {
        let mut config = Config::default();
        config.executor.max_parallel = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
