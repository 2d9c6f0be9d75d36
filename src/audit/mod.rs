//! Redacts sensitive parameters and appends JSON-lines audit entries.
//!
//! Recursive key-based redaction over `serde_json::Value`, append-only
//! writes, and a never-fail-the-caller philosophy for side-channel logging.

use crate::model::AuditEntry;
use chrono::Utc;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;

const SENSITIVE_KEY_MARKERS: &[&str] = &["key", "token", "password", "secret", "credential", "auth"];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Recursively replaces any value whose key matches a sensitive marker
/// with the literal string `"[REDACTED]"`, preserving structure otherwise.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    out.insert(key.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact).collect()),
        other => other.clone(),
    }
}

pub struct AuditLog {
    enabled: bool,
    audit_path: PathBuf,
    // Serializes appends so concurrent callers never interleave partial lines.
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(enabled: bool, audit_path: PathBuf) -> Self {
        Self { enabled, audit_path, write_lock: Mutex::new(()) }
    }

    pub fn disabled() -> Self {
        Self::new(false, PathBuf::new())
    }

    fn path_for(&self, date: chrono::NaiveDate) -> PathBuf {
        self.audit_path.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Appends one audit entry. Never propagates a failure to the caller —
    /// write errors are logged via `tracing::error!` and swallowed (§4.5/§7).
    pub async fn record(&self, mut entry: AuditEntry) {
        if !self.enabled {
            return;
        }
        entry.parameters = redact(&entry.parameters);
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                error!("audit: failed to serialize entry: {e}");
                return;
            }
        };

        let _guard = self.write_lock.lock().await;
        if let Err(e) = tokio::fs::create_dir_all(&self.audit_path).await {
            error!("audit: failed to create audit directory: {e}");
            return;
        }
        let path = self.path_for(entry.timestamp.date_naive());
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await;
        match file {
            Ok(mut file) => {
                if let Err(e) = file.write_all(format!("{line}\n").as_bytes()).await {
                    error!("audit: failed to append entry: {e}");
                }
            }
            Err(e) => error!("audit: failed to open audit file {}: {e}", path.display()),
        }
    }

    /// Reads back the parsed entries for `date` (defaults to today, UTC).
    pub async fn get_entries(&self, date: Option<chrono::NaiveDate>) -> anyhow::Result<Vec<Value>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let path = self.path_for(date);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let mut out = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(line)?);
        }
        Ok(out)
    }
}
