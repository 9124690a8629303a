//! Append-only record of mint outcomes and contract inspections

use anyhow::Context;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Destination for activity records. Callers treat failures as non-fatal.
pub trait ActivitySink: Send + Sync {
    fn append(&self, record: &Value) -> anyhow::Result<()>;
}

/// JSON lines file; each line is `{"t": <RFC3339>, ...record}`.
pub struct JsonlActivityLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlActivityLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stamp(record: &Value) -> Value {
        let mut line = Map::new();
        line.insert("t".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
        match record {
            Value::Object(fields) => {
                for (key, value) in fields {
                    line.insert(key.clone(), value.clone());
                }
            }
            other => {
                line.insert("data".to_string(), other.clone());
            }
        }
        Value::Object(line)
    }
}

impl ActivitySink for JsonlActivityLog {
    fn append(&self, record: &Value) -> anyhow::Result<()> {
        let line = serde_json::to_string(&Self::stamp(record))?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("activity log lock poisoned"))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open activity log {}", self.path.display()))?;
        writeln!(file, "{}", line).with_context(|| format!("Failed to write activity log {}", self.path.display()))
    }
}
