//! JSON-lines audit trail of which prompt produced which stage result

use crate::pipeline::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One settled stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub run_id: String,
    pub stage: StageId,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    /// `"ok"` or the error code the stage settled with.
    pub outcome: String,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Appends [`AuditEntry`] lines to a file. A log that failed to open, or was
/// never configured, silently records nothing.
#[derive(Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
    writer: Option<Arc<Mutex<BufWriter<File>>>>,
}

impl AuditLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        let writer = path.as_ref().and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(Arc::new(Mutex::new(BufWriter::new(file)))),
                Err(e) => {
                    warn!("Failed to open audit log {}: {}", path.display(), e);
                    None
                }
            }
        });

        Self { path, writer }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            writer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, entry: &AuditEntry) {
        let Some(writer) = &self.writer else {
            return;
        };

        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize audit entry for {}: {}", entry.stage, e);
                return;
            }
        };

        match writer.lock() {
            Ok(mut writer) => {
                if let Err(e) = writeln!(writer, "{}", json) {
                    warn!("Failed to write audit entry: {}", e);
                }
                if let Err(e) = writer.flush() {
                    warn!("Failed to flush audit log: {}", e);
                }
            }
            Err(_) => warn!("Audit log writer poisoned, dropping entry"),
        }

        debug!(
            stage = %entry.stage,
            outcome = %entry.outcome,
            latency_ms = entry.latency_ms,
            "Audit entry recorded"
        );
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
