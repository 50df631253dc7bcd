// 🧾 Run report
// Provenance and degradation record for one pipeline run. Written next to the
// outputs when asked for; never feeds back into them.

use crate::error::{ReconcileError, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputProvenance {
    /// What the file was used as: "sequences", "CARD", "KARGA", "metadata"...
    pub role: String,
    pub path: PathBuf,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub inputs: Vec<InputProvenance>,
    pub warnings: Vec<String>,

    /// Records whose id no rule could extract
    pub unresolved_identifiers: usize,

    /// Genes removed by the metadata inner join
    pub dropped_by_enrichment: usize,

    pub output_rows: usize,
    pub output_columns: usize,
}

/// Hex SHA-256 of a file's bytes
pub fn fingerprint(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| ReconcileError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

impl RunReport {
    pub fn new(command: &str) -> Self {
        RunReport {
            generated_at: Utc::now(),
            command: command.to_string(),
            inputs: Vec::new(),
            warnings: Vec::new(),
            unresolved_identifiers: 0,
            dropped_by_enrichment: 0,
            output_rows: 0,
            output_columns: 0,
        }
    }

    /// Record an input; an unreadable file gets an empty fingerprint
    pub fn add_input(&mut self, role: &str, path: &Path, rows: usize) {
        let sha256 = fingerprint(path).unwrap_or_default();
        self.inputs.push(InputProvenance {
            role: role.to_string(),
            path: path.to_path_buf(),
            rows,
            sha256,
        });
    }

    /// Log and keep a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} inputs, {} rows × {} columns out, {} warnings, {} unresolved ids, {} genes dropped by metadata join",
            self.command,
            self.inputs.len(),
            self.output_rows,
            self.output_columns,
            self.warnings.len(),
            self.unresolved_identifiers,
            self.dropped_by_enrichment
        )
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReconcileError::InvalidConfig(format!("report serialization failed: {}", e)))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| ReconcileError::io(path, e))
    }
}
