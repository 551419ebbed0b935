//! JSONL run log — append-only record of every target outcome.
//!
//! Features:
//! - Append-only JSONL format for easy parsing
//! - Automatic log rotation when file exceeds `MAX_LOG_SIZE` (20MB)
//! - Rotated files named `.1`, `.2`, etc. (max 3 rotations)

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Maximum run log size before rotation (20 MB).
const MAX_LOG_SIZE: u64 = 20 * 1024 * 1024;

/// Maximum number of rotated log files to keep.
const MAX_ROTATIONS: u32 = 3;

/// One captured (or failed) target.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub run_id: String,
    pub url: String,
    pub ordinal: usize,
    pub status: String,
    pub reason: Option<String>,
    pub payload_bytes: Option<usize>,
}

/// Append-only JSONL run logger with automatic rotation.
pub struct RunLogger {
    file: File,
    path: PathBuf,
    /// Approximate current size (may drift slightly; re-checked on rotation).
    current_size: u64,
}

impl RunLogger {
    /// Open or create the run log file.
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open run log: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.clone(),
            current_size,
        })
    }

    /// Open the default run log at ~/.pagesnap/runs.jsonl.
    pub fn default_logger() -> Result<Self> {
        Self::open(&crate::setup::home_dir().join("runs.jsonl"))
    }

    /// Log one record.
    pub fn log(&mut self, record: &RunRecord) -> Result<()> {
        // Check if rotation is needed before writing
        if self.current_size >= MAX_LOG_SIZE {
            self.rotate()?;
        }

        let json = serde_json::to_string(record)?;
        let bytes_written = writeln!(self.file, "{json}")
            .map(|()| json.len() as u64 + 1)
            .unwrap_or(0);
        self.current_size += bytes_written;
        Ok(())
    }

    /// Build and log a record for one target outcome.
    pub fn log_outcome(
        &mut self,
        run_id: &str,
        url: &str,
        ordinal: usize,
        status: &str,
        reason: Option<&str>,
        payload_bytes: Option<usize>,
    ) -> Result<()> {
        self.log(&RunRecord {
            timestamp: Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            url: url.to_string(),
            ordinal,
            status: status.to_string(),
            reason: reason.map(String::from),
            payload_bytes,
        })
    }

    /// Rotate log files: runs.jsonl → runs.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        // Shift existing rotated files
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            let to = rotation_path(&self.path, i + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }

        // Rename current → .1
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        // Delete oldest if over limit
        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }

        // Reopen a fresh file
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to reopen run log: {}", self.path.display()))?;
        self.current_size = 0;
        Ok(())
    }
}

fn rotation_path(path: &PathBuf, n: u32) -> PathBuf {
    let mut p = path.clone().into_os_string();
    p.push(format!(".{n}"));
    PathBuf::from(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let mut logger = RunLogger::open(&path).unwrap();
        logger
            .log_outcome("run-1", "https://a.test", 1, "success", None, Some(42))
            .unwrap();
        logger
            .log_outcome(
                "run-1",
                "https://b.test",
                2,
                "failure",
                Some("navigation timed out"),
                None,
            )
            .unwrap();
        drop(logger);

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["status"], "success");
        assert_eq!(first["payload_bytes"], 42);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["reason"], "navigation timed out");
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        for i in 0..2 {
            let mut logger = RunLogger::open(&path).unwrap();
            logger
                .log_outcome("run-1", "https://a.test", i + 1, "success", None, None)
                .unwrap();
        }
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().count(), 2);
    }
}
