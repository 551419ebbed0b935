//! ZIP assembly for batch runs.
//!
//! The archive writer is owned by the single sequential pipeline thread,
//! so no locking is needed; entries are appended as targets succeed and
//! the container is finalized once the run completes.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// An in-progress snapshot archive.
pub struct SnapshotArchive {
    writer: ZipWriter<File>,
    path: PathBuf,
    entries: Vec<String>,
}

impl SnapshotArchive {
    /// Create the archive file, truncating any existing file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create archive {}", path.display()))?;
        Ok(Self {
            writer: ZipWriter::new(file),
            path: path.to_path_buf(),
            entries: Vec::new(),
        })
    }

    /// Append one payload under `name`.
    pub fn add_entry(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer
            .start_file(name, options)
            .with_context(|| format!("failed to start archive entry {name}"))?;
        self.writer
            .write_all(payload)
            .with_context(|| format!("failed to write archive entry {name}"))?;
        self.entries.push(name.to_string());
        Ok(())
    }

    /// Entry names appended so far, in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Finalize the container and return its path.
    pub fn finish(self) -> Result<PathBuf> {
        self.writer
            .finish()
            .with_context(|| format!("failed to finalize archive {}", self.path.display()))?;
        Ok(self.path)
    }
}
