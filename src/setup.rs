//! One-time environment bootstrap.
//!
//! `ensure_ready` is the explicit, idempotent replacement for a
//! session-wide "already checked" flag: the first successful probe writes
//! a readiness marker under `~/.pagesnap/`, and later calls re-validate
//! the recorded browser path instead of re-probing the whole system.

use crate::renderer::chromium::find_chromium;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

const MARKER_FILE: &str = "ready";

/// The pagesnap home directory (`~/.pagesnap`, or `/tmp/.pagesnap` when no
/// home directory exists).
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".pagesnap")
}

/// Ensure the environment can run captures; returns the Chromium path.
///
/// Idempotent: safe to call before every run. The marker records the
/// browser path that passed the probe; if that path has since disappeared
/// the probe runs again rather than trusting the marker.
pub fn ensure_ready() -> Result<PathBuf> {
    ensure_ready_in(&home_dir(), find_chromium)
}

fn ensure_ready_in(
    home: &Path,
    probe: impl FnOnce() -> Option<PathBuf>,
) -> Result<PathBuf> {
    let marker = home.join(MARKER_FILE);

    if let Ok(recorded) = std::fs::read_to_string(&marker) {
        let recorded = PathBuf::from(recorded.trim());
        if recorded.exists() {
            return Ok(recorded);
        }
        info!("recorded browser path is gone, re-probing");
    }

    let Some(found) = probe() else {
        bail!(
            "Chromium not found. Install Chrome/Chromium or set PAGESNAP_CHROMIUM_PATH; \
             run `pagesnap doctor` for details."
        );
    };

    std::fs::create_dir_all(home)
        .with_context(|| format!("failed to create {}", home.display()))?;
    std::fs::write(&marker, format!("{}\n", found.display()))
        .with_context(|| format!("failed to write readiness marker {}", marker.display()))?;
    info!(browser = %found.display(), "environment ready");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_browser(dir: &Path) -> PathBuf {
        let path = dir.join("chrome");
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn first_run_probes_and_writes_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".pagesnap");
        let browser = fake_browser(dir.path());

        let found = ensure_ready_in(&home, || Some(browser.clone())).unwrap();
        assert_eq!(found, browser);

        let marker = std::fs::read_to_string(home.join(MARKER_FILE)).unwrap();
        assert_eq!(PathBuf::from(marker.trim()), browser);
    }

    #[test]
    fn valid_marker_is_trusted_without_reprobing() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".pagesnap");
        let browser = fake_browser(dir.path());

        ensure_ready_in(&home, || Some(browser.clone())).unwrap();
        // Second call: the probe must not even run.
        let found = ensure_ready_in(&home, || panic!("probe ran despite valid marker")).unwrap();
        assert_eq!(found, browser);
    }

    #[test]
    fn stale_marker_triggers_a_reprobe() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".pagesnap");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::write(home.join(MARKER_FILE), "/nonexistent/chrome\n").unwrap();

        let browser = fake_browser(dir.path());
        let found = ensure_ready_in(&home, || Some(browser.clone())).unwrap();
        assert_eq!(found, browser);

        // The marker now records the path that actually exists.
        let marker = std::fs::read_to_string(home.join(MARKER_FILE)).unwrap();
        assert_eq!(PathBuf::from(marker.trim()), browser);
    }

    #[test]
    fn failed_probe_is_an_error_and_leaves_no_marker() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join(".pagesnap");

        let err = ensure_ready_in(&home, || None);
        assert!(err.is_err());
        assert!(!home.join(MARKER_FILE).exists());
    }
}
