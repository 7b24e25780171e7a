//! Scoped change of the process working directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Changes the working directory on creation and restores the previous one on drop.
///
/// Restoration happens on every exit path, including early returns and
/// unwinding panics, so the build and test stages can never leak a changed cwd.
#[derive(Debug)]
pub struct WorkdirGuard {
    previous: PathBuf,
}

impl WorkdirGuard {
    pub fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir().context("reading current directory")?;
        std::env::set_current_dir(dir)
            .with_context(|| format!("entering {}", dir.display()))?;
        tracing::debug!("cwd -> {}", dir.display());
        Ok(Self { previous })
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::error!("failed to restore cwd {}: {e}", self.previous.display());
        }
    }
}

/// Serializes tests that change the process-wide cwd.
#[cfg(test)]
pub(crate) static CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn lock_cwd() -> std::sync::MutexGuard<'static, ()> {
    CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
