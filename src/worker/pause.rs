//! Pause control file shared with the worker.
//!
//! The controller never suspends the worker process. Instead it raises a control
//! file whose path the worker receives through [`crate::model::PAUSE_FILE_ENV`];
//! a cooperating worker polls it between keyword batches and waits while it exists.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PauseSignal {
    path: PathBuf,
}

impl PauseSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the control file, including missing parent directories.
    pub fn raise(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        std::fs::write(&self.path, b"paused\n")
            .with_context(|| format!("write pause file {}", self.path.display()))
    }

    /// Remove the control file. A file that is already gone is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("remove pause file {}", self.path.display()))
            }
        }
    }

    pub fn is_raised(&self) -> bool {
        self.path.is_file()
    }
}
