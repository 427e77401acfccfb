//! Results export.
//!
//! Copies the worker's results artifact to a destination picked by a
//! [`DestinationChooser`]. Outcomes are reported as events, never returned as errors.

use crate::model::{LogEvent, SearchEvent, DEFAULT_EXPORT_NAME};
use crate::storage;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Picks where exported results go.
pub trait DestinationChooser {
    /// Return the destination path, or `None` if the user cancelled.
    fn choose(&mut self, suggested_name: &str) -> Option<PathBuf>;
}

/// Chooser for the terminal: an explicit path when given (a directory gets the
/// suggested name appended), otherwise a timestamped file in `fallback_dir`.
#[derive(Debug, Clone)]
pub struct PathDestination {
    explicit: Option<PathBuf>,
    fallback_dir: PathBuf,
}

impl PathDestination {
    pub fn new(explicit: Option<PathBuf>, fallback_dir: PathBuf) -> Self {
        Self {
            explicit,
            fallback_dir,
        }
    }
}

impl DestinationChooser for PathDestination {
    fn choose(&mut self, suggested_name: &str) -> Option<PathBuf> {
        match self.explicit.take() {
            Some(p) if p.is_dir() => Some(p.join(suggested_name)),
            Some(p) => Some(p),
            None => Some(
                self.fallback_dir
                    .join(storage::timestamped_name(suggested_name, storage::now())),
            ),
        }
    }
}

/// Export the artifact at `source`.
///
/// - Missing artifact: one error event, the chooser is not consulted.
/// - Chooser cancelled: nothing is copied and nothing is emitted.
/// - Otherwise the bytes are copied and a confirmation naming the destination is emitted.
///
/// Returns the destination on success.
pub fn export_results(
    source: &Path,
    chooser: &mut dyn DestinationChooser,
    event_tx: &UnboundedSender<SearchEvent>,
) -> Option<PathBuf> {
    if !source.is_file() {
        let _ = event_tx.send(SearchEvent::error("⚠️ No results to export yet."));
        return None;
    }

    let dest = chooser.choose(DEFAULT_EXPORT_NAME)?;
    match storage::copy_artifact(source, &dest) {
        Ok(bytes) => {
            info!(src = %source.display(), dst = %dest.display(), bytes, "results exported");
            let _ = event_tx.send(SearchEvent::Log(LogEvent::Exported { path: dest.clone() }));
            Some(dest)
        }
        Err(e) => {
            let _ = event_tx.send(SearchEvent::error(format!("Export failed: {e:#}")));
            None
        }
    }
}
