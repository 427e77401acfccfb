//! Search lifecycle controller.
//!
//! Owns start/pause/resume/stop/export for the external search worker and emits
//! events for presentation layers.

use super::export::{self, DestinationChooser, PathDestination};
use crate::model::{ExitReport, LogEvent, SearchConfig, SearchEvent};
use crate::storage;
use crate::worker::{self, PauseSignal, WorkerHandle};
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Commands emitted by UI layers to control the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UiCommand {
    Start(Vec<String>),
    Pause,
    Resume,
    Stop,
    /// Export the results, optionally to an explicit path.
    Export(Option<PathBuf>),
    Quit,
}

/// Holds at most one active worker plus the advisory pause flag.
///
/// Every operation is non-blocking; output and exit arrive later as events.
pub struct SearchController {
    cfg: SearchConfig,
    event_tx: UnboundedSender<SearchEvent>,
    current: Option<WorkerHandle>,
    pause: PauseSignal,
    pause_requested: bool,
    next_worker_id: u64,
}

impl SearchController {
    pub fn new(cfg: SearchConfig, event_tx: UnboundedSender<SearchEvent>) -> Self {
        let pause = PauseSignal::new(cfg.pause_file.clone());
        // A stale control file from an earlier session would pause the first worker.
        if let Err(e) = pause.clear() {
            warn!(error = %e, "failed to clear stale pause file");
        }
        Self {
            cfg,
            event_tx,
            current: None,
            pause,
            pause_requested: false,
            next_worker_id: 1,
        }
    }

    pub fn pause_requested(&self) -> bool {
        self.pause_requested
    }

    /// True while a worker process is alive.
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// True while a handle is retained, including a worker that exited but was not reaped yet.
    pub fn has_worker(&self) -> bool {
        self.current.is_some()
    }

    /// Id of the retained worker handle, clearing it first if the worker exited.
    pub fn current_worker_id(&mut self) -> Option<u64> {
        self.reap();
        self.current.as_ref().map(WorkerHandle::id)
    }

    /// Launch the worker with one argument per keyword.
    ///
    /// Keywords are not validated here. A worker that is still running is stopped
    /// first, so at most one search is ever active. A pending pause request is
    /// dropped silently and the control file removed before the new worker spawns.
    pub fn start(&mut self, keywords: &[String]) {
        self.reap();
        if let Some(prev) = self.current.take() {
            info!(worker = prev.id(), "replacing running worker");
            prev.kill();
            self.emit(SearchEvent::message(format!(
                "Stopping previous search (worker {})...",
                prev.id()
            )));
        }

        // A pause request belongs to the search it was made for.
        self.withdraw_pause();

        let id = self.next_worker_id;
        self.next_worker_id += 1;

        match worker::spawn_worker(id, &self.cfg, keywords, self.event_tx.clone()) {
            Ok(handle) => {
                info!(worker = id, pid = ?handle.pid(), ?keywords, "search started");
                self.current = Some(handle);
            }
            Err(e) => {
                warn!(worker = id, program = %self.cfg.program, error = %e, "spawn failed");
                self.emit(SearchEvent::error(format!(
                    "Failed to start worker '{}': {e}",
                    self.cfg.program
                )));
            }
        }
    }

    /// Record a pause request and raise the control file. The worker process is
    /// not suspended or signalled. No-op without a running worker or when already requested.
    pub fn request_pause(&mut self) {
        if !self.is_running() || self.pause_requested {
            return;
        }
        self.pause_requested = true;
        if let Err(e) = self.pause.raise() {
            warn!(error = %e, "failed to raise pause file");
        }
        debug!(
            path = %self.pause.path().display(),
            raised = self.pause.is_raised(),
            "pause requested"
        );
        self.emit(SearchEvent::Log(LogEvent::PauseRequested));
    }

    /// Withdraw a pause request. No-op if none is pending.
    pub fn resume(&mut self) {
        if !self.pause_requested {
            return;
        }
        self.pause_requested = false;
        if let Err(e) = self.pause.clear() {
            warn!(error = %e, "failed to clear pause file");
        }
        debug!("pause withdrawn");
        self.emit(SearchEvent::Log(LogEvent::Resumed));
    }

    /// Kill the worker and drop its handle. No-op when there is no handle.
    ///
    /// The handle is cleared even if the worker already exited.
    pub fn stop(&mut self) {
        if let Some(worker) = self.current.take() {
            info!(worker = worker.id(), "stopping search");
            worker.kill();
            self.emit(SearchEvent::Log(LogEvent::Stopped));
        }
    }

    /// Copy the results artifact to a destination picked by `chooser`.
    /// Independent of the worker lifecycle.
    pub fn export_results(&self, chooser: &mut dyn DestinationChooser) -> Option<PathBuf> {
        export::export_results(&self.cfg.results_path, chooser, &self.event_tx)
    }

    /// Resolves when the retained worker exits, then clears it. Pending while no
    /// worker is retained.
    ///
    /// Cancel-safe: the join handle is only polled by reference, so dropping this
    /// future in a `select!` loses nothing.
    pub async fn next_exit(&mut self) -> Option<ExitReport> {
        let Some(worker) = self.current.as_mut() else {
            return futures::future::pending().await;
        };
        let joined = worker.join().await;
        self.current = None;
        match joined {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "worker task failed");
                None
            }
        }
    }

    /// Kill any active worker, wait for its final event and withdraw the pause file.
    pub async fn shutdown(&mut self) {
        if let Some(mut worker) = self.current.take() {
            worker.kill();
            if let Err(e) = worker.join().await {
                warn!(error = %e, "worker task failed during shutdown");
            }
        }
        if let Err(e) = self.pause.clear() {
            warn!(error = %e, "failed to clear pause file");
        }
    }

    fn withdraw_pause(&mut self) {
        if !self.pause_requested && !self.pause.is_raised() {
            return;
        }
        self.pause_requested = false;
        if let Err(e) = self.pause.clear() {
            warn!(error = %e, "failed to clear pause file");
        }
        debug!("pause request dropped for new search");
    }

    fn reap(&mut self) {
        if self.current.as_ref().is_some_and(WorkerHandle::is_finished) {
            self.current = None;
        }
    }

    fn emit(&self, ev: SearchEvent) {
        let _ = self.event_tx.send(ev);
    }
}

/// Apply UI commands to a [`SearchController`] and reap finished workers until quit.
pub(crate) async fn run_controller(
    cfg: SearchConfig,
    event_tx: UnboundedSender<SearchEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let export_dir = storage::default_export_dir();
    let mut controller = SearchController::new(cfg, event_tx);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start(keywords)) => controller.start(&keywords),
                    Some(UiCommand::Pause) => controller.request_pause(),
                    Some(UiCommand::Resume) => controller.resume(),
                    Some(UiCommand::Stop) => controller.stop(),
                    Some(UiCommand::Export(path)) => {
                        let mut chooser = PathDestination::new(path, export_dir.clone());
                        controller.export_results(&mut chooser);
                    }
                    Some(UiCommand::Quit) | None => {
                        // Quit waits for the worker's final event so the display sees it.
                        controller.shutdown().await;
                        break;
                    }
                }
            }
            report = controller.next_exit() => {
                if let Some(r) = report {
                    debug!(worker = r.worker_id, code = ?r.code, "worker reaped");
                }
            }
        }
    }

    Ok(())
}
