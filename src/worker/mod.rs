mod pause;

pub use pause::PauseSignal;

use crate::model::{ExitReport, LogEvent, SearchConfig, SearchEvent, PAUSE_FILE_ENV};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

/// Read buffer for one stream chunk.
const CHUNK_SIZE: usize = 8 * 1024;

/// How long to wait for stream readers after the process is gone. Grandchildren
/// that inherited the pipes can keep them open past the worker's own exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub enum WorkerControl {
    /// Terminate the worker process immediately.
    Kill,
}

/// Handle for a spawned worker process.
///
/// The process itself is owned by a background task; the handle only carries the
/// control channel and the task's join handle.
pub struct WorkerHandle {
    id: u64,
    pid: Option<u32>,
    ctrl_tx: mpsc::UnboundedSender<WorkerControl>,
    handle: JoinHandle<ExitReport>,
}

impl WorkerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True once the worker exited and its final event was emitted.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the worker task to kill the process. Does not wait.
    pub fn kill(&self) {
        // Closed channel means the task already finished.
        let _ = self.ctrl_tx.send(WorkerControl::Kill);
    }

    /// Wait for the worker task. Safe to drop and call again.
    pub async fn join(&mut self) -> Result<ExitReport, JoinError> {
        (&mut self.handle).await
    }
}

/// Build the worker command: `program [program_args...] keyword...`.
pub fn build_command(cfg: &SearchConfig, keywords: &[String]) -> Command {
    let mut cmd = Command::new(&cfg.program);
    cmd.args(&cfg.program_args)
        .args(keywords)
        .env(PAUSE_FILE_ENV, &cfg.pause_file)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &cfg.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

/// Spawn the worker and start relaying its output as [`SearchEvent`]s.
///
/// Must be called from within a tokio runtime. Returns immediately; a
/// [`SearchEvent::Finished`] is emitted once the process exits and both streams
/// are drained.
pub fn spawn_worker(
    id: u64,
    cfg: &SearchConfig,
    keywords: &[String],
    event_tx: mpsc::UnboundedSender<SearchEvent>,
) -> std::io::Result<WorkerHandle> {
    let mut child = build_command(cfg, keywords).spawn()?;
    let pid = child.id();
    debug!(worker = id, ?pid, program = %cfg.program, ?keywords, "worker spawned");

    let readers: Vec<JoinHandle<()>> = [
        child.stdout.take().map(|s| spawn_relay(id, "stdout", s, event_tx.clone())),
        child.stderr.take().map(|s| spawn_relay(id, "stderr", s, event_tx.clone())),
    ]
    .into_iter()
    .flatten()
    .collect();

    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<WorkerControl>();
    let started = Instant::now();
    let handle = tokio::spawn(async move {
        let status = supervise(id, &mut child, ctrl_rx).await;
        drain_readers(id, readers).await;

        let report = ExitReport {
            worker_id: id,
            code: status.and_then(|s| s.code()),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        debug!(worker = id, code = ?report.code, "worker finished");
        let _ = event_tx.send(SearchEvent::Finished(report.clone()));
        report
    });

    Ok(WorkerHandle {
        id,
        pid,
        ctrl_tx,
        handle,
    })
}

/// Wait for the process to exit on its own or for a kill request.
async fn supervise(
    id: u64,
    child: &mut Child,
    mut ctrl_rx: mpsc::UnboundedReceiver<WorkerControl>,
) -> Option<ExitStatus> {
    let waited = tokio::select! {
        status = child.wait() => status,
        // A dropped handle closes the channel; that disables this branch and the
        // process keeps running until it exits.
        Some(WorkerControl::Kill) = ctrl_rx.recv() => {
            debug!(worker = id, "kill requested");
            if let Err(e) = child.kill().await {
                warn!(worker = id, error = %e, "failed to kill worker");
            }
            child.wait().await
        }
    };
    match waited {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(worker = id, error = %e, "failed to wait for worker");
            None
        }
    }
}

async fn drain_readers(id: u64, readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
            warn!(worker = id, "output stream still open after exit; abandoning it");
            reader.abort();
        }
    }
}

fn spawn_relay<R>(
    id: u64,
    stream: &'static str,
    reader: R,
    event_tx: mpsc::UnboundedSender<SearchEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(relay_chunks(id, stream, reader, event_tx))
}

/// Forward each chunk read from `reader` as a trimmed log event. stdout and
/// stderr are relayed the same way.
///
/// A multi-byte character split across two reads is held back and decoded with
/// the next chunk.
async fn relay_chunks<R>(
    id: u64,
    stream: &'static str,
    mut reader: R,
    event_tx: mpsc::UnboundedSender<SearchEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let keep = incomplete_utf8_tail(&pending);
                let tail = pending.split_off(pending.len() - keep);
                send_chunk(&pending, &event_tx);
                pending = tail;
            }
            Err(e) => {
                warn!(worker = id, stream, error = %e, "read failed");
                break;
            }
        }
    }
    send_chunk(&pending, &event_tx);
    debug!(worker = id, stream, "stream closed");
}

fn send_chunk(bytes: &[u8], event_tx: &mpsc::UnboundedSender<SearchEvent>) {
    let chunk = String::from_utf8_lossy(bytes);
    let text = chunk.trim();
    if !text.is_empty() {
        // Keep reading after the receiver is gone so the worker never blocks on a full pipe.
        let _ = event_tx.send(SearchEvent::Log(LogEvent::Output(text.to_string())));
    }
}

/// Length of a truncated UTF-8 sequence at the end of `bytes`, 0 if it ends on
/// a character boundary or with bytes that can never become valid.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let b = bytes[bytes.len() - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let width = match b {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        return if width > back { back } else { 0 };
    }
    0
}
