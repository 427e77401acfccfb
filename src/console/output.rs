use std::io::Write;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
///
/// Only stdout stays locked for the writer's lifetime; stderr is shared with
/// the tracing subscriber and is locked per line.
pub(crate) fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let mut out = std::io::LineWriter::new(stdout.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = out.flush();
                    let _ = writeln!(std::io::stderr(), "{}", msg);
                }
            }
        }

        let _ = out.flush();
    });
    (tx, handle)
}
