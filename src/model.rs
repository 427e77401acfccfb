use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable through which the worker learns where the pause control file lives.
pub const PAUSE_FILE_ENV: &str = "MARKETPLACE_SEARCH_PAUSE_FILE";

/// File name suggested to the destination chooser on export.
pub const DEFAULT_EXPORT_NAME: &str = "results.csv";

#[derive(Debug, Clone, Serialize)]
pub struct SearchConfig {
    /// Worker executable (interpreter or binary).
    pub program: String,
    /// Arguments placed before the keywords, typically the worker script path.
    pub program_args: Vec<String>,
    /// Fixed location where the worker leaves its results artifact.
    pub results_path: PathBuf,
    /// Control file whose presence means "pause requested".
    pub pause_file: PathBuf,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub enum SearchEvent {
    Log(LogEvent),
    Error(String),
    Finished(ExitReport),
}

impl SearchEvent {
    pub fn message(msg: impl Into<String>) -> Self {
        SearchEvent::Log(LogEvent::Message(msg.into()))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        SearchEvent::Error(msg.into())
    }
}

/// Structured log lines emitted by the controller and consumed by display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LogEvent {
    /// A chunk of worker stdout/stderr, already trimmed.
    Output(String),
    PauseRequested,
    Resumed,
    Stopped,
    Exported { path: PathBuf },
    Message(String),
}

impl LogEvent {
    /// Render a human-readable message for display surfaces.
    pub fn to_message(&self) -> String {
        match self {
            LogEvent::Output(text) => text.clone(),
            LogEvent::PauseRequested => "⏸️ Pausing after the current search...".to_string(),
            LogEvent::Resumed => "▶️ Search resumed.".to_string(),
            LogEvent::Stopped => "🛑 Process stopped manually.".to_string(),
            LogEvent::Exported { path } => format!("💾 File exported to: {}", path.display()),
            LogEvent::Message(msg) => msg.clone(),
        }
    }
}

/// Terminal report for one worker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitReport {
    pub worker_id: u64,
    /// Exit status code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub elapsed_ms: u64,
}

impl ExitReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn to_message(&self) -> String {
        let took = humantime::format_duration(self.elapsed());
        match self.code {
            Some(code) => format!("Search finished (exit code {code}) after {took}."),
            None => format!("Search finished (terminated by signal) after {took}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_message_embeds_exit_code() {
        let report = ExitReport {
            worker_id: 1,
            code: Some(0),
            elapsed_ms: 1_500,
        };
        let msg = report.to_message();
        assert!(msg.contains("exit code 0"), "{msg}");
        assert!(msg.contains("1s 500ms"), "{msg}");
    }

    #[test]
    fn finished_message_for_signal() {
        let report = ExitReport {
            worker_id: 2,
            code: None,
            elapsed_ms: 0,
        };
        assert!(report.to_message().contains("terminated by signal"));
    }

    #[test]
    fn exported_message_names_destination() {
        let ev = LogEvent::Exported {
            path: PathBuf::from("/tmp/out.csv"),
        };
        assert_eq!(ev.to_message(), "💾 File exported to: /tmp/out.csv");
    }
}
