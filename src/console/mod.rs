//! Line-oriented display surface and command input.

mod help;
mod output;

pub(crate) use output::{spawn_output_writer, OutputLine};

use crate::model::{SearchConfig, SearchEvent};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderMode {
    Text,
    /// One JSON object per event.
    Json,
}

/// Render an event as one display line.
pub(crate) fn render_event(ev: &SearchEvent, mode: RenderMode) -> Result<String> {
    match mode {
        RenderMode::Json => serde_json::to_string(ev).context("serialize event"),
        RenderMode::Text => Ok(match ev {
            SearchEvent::Log(log) => log.to_message(),
            SearchEvent::Error(msg) => format!("[ERROR] {msg}"),
            SearchEvent::Finished(report) => format!("\n✅ {}", report.to_message()),
        }),
    }
}

/// Forward events to the output writer until every event sender is gone.
pub(crate) fn spawn_renderer(
    mut event_rx: UnboundedReceiver<SearchEvent>,
    out_tx: UnboundedSender<OutputLine>,
    mode: RenderMode,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            match render_event(&ev, mode) {
                Ok(line) => {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
                Err(e) => warn!(error = %e, "failed to render event"),
            }
        }
    })
}

/// Trim keywords and drop empty ones. `None` when nothing is left.
pub(crate) fn normalize_keywords<'a>(raw: impl IntoIterator<Item = &'a str>) -> Option<Vec<String>> {
    let keywords: Vec<String> = raw
        .into_iter()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    (!keywords.is_empty()).then_some(keywords)
}

/// Split a comma-separated keyword line.
pub(crate) fn parse_keywords(line: &str) -> Option<Vec<String>> {
    normalize_keywords(line.split(','))
}

#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
    Command(UiCommand),
    Help,
    Blank,
    Invalid(String),
}

fn parse_input(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Blank;
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    match verb.to_ascii_lowercase().as_str() {
        "search" | "s" => match parse_keywords(rest) {
            Some(keywords) => ConsoleInput::Command(UiCommand::Start(keywords)),
            None => ConsoleInput::Invalid("Enter at least one keyword!".into()),
        },
        "pause" | "p" => ConsoleInput::Command(UiCommand::Pause),
        "resume" | "r" => ConsoleInput::Command(UiCommand::Resume),
        "stop" | "x" => ConsoleInput::Command(UiCommand::Stop),
        "export" | "e" => ConsoleInput::Command(UiCommand::Export(
            (!rest.is_empty()).then(|| PathBuf::from(rest)),
        )),
        "help" | "?" => ConsoleInput::Help,
        "quit" | "q" | "exit" => ConsoleInput::Command(UiCommand::Quit),
        other => ConsoleInput::Invalid(format!("Unknown command '{other}'. Type 'help'.")),
    }
}

/// Run the interactive console until `quit`, end of input or Ctrl-C.
pub(crate) async fn run(cfg: SearchConfig, mode: RenderMode) -> Result<()> {
    // Unbounded channels: the worker's output volume is small and there is no backpressure signal.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SearchEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let (out_tx, out_handle) = spawn_output_writer();

    let render_handle = spawn_renderer(event_rx, out_tx.clone(), mode);
    let controller = tokio::spawn(orchestrator::run_controller(cfg, event_tx, cmd_rx));

    let _ = out_tx.send(OutputLine::Stderr(help::banner()));
    let input = read_commands(&cmd_tx, &out_tx).await;

    let _ = cmd_tx.send(UiCommand::Quit);
    let res = controller.await.context("controller task failed")?;
    let _ = render_handle.await;
    drop(out_tx);
    let _ = out_handle.await;

    input.and(res)
}

async fn read_commands(
    cmd_tx: &UnboundedSender<UiCommand>,
    out_tx: &UnboundedSender<OutputLine>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("read command")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        match parse_input(&line) {
            ConsoleInput::Command(UiCommand::Quit) => return Ok(()),
            ConsoleInput::Command(cmd) => {
                if let UiCommand::Start(keywords) = &cmd {
                    let _ = out_tx.send(OutputLine::Stdout(format!(
                        "── Searching: {} ──",
                        keywords.join(", ")
                    )));
                }
                if cmd_tx.send(cmd).is_err() {
                    return Ok(());
                }
            }
            ConsoleInput::Help => {
                let _ = out_tx.send(OutputLine::Stdout(help::help_text()));
            }
            ConsoleInput::Blank => {}
            ConsoleInput::Invalid(msg) => {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExitReport, LogEvent};

    #[test]
    fn keywords_are_trimmed_and_empty_entries_dropped() {
        assert_eq!(
            parse_keywords(" lamp ,, desk lamp,"),
            Some(vec!["lamp".to_string(), "desk lamp".to_string()])
        );
        assert_eq!(parse_keywords(" , "), None);
        assert_eq!(parse_keywords(""), None);
    }

    #[test]
    fn parse_search_command() {
        assert_eq!(
            parse_input("search lamp, desk"),
            ConsoleInput::Command(UiCommand::Start(vec!["lamp".into(), "desk".into()]))
        );
        assert!(matches!(parse_input("s"), ConsoleInput::Invalid(_)));
    }

    #[test]
    fn parse_control_commands() {
        assert_eq!(parse_input("PAUSE"), ConsoleInput::Command(UiCommand::Pause));
        assert_eq!(parse_input("r"), ConsoleInput::Command(UiCommand::Resume));
        assert_eq!(parse_input(" stop "), ConsoleInput::Command(UiCommand::Stop));
        assert_eq!(parse_input("q"), ConsoleInput::Command(UiCommand::Quit));
        assert_eq!(parse_input("?"), ConsoleInput::Help);
        assert_eq!(parse_input("   "), ConsoleInput::Blank);
        assert!(matches!(parse_input("launch"), ConsoleInput::Invalid(_)));
    }

    #[test]
    fn parse_export_with_and_without_path() {
        assert_eq!(
            parse_input("export"),
            ConsoleInput::Command(UiCommand::Export(None))
        );
        assert_eq!(
            parse_input("export /tmp/my results.csv"),
            ConsoleInput::Command(UiCommand::Export(Some(PathBuf::from(
                "/tmp/my results.csv"
            ))))
        );
    }

    #[test]
    fn text_rendering_marks_errors_and_finish() {
        let log = SearchEvent::Log(LogEvent::Output("found 3 items".into()));
        assert_eq!(render_event(&log, RenderMode::Text).unwrap(), "found 3 items");

        let err = SearchEvent::error("No results to export yet.");
        assert_eq!(
            render_event(&err, RenderMode::Text).unwrap(),
            "[ERROR] No results to export yet."
        );

        let fin = SearchEvent::Finished(ExitReport {
            worker_id: 1,
            code: Some(0),
            elapsed_ms: 0,
        });
        let line = render_event(&fin, RenderMode::Text).unwrap();
        assert!(line.starts_with("\n✅ "));
        assert!(line.contains("exit code 0"));
    }

    #[test]
    fn json_rendering_is_one_object_per_event() {
        let ev = SearchEvent::Log(LogEvent::Output("found 3 items".into()));
        let line = render_event(&ev, RenderMode::Json).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["Log"]["Output"], "found 3 items");
    }
}
