use crate::console::{self, OutputLine, RenderMode};
use crate::model::{ExitReport, SearchConfig, SearchEvent};
use crate::orchestrator::{PathDestination, SearchController};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "marketplace-search",
    version,
    about = "Run the marketplace search worker and stream its output"
)]
pub struct Cli {
    /// Keywords for a one-shot search; without keywords the interactive console starts
    pub keywords: Vec<String>,

    /// Worker executable
    #[arg(long, default_value = "python")]
    pub program: String,

    /// Worker script passed to the executable before the keywords (empty to omit)
    #[arg(long, default_value = "python/search_marketplaces.py")]
    pub script: String,

    /// Where the worker writes its results
    #[arg(long, default_value = "python/results.csv")]
    pub results: PathBuf,

    /// Pause control file handed to the worker (default: user cache directory)
    #[arg(long)]
    pub pause_file: Option<PathBuf>,

    /// Working directory for the worker
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// After a one-shot search, copy the results here
    #[arg(long)]
    pub export_to: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Log filter used when RUST_LOG is not set (e.g. debug, marketplace_search=trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Build a `SearchConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SearchConfig {
    let program_args = if args.script.trim().is_empty() {
        Vec::new()
    } else {
        vec![args.script.clone()]
    };
    SearchConfig {
        program: args.program.clone(),
        program_args,
        results_path: args.results.clone(),
        pause_file: args
            .pause_file
            .clone()
            .unwrap_or_else(crate::storage::default_pause_file),
        working_dir: args.cwd.clone(),
    }
}

fn render_mode(args: &Cli) -> RenderMode {
    if args.json {
        RenderMode::Json
    } else {
        RenderMode::Text
    }
}

/// Run the selected mode and return the process exit code.
pub async fn run(args: Cli) -> Result<i32> {
    let cfg = build_config(&args);
    let mode = render_mode(&args);

    match console::normalize_keywords(args.keywords.iter().map(String::as_str)) {
        Some(keywords) => run_once(cfg, keywords, args.export_to.clone(), mode).await,
        None if args.keywords.is_empty() => {
            console::run(cfg, mode).await?;
            Ok(0)
        }
        None => Err(anyhow::anyhow!("Enter at least one keyword")),
    }
}

/// One search, start to finish. Exits with the worker's code, or 1 when the
/// worker could not start or was killed.
async fn run_once(
    cfg: SearchConfig,
    keywords: Vec<String>,
    export_to: Option<PathBuf>,
    mode: RenderMode,
) -> Result<i32> {
    let (out_tx, out_handle) = console::spawn_output_writer();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SearchEvent>();
    let render_handle = console::spawn_renderer(event_rx, out_tx.clone(), mode);

    let mut controller = SearchController::new(cfg, event_tx);
    controller.start(&keywords);

    let report = wait_for_exit(&mut controller).await?;

    if let Some(dest) = export_to {
        let mut chooser = PathDestination::new(Some(dest), crate::storage::default_export_dir());
        controller.export_results(&mut chooser);
    }

    // Dropping the controller closes the event channel so the renderer can finish.
    drop(controller);
    let _ = render_handle.await;
    if report.is_none() && mode == RenderMode::Text {
        let _ = out_tx.send(OutputLine::Stderr("Search did not complete.".into()));
    }
    drop(out_tx);
    let _ = out_handle.await;

    Ok(report.and_then(|r| r.code).unwrap_or(1))
}

/// Wait for the started worker, killing it on Ctrl-C. `None` when no worker was
/// started or it was interrupted.
async fn wait_for_exit(controller: &mut SearchController) -> Result<Option<ExitReport>> {
    // A worker that already exited is still retained; `next_exit` reports it at once.
    if !controller.has_worker() {
        return Ok(None);
    }
    tokio::select! {
        report = controller.next_exit() => Ok(report),
        res = tokio::signal::ctrl_c() => {
            res.context("listen for ctrl-c")?;
            controller.stop();
            controller.shutdown().await;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_bundled_worker() {
        let args = Cli::parse_from(["marketplace-search", "--pause-file", "/tmp/p"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.program, "python");
        assert_eq!(cfg.program_args, ["python/search_marketplaces.py"]);
        assert_eq!(cfg.results_path, PathBuf::from("python/results.csv"));
        assert_eq!(cfg.pause_file, PathBuf::from("/tmp/p"));
        assert!(args.keywords.is_empty());
    }

    #[test]
    fn empty_script_is_omitted() {
        let args = Cli::parse_from([
            "marketplace-search",
            "--program",
            "./worker",
            "--script",
            "",
            "lamp",
            "desk",
        ]);
        let cfg = build_config(&args);
        assert_eq!(cfg.program, "./worker");
        assert!(cfg.program_args.is_empty());
        assert_eq!(args.keywords, ["lamp", "desk"]);
    }

    #[test]
    fn default_pause_file_lives_in_app_dir() {
        let args = Cli::parse_from(["marketplace-search"]);
        let cfg = build_config(&args);
        assert!(cfg.pause_file.ends_with("marketplace-search/pause"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn one_shot_returns_worker_exit_code_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SearchConfig {
            program: "sh".into(),
            program_args: vec![
                "-c".into(),
                "printf 'keyword\\n%s\\n' \"$1\" > results.csv; exit 2".into(),
                "worker".into(),
            ],
            results_path: dir.path().join("results.csv"),
            pause_file: dir.path().join("pause"),
            working_dir: Some(dir.path().to_path_buf()),
        };
        let dest = dir.path().join("exported.csv");

        let code = run_once(cfg, vec!["lamp".into()], Some(dest.clone()), RenderMode::Json)
            .await
            .unwrap();

        assert_eq!(code, 2);
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "keyword\nlamp\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn already_exited_worker_still_reports_its_code() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SearchConfig {
            program: "sh".into(),
            program_args: vec!["-c".into(), "exit 0".into()],
            results_path: dir.path().join("results.csv"),
            pause_file: dir.path().join("pause"),
            working_dir: None,
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = SearchController::new(cfg, tx);
        controller.start(&["lamp".into()]);

        while !matches!(rx.recv().await, Some(SearchEvent::Finished(_)) | None) {}
        while controller.is_running() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let report = wait_for_exit(&mut controller).await.unwrap();
        assert_eq!(report.and_then(|r| r.code), Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn one_shot_spawn_failure_exits_with_one() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SearchConfig {
            program: dir.path().join("missing").display().to_string(),
            program_args: Vec::new(),
            results_path: dir.path().join("results.csv"),
            pause_file: dir.path().join("pause"),
            working_dir: None,
        };

        let code = run_once(cfg, vec!["lamp".into()], None, RenderMode::Json)
            .await
            .unwrap();
        assert_eq!(code, 1);
    }
}
