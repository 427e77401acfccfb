//! Filesystem helpers: default locations, export file naming and the artifact copy.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

const APP_DIR: &str = "marketplace-search";

/// Default location of the pause control file.
pub fn default_pause_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("pause")
}

/// Directory used for exports when no destination is given.
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Insert a timestamp before the extension: `results.csv` -> `results-2024-05-01_10-20-30.csv`.
pub fn timestamped_name(suggested: &str, at: OffsetDateTime) -> String {
    let fmt = time::macros::format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let stamp = at.format(&fmt).unwrap_or_else(|_| "now".into());
    let path = Path::new(suggested);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{stamp}.{ext}"),
        None => format!("{stem}-{stamp}"),
    }
}

/// Local time when the offset is known, UTC otherwise.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// True when both paths resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy `src` verbatim to `dst`, creating the destination directory if needed.
/// Returns the number of bytes at `dst`.
///
/// When `dst` already is `src` the file is left untouched; `fs::copy` would
/// truncate it before reading.
pub fn copy_artifact(src: &Path, dst: &Path) -> Result<u64> {
    if same_file(src, dst) {
        let len = std::fs::metadata(src)
            .with_context(|| format!("stat {}", src.display()))?
            .len();
        return Ok(len);
    }
    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    std::fs::copy(src, dst).with_context(|| format!("copy {} to {}", src.display(), dst.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamped_name_keeps_extension() {
        let at = datetime!(2024-05-01 10:20:30 UTC);
        assert_eq!(
            timestamped_name("results.csv", at),
            "results-2024-05-01_10-20-30.csv"
        );
        assert_eq!(timestamped_name("report", at), "report-2024-05-01_10-20-30");
    }

    #[test]
    fn copy_artifact_is_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("results.csv");
        let bytes = b"\xef\xbb\xbfmarketplace,title\r\nebay,lamp\r\n";
        std::fs::write(&src, bytes).unwrap();

        let dst = dir.path().join("out").join("copy.csv");
        let copied = copy_artifact(&src, &dst).unwrap();

        assert_eq!(copied, bytes.len() as u64);
        assert_eq!(std::fs::read(&dst).unwrap(), bytes);
    }

    #[test]
    fn copy_onto_itself_leaves_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("results.csv");
        std::fs::write(&src, "marketplace,title\nebay,lamp\n").unwrap();

        // Same file reached through a different spelling.
        let dst = dir.path().join(".").join("results.csv");
        assert_eq!(copy_artifact(&src, &dst).unwrap(), 28);
        assert_eq!(
            std::fs::read_to_string(&src).unwrap(),
            "marketplace,title\nebay,lamp\n"
        );
    }

    #[test]
    fn copy_artifact_reports_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_artifact(&dir.path().join("missing.csv"), &dir.path().join("x.csv"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("missing.csv"));
    }
}
