//! Console logging plus optional rotating JSON log files.
//!
//! # Configuration
//!
//! - `RUST_LOG`: level applied to the workspace crates (default `info`);
//!   everything else logs at `warn`
//! - `STROFLO_FILE_LOGGING`: `true` or `1` enables file output
//! - `STROFLO_LOG_DIR`: log directory (default `{asset_dir}/logs`)
//! - `STROFLO_LOG_MAX_FILES`: daily files to keep (default 7)

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};
use utils::assets::log_dir;

const LOG_FILE_PREFIX: &str = "stroflo.log";
const DEFAULT_MAX_FILES: usize = 7;
const WORKSPACE_CRATES: &[&str] = &["server", "services", "remote", "db", "utils"];

#[derive(Debug, Clone, PartialEq)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub max_files: usize,
}

impl FileLoggingConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("STROFLO_FILE_LOGGING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_files = std::env::var("STROFLO_LOG_MAX_FILES")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_FILES);

        Self {
            enabled,
            log_dir: log_dir(),
            max_files,
        }
    }
}

/// `warn` globally, `log_level` for our own crates.
pub fn filter_directives(log_level: &str) -> String {
    std::iter::once("warn".to_string())
        .chain(
            WORKSPACE_CRATES
                .iter()
                .map(|name| format!("{name}={log_level}")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directives(log_level)).unwrap_or_else(|e| {
        eprintln!("Invalid log level {log_level:?} ({e}); falling back to info");
        EnvFilter::new(filter_directives("info"))
    })
}

/// Installs the global subscriber. Hold the returned guard until shutdown
/// so buffered file output is flushed.
pub fn init_logging(log_level: &str) -> Option<WorkerGuard> {
    let config = FileLoggingConfig::from_env();
    let console_layer = tracing_subscriber::fmt::layer().with_filter(env_filter(log_level));

    if !config.enabled {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!(
            "Failed to create log directory {:?}: {}",
            config.log_dir, e
        );
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(env_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = ?config.log_dir,
        max_files = config.max_files,
        "File logging enabled"
    );

    let FileLoggingConfig {
        log_dir, max_files, ..
    } = config;
    std::thread::spawn(move || prune_old_logs(&log_dir, max_files));

    Some(guard)
}

/// Deletes all but the `max_files` most recently modified log files.
/// Returns how many were removed.
pub fn prune_old_logs(log_dir: &Path, max_files: usize) -> usize {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return 0;
    };

    let mut log_files: Vec<_> = entries
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((e.path(), modified))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.into_iter().skip(max_files) {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(?path, "Removed old log file");
                removed += 1;
            }
            Err(e) => tracing::warn!(?path, error = %e, "Failed to remove old log file"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use std::{env, fs, thread, time::Duration};

    use serial_test::serial;

    use super::*;

    #[test]
    fn test_filter_covers_workspace_crates() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("services=debug"));
        assert!(directives.contains("remote=debug"));
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        // SAFETY: Tests run serially via #[serial] attribute
        unsafe {
            env::remove_var("STROFLO_FILE_LOGGING");
            env::remove_var("STROFLO_LOG_MAX_FILES");
        }
        let config = FileLoggingConfig::from_env();
        assert!(!config.enabled);
        assert_eq!(config.max_files, DEFAULT_MAX_FILES);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        // SAFETY: Tests run serially via #[serial] attribute
        unsafe {
            env::set_var("STROFLO_FILE_LOGGING", "1");
            env::set_var("STROFLO_LOG_MAX_FILES", "3");
        }
        let config = FileLoggingConfig::from_env();
        unsafe {
            env::remove_var("STROFLO_FILE_LOGGING");
            env::remove_var("STROFLO_LOG_MAX_FILES");
        }
        assert!(config.enabled);
        assert_eq!(config.max_files, 3);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=4 {
            fs::write(dir.path().join(format!("{LOG_FILE_PREFIX}.2026-01-0{day}")), "x").unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        fs::write(dir.path().join("other.txt"), "x").unwrap();

        assert_eq!(prune_old_logs(dir.path(), 2), 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "other.txt".to_string(),
                format!("{LOG_FILE_PREFIX}.2026-01-03"),
                format!("{LOG_FILE_PREFIX}.2026-01-04"),
            ]
        );
    }
}
