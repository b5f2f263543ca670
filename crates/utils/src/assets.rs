use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Per-user data directory. Debug builds keep everything inside the repo.
///
/// Linux: `~/.local/share/stroflo`, macOS: `~/Library/Application Support/app.stroflo.stroflo`.
pub fn asset_dir() -> PathBuf {
    if cfg!(debug_assertions) {
        return PathBuf::from(PROJECT_ROOT).join("../../dev_assets");
    }
    ProjectDirs::from("app", "stroflo", "stroflo")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".stroflo"))
}

/// Directory for rotated log files.
///
/// Respects `STROFLO_LOG_DIR` (tilde expanded). Default: `{asset_dir}/logs`
pub fn log_dir() -> PathBuf {
    if let Ok(path) = std::env::var("STROFLO_LOG_DIR") {
        return PathBuf::from(shellexpand::tilde(&path).into_owned());
    }
    asset_dir().join("logs")
}
