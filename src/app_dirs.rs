use directories::ProjectDirs;
use std::path::PathBuf;

/// Overrides the data directory, mainly for tests and portable installs
pub const DATA_DIR_ENV: &str = "STREETFIND_DATA_DIR";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Persistent state: leaderboards, the SQLite file and the game log
    pub fn data_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("streetfind")
        } else {
            ProjectDirs::from("", "", "streetfind")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("streetfind_data"))
        }
    }
}
