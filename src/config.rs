use crate::session::{SessionConfig, TimeoutPolicy, MAX_RESULT_DISPLAY_SECS, MAX_ROUND_SECS};
use crate::source::{Anchor, DEFAULT_RADIUS_M};
use crate::store::StoreBackend;
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Presentation only; scoring is the same at both levels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    /// Show the play area bounds with every round
    #[default]
    Easy,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub total_rounds: u32,
    pub round_secs: u32,
    pub result_display_secs: u64,
    pub difficulty: Difficulty,
    pub timeout_policy: TimeoutPolicy,
    pub district_anchor: Anchor,
    pub search_radius_m: u32,
    pub store: StoreBackend,
}

impl Default for Config {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            total_rounds: session.total_rounds,
            round_secs: session.round_secs,
            result_display_secs: session.result_display.as_secs(),
            difficulty: Difficulty::default(),
            timeout_policy: session.timeout_policy,
            district_anchor: Anchor::default(),
            search_radius_m: DEFAULT_RADIUS_M,
            store: StoreBackend::default(),
        }
    }
}

impl Config {
    /// Session settings with timings clamped to `1..=MAX_ROUND_SECS` and
    /// `0..=MAX_RESULT_DISPLAY_SECS`
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            total_rounds: self.total_rounds.max(1),
            round_secs: self.round_secs.clamp(1, MAX_ROUND_SECS),
            result_display: Duration::from_secs(self.result_display_secs.min(MAX_RESULT_DISPLAY_SECS)),
            timeout_policy: self.timeout_policy,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "streetfind") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("streetfind_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("{}: {e}, using defaults", self.path.display()),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
