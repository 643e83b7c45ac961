use crate::session::RoundRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("could not open game log: {0}")]
    Io(#[from] std::io::Error),

    #[error("game log is malformed: {0}")]
    Csv(#[from] csv::Error),
}

/// File name of the game log inside the data directory
pub const HISTORY_FILE: &str = "history.csv";

/// One row of the finished-game log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub date: DateTime<Utc>,
    pub mode: String,
    pub rounds: u32,
    pub guessed: u32,
    pub score: u32,
    /// Mean distance of the rounds that had a guess
    pub avg_distance_km: Option<f64>,
}

impl GameSummary {
    pub fn from_rounds(mode: impl Into<String>, rounds: &[RoundRecord], date: DateTime<Utc>) -> Self {
        let distances: Vec<f64> = rounds
            .iter()
            .filter(|r| r.result.was_guessed())
            .map(|r| r.result.distance_km)
            .collect();
        let avg_distance_km =
            (!distances.is_empty()).then(|| distances.iter().sum::<f64>() / distances.len() as f64);

        Self {
            date,
            mode: mode.into(),
            rounds: rounds.len() as u32,
            guessed: distances.len() as u32,
            score: rounds.iter().map(|r| r.result.round_score).sum(),
            avg_distance_km,
        }
    }
}

/// Append-only CSV log of finished games
#[derive(Debug, Clone)]
pub struct GameLog {
    path: PathBuf,
}

impl GameLog {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, summary: &GameSummary) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(summary)?;
        writer.flush()?;
        Ok(())
    }

    /// All logged games, oldest first. A missing log is empty.
    pub fn read_all(&self) -> Result<Vec<GameSummary>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader.deserialize().collect::<Result<Vec<GameSummary>, _>>()?;
        Ok(rows)
    }
}
