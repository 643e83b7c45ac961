use crate::store::{KeyValueStore, StoreError};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Entries kept per leaderboard
pub const LEADERBOARD_CAPACITY: usize = 10;

/// Longest accepted player name, in characters
pub const MAX_NAME_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    pub date: DateTime<Utc>,
}

impl LeaderboardEntry {
    pub fn new(name: impl Into<String>, score: u32, date: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            score,
            date,
        }
    }
}

/// Each game variant keeps its own leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum LeaderboardKind {
    /// Streets around a clicked point
    Streets,
    /// Streets inside selected districts
    DistrictStreets,
    /// The districts themselves
    Districts,
}

impl LeaderboardKind {
    pub fn storage_key(&self) -> &'static str {
        match self {
            LeaderboardKind::Streets => "streetFinderLeaderboard",
            LeaderboardKind::DistrictStreets => "streetFinderV2Leaderboard",
            LeaderboardKind::Districts => "districtFinderLeaderboard",
        }
    }
}

/// Sorts by score, highest first (ties keep insertion order), and caps the list
pub fn rank(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(LEADERBOARD_CAPACITY);
    entries
}

#[derive(Debug)]
pub struct Leaderboard<S: KeyValueStore> {
    store: S,
    kind: LeaderboardKind,
    entries: Vec<LeaderboardEntry>,
}

impl<S: KeyValueStore> Leaderboard<S> {
    pub fn new(store: S, kind: LeaderboardKind) -> Self {
        let mut board = Self {
            store,
            kind,
            entries: Vec::new(),
        };
        board.entries = board.load();
        board
    }

    pub fn kind(&self) -> LeaderboardKind {
        self.kind
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    /// Reads the persisted list. Missing or unreadable data is an empty list.
    pub fn load(&self) -> Vec<LeaderboardEntry> {
        let key = self.kind.storage_key();
        match self.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<LeaderboardEntry>>(&raw) {
                Ok(entries) => rank(entries),
                Err(e) => {
                    warn!("leaderboard {key}: ignoring malformed data: {e}");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!("leaderboard {key}: no saved scores");
                Vec::new()
            }
            Err(e) => {
                warn!("leaderboard {key}: could not read storage: {e}");
                Vec::new()
            }
        }
    }

    /// Adds an entry, persists the top scores and returns them
    pub fn submit(&mut self, entry: LeaderboardEntry) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let mut entries = self.entries.clone();
        entries.push(entry);
        let entries = rank(entries);

        let raw = serde_json::to_string(&entries)?;
        self.store.set(self.kind.storage_key(), &raw)?;
        debug!(
            "leaderboard {}: saved {} entries",
            self.kind.storage_key(),
            entries.len()
        );

        self.entries = entries.clone();
        Ok(entries)
    }

    /// Position (1-based) a score would take, if it makes the board
    pub fn rank_of(&self, score: u32) -> Option<usize> {
        let pos = self.entries.iter().take_while(|e| e.score >= score).count();
        (pos < LEADERBOARD_CAPACITY).then_some(pos + 1)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_empty_when_nothing_saved() {
        let board = Leaderboard::new(MemoryStore::new(), LeaderboardKind::Districts);
        assert!(board.entries().is_empty());
        assert!(board.load().is_empty());
    }

    #[test]
    fn test_malformed_data_loads_empty() {
        let store = MemoryStore::new();
        store
            .set(LeaderboardKind::Districts.storage_key(), "{not json")
            .unwrap();
        let board = Leaderboard::new(store, LeaderboardKind::Districts);
        assert!(board.entries().is_empty());
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let store = MemoryStore::new();
        store
            .set(LeaderboardKind::Streets.storage_key(), r#"{"name":"a"}"#)
            .unwrap();
        let board = Leaderboard::new(store, LeaderboardKind::Streets);
        assert!(board.entries().is_empty());
    }

    #[test]
    fn test_malformed_data_heals_on_next_save() {
        let store = MemoryStore::new();
        store
            .set(LeaderboardKind::Districts.storage_key(), "garbage")
            .unwrap();
        let mut board = Leaderboard::new(store, LeaderboardKind::Districts);
        board.submit(LeaderboardEntry::new("ada", 500, at(0))).unwrap();

        assert_eq!(board.load().len(), 1);
    }

    #[test]
    fn test_loads_browser_format() {
        let store = MemoryStore::new();
        store
            .set(
                LeaderboardKind::DistrictStreets.storage_key(),
                r#"[{"name":"Liisa","score":1200,"date":"2024-03-01T12:30:00.000Z"},
                    {"name":"Pekka","score":1400,"date":"2024-03-02T08:00:00.000Z"}]"#,
            )
            .unwrap();
        let board = Leaderboard::new(store, LeaderboardKind::DistrictStreets);

        let names: Vec<&str> = board.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Pekka", "Liisa"]);
        assert_eq!(board.entries()[1].date, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_keeps_top_ten_descending() {
        let mut board = Leaderboard::new(MemoryStore::new(), LeaderboardKind::Districts);
        let scores = [300, 1600, 20, 900, 450, 1100, 75, 1250, 640, 800, 5];

        let mut last = Vec::new();
        for (i, score) in scores.iter().enumerate() {
            last = board
                .submit(LeaderboardEntry::new(format!("p{i}"), *score, at(i as i64)))
                .unwrap();
        }

        assert_eq!(last.len(), LEADERBOARD_CAPACITY);
        let kept: Vec<u32> = last.iter().map(|e| e.score).collect();
        assert_eq!(kept, vec![1600, 1250, 1100, 900, 800, 640, 450, 300, 75, 20]);
        assert_eq!(board.load(), last);
    }

    #[test]
    fn test_ties_keep_earlier_entry_first() {
        let mut board = Leaderboard::new(MemoryStore::new(), LeaderboardKind::Districts);
        board.submit(LeaderboardEntry::new("first", 100, at(0))).unwrap();
        let entries = board.submit(LeaderboardEntry::new("second", 100, at(1))).unwrap();
        assert_eq!(entries[0].name, "first");
        assert_eq!(entries[1].name, "second");
    }

    #[test]
    fn test_kinds_are_isolated() {
        let store = MemoryStore::new();
        store
            .set(
                LeaderboardKind::Streets.storage_key(),
                r#"[{"name":"x","score":1,"date":"2024-03-01T12:30:00Z"}]"#,
            )
            .unwrap();
        let board = Leaderboard::new(store, LeaderboardKind::Districts);
        assert!(board.entries().is_empty());
    }

    #[test]
    fn test_rank_of() {
        let mut board = Leaderboard::new(MemoryStore::new(), LeaderboardKind::Districts);
        assert_eq!(board.rank_of(0), Some(1));
        for i in 0..10 {
            board
                .submit(LeaderboardEntry::new("p", 100 * (i + 1), at(i as i64)))
                .unwrap();
        }
        assert_eq!(board.rank_of(2000), Some(1));
        assert_eq!(board.rank_of(550), Some(6));
        assert_eq!(board.rank_of(50), None);
    }
}
