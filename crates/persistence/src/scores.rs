//! High-score table kept as a JSON array, best first.

use crate::PersistenceError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MAX_ENTRIES: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HighScore {
    pub name: String,
    pub score: i64,
    pub income: Decimal,
    pub reputation: i32,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ScoreBoard {
    path: PathBuf,
}

impl ScoreBoard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current table. A missing file is an empty table; a corrupt one is
    /// logged and treated as empty.
    pub fn load(&self) -> Vec<HighScore> {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_str(&text) {
            Ok(scores) => scores,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "unreadable high scores, starting fresh"
                );
                Vec::new()
            }
        }
    }

    /// Insert `entry`, keep the top ten and persist. Returns the 0-based rank
    /// when the entry made the table. Equal scores keep earlier entries first.
    pub fn record(&self, entry: HighScore) -> Result<Option<usize>, PersistenceError> {
        let mut scores = self.load();
        let rank = scores.partition_point(|s| s.score >= entry.score);
        if rank >= MAX_ENTRIES {
            return Ok(None);
        }
        info!(name = %entry.name, score = entry.score, rank, "new high score");
        scores.insert(rank, entry);
        scores.truncate(MAX_ENTRIES);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&scores)?)?;
        Ok(Some(rank))
    }

    pub fn is_high_score(&self, score: i64) -> bool {
        let scores = self.load();
        scores.len() < MAX_ENTRIES || scores.iter().any(|s| score > s.score)
    }
}
