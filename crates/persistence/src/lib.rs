#![deny(warnings)]

//! Persistence layer: undo history, save slots and the high-score table.

pub mod history;
pub mod scores;
pub mod slots;

pub use history::{Snapshot, UndoHistory};
pub use scores::{HighScore, ScoreBoard};
pub use slots::{
    GameData, PlayerState, RivalState, SaveGame, SlotHeader, SlotInfo, SlotStore, MAX_SLOTS,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("slot {0} is out of range 1..=3")]
    InvalidSlot(usize),
    #[error("slot {0} is empty")]
    EmptySlot(usize),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("save encoding: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
