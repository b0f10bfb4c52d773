//! Numbered save slots stored as bincode files (`slot1.sav` .. `slot3.sav`).

use crate::PersistenceError;
use chrono::{DateTime, Utc};
use courier_core::{Order, OrderId, WeatherCondition};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MAX_SLOTS: usize = 3;

/// Courier fields persisted per actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: i32,
    pub y: i32,
    pub stamina: f32,
    pub reputation: i32,
    pub total_income: Decimal,
    pub income_goal: Decimal,
    /// Reputation points lost so far; feeds the final score.
    #[serde(default)]
    pub total_penalties: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RivalState {
    pub courier: PlayerState,
    pub inventory: Vec<Order>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub elapsed_time: f32,
    pub weather_state: WeatherCondition,
    /// Seconds left before the next weather decision.
    pub weather_timer: f32,
    pub game_start_datetime: DateTime<Utc>,
    /// Orders already delivered, expired or cancelled.
    pub closed_orders: Vec<OrderId>,
}

/// Logical save-file schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub player_name: String,
    pub player: PlayerState,
    pub inventory: Vec<Order>,
    pub rival: Option<RivalState>,
    pub game_data: GameData,
    pub timestamp: DateTime<Utc>,
}

/// Summary shown in a slot picker.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotHeader {
    pub name: String,
    pub income: Decimal,
    pub reputation: i32,
    pub elapsed: f32,
    pub timestamp: DateTime<Utc>,
}

impl From<&SaveGame> for SlotHeader {
    fn from(s: &SaveGame) -> Self {
        Self {
            name: s.player_name.clone(),
            income: s.player.total_income,
            reputation: s.player.reputation,
            elapsed: s.game_data.elapsed_time,
            timestamp: s.timestamp,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotInfo {
    pub slot: usize,
    pub exists: bool,
    pub modified: Option<DateTime<Utc>>,
    /// `None` when the slot is empty or unreadable.
    pub header: Option<SlotHeader>,
}

/// Directory of save slots.
#[derive(Clone, Debug)]
pub struct SlotStore {
    dir: PathBuf,
}

impl SlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn check(slot: usize) -> Result<(), PersistenceError> {
        if (1..=MAX_SLOTS).contains(&slot) {
            Ok(())
        } else {
            Err(PersistenceError::InvalidSlot(slot))
        }
    }

    pub fn path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("slot{slot}.sav"))
    }

    pub fn exists(&self, slot: usize) -> bool {
        Self::check(slot).is_ok() && self.path(slot).is_file()
    }

    pub fn save(&self, slot: usize, game: &SaveGame) -> Result<(), PersistenceError> {
        Self::check(slot)?;
        fs::create_dir_all(&self.dir)?;
        let bytes = bincode::serialize(game)?;
        fs::write(self.path(slot), bytes)?;
        info!(slot, player = %game.player_name, "game saved");
        Ok(())
    }

    pub fn load(&self, slot: usize) -> Result<SaveGame, PersistenceError> {
        Self::check(slot)?;
        let path = self.path(slot);
        if !path.is_file() {
            return Err(PersistenceError::EmptySlot(slot));
        }
        let bytes = fs::read(path)?;
        let game = bincode::deserialize(&bytes)?;
        info!(slot, "game loaded");
        Ok(game)
    }

    /// Returns whether a file was removed.
    pub fn delete(&self, slot: usize) -> Result<bool, PersistenceError> {
        Self::check(slot)?;
        let path = self.path(slot);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        info!(slot, "slot deleted");
        Ok(true)
    }

    fn modified(&self, slot: usize) -> Option<DateTime<Utc>> {
        fs::metadata(self.path(slot))
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    pub fn info(&self, slot: usize) -> SlotInfo {
        let exists = self.exists(slot);
        let header = if exists {
            match self.load(slot) {
                Ok(g) => Some(SlotHeader::from(&g)),
                Err(e) => {
                    debug!(slot, error = %e, "unreadable slot");
                    None
                }
            }
        } else {
            None
        };
        SlotInfo {
            slot,
            exists,
            modified: if exists { self.modified(slot) } else { None },
            header,
        }
    }

    pub fn list(&self) -> Vec<SlotInfo> {
        (1..=MAX_SLOTS).map(|s| self.info(s)).collect()
    }

    /// Slot an automatic save goes to: the first empty one, else the one
    /// modified longest ago (lowest number on ties).
    pub fn auto_slot(&self) -> usize {
        if let Some(free) = (1..=MAX_SLOTS).find(|s| !self.exists(*s)) {
            return free;
        }
        (1..=MAX_SLOTS)
            .min_by_key(|s| (self.modified(*s), *s))
            .unwrap_or(1)
    }

    /// Save into [`SlotStore::auto_slot`] and return the slot used.
    pub fn auto_save(&self, game: &SaveGame) -> Result<usize, PersistenceError> {
        let slot = self.auto_slot();
        self.save(slot, game)?;
        Ok(slot)
    }
}
