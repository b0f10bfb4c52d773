//! Bounded undo history of post-move snapshots.

use courier_core::{Coord, Order, WeatherCondition};
use courier_econ::Actor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Value copy of the player's state after a committed move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub position: Coord,
    pub stamina: f32,
    pub reputation: i32,
    pub total_income: Decimal,
    /// Inventory in list order.
    pub inventory: Vec<Order>,
    pub elapsed_secs: f32,
    pub weather: WeatherCondition,
}

impl Snapshot {
    pub fn capture(actor: &Actor, elapsed_secs: f32, weather: &WeatherCondition) -> Self {
        Self {
            position: actor.position,
            stamina: actor.stamina,
            reputation: actor.reputation,
            total_income: actor.total_income,
            inventory: actor.inventory.to_vec(),
            elapsed_secs,
            weather: weather.clone(),
        }
    }

    /// Write the snapshot back into `actor`. Orders that no longer fit are
    /// returned.
    pub fn apply(&self, actor: &mut Actor) -> Vec<Order> {
        actor.restore(
            self.position,
            self.stamina,
            self.reputation,
            self.total_income,
            self.inventory.clone(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct UndoHistory {
    entries: VecDeque<Snapshot>,
    max_undo: usize,
}

impl UndoHistory {
    pub fn new(max_undo: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_undo.max(1)),
            max_undo: max_undo.max(1),
        }
    }

    /// Push a snapshot, evicting the oldest beyond capacity.
    pub fn save_state(&mut self, snapshot: Snapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.max_undo {
            self.entries.pop_front();
        }
    }

    /// Discard `steps` snapshots and return the new top. Fails without
    /// touching the history unless at least `steps + 1` entries exist.
    pub fn undo(&mut self, steps: usize) -> Option<Snapshot> {
        if self.entries.len() < steps + 1 {
            return None;
        }
        self.entries.truncate(self.entries.len() - steps);
        self.entries.back().cloned()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(10)
    }
}
