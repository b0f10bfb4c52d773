#![deny(warnings)]

//! Core domain models and invariants for the courier simulation.
//!
//! This crate defines serializable types used across the simulation (grid
//! coordinates, orders, the city grid, the courier inventory, the order pool
//! and the weather model) with validation helpers to guarantee basic
//! invariants.

pub mod city;
pub mod inventory;
pub mod orders;
pub mod weather;

pub use city::{City, TileInfo};
pub use inventory::{CursorMove, Inventory, InventoryError};
pub use orders::OrderPool;
pub use weather::{
    MarkovWeather, TransitionSource, TransitionTable, WeatherCondition, WeatherModel,
    WeatherStep, WeatherTable,
};

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Integer grid coordinate. Serialized as `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan (4-directional) distance.
    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Coord {
        Coord::new(self.x + dx, self.y + dy)
    }
}

impl From<[i32; 2]> for Coord {
    fn from(v: [i32; 2]) -> Self {
        Coord::new(v[0], v[1])
    }
}

impl From<Coord> for [i32; 2] {
    fn from(c: Coord) -> Self {
        [c.x, c.y]
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Unique order identifier as issued by the data provider, e.g. "REQ-003".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of an order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Released (or waiting for release) and not yet claimed.
    #[default]
    Available,
    /// Sitting in a courier's inventory.
    Accepted,
    /// Dropped off at its destination.
    Delivered,
    /// Deadline passed while still carried.
    Expired,
    /// Dropped by the courier without payout.
    Cancelled,
}

/// A delivery job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub pickup: Coord,
    pub dropoff: Coord,
    /// Face value paid on delivery (> 0).
    pub payout: Decimal,
    /// Carried weight in units (> 0).
    pub weight: u32,
    /// Ordinal priority, higher is more urgent.
    pub priority: u32,
    pub deadline: DateTime<Utc>,
    /// Moment the order becomes biddable.
    pub release_time: DateTime<Utc>,
    #[serde(default)]
    pub status: OrderStatus,
}

impl Order {
    /// Total allotted window (deadline - release) in seconds.
    pub fn window_secs(&self) -> f64 {
        (self.deadline - self.release_time).num_milliseconds() as f64 / 1000.0
    }

    /// Seconds left until the deadline; negative once late.
    pub fn secs_until_deadline(&self, now: DateTime<Utc>) -> f64 {
        (self.deadline - now).num_milliseconds() as f64 / 1000.0
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

/// Rival difficulty level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    #[default]
    Hard,
}

impl FromStr for Difficulty {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to `Hard`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            _ => Difficulty::Hard,
        })
    }
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed frame step in seconds.
    pub tick_seconds: f32,
    /// Seed for deterministic RNG.
    pub rng_seed: u64,
    /// Session length in game seconds.
    pub game_duration_secs: f32,
    /// Inventory weight cap for both couriers.
    pub max_weight: u32,
    /// Undo history depth.
    pub max_undo: usize,
    /// Seconds between rival steps.
    pub rival_step_interval: f32,
    /// Stamina regained per idle second.
    pub stamina_recovery_per_sec: f32,
    pub difficulty: Difficulty,
    /// Wall-clock origin of game time; deadlines are compared against
    /// `game_start + elapsed`.
    pub game_start: DateTime<Utc>,
    pub player_start: Coord,
    pub rival_start: Coord,
    /// Per-condition overrides of the default multiplier table.
    pub weather_multipliers: BTreeMap<String, f32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0 / 60.0,
            rng_seed: 42,
            game_duration_secs: 900.0,
            max_weight: 10,
            max_undo: 10,
            rival_step_interval: 0.6,
            stamina_recovery_per_sec: 5.0,
            difficulty: Difficulty::Hard,
            game_start: Utc
                .with_ymd_and_hms(2025, 9, 1, 12, 0, 0)
                .single()
                .unwrap_or_default(),
            player_start: Coord::new(1, 1),
            rival_start: Coord::new(0, 0),
            weather_multipliers: BTreeMap::new(),
        }
    }
}

impl SimConfig {
    /// Default multiplier table with this config's overrides applied.
    pub fn weather_table(&self) -> WeatherTable {
        let mut table = WeatherTable::default();
        for (name, m) in &self.weather_multipliers {
            table.set(WeatherCondition::from(name.as_str()), *m);
        }
        table
    }
}

/// Parsed session inputs handed over by the data provider.
#[derive(Clone, Debug)]
pub struct SessionData {
    pub city: City,
    pub initial_weather: WeatherCondition,
    pub transitions: TransitionTable,
    pub orders: Vec<Order>,
}

impl SessionData {
    /// Minimal playable session used when the provider has nothing to offer.
    pub fn fallback() -> Self {
        Self {
            city: City::open(20, 15, Decimal::new(1500, 0)),
            initial_weather: WeatherCondition::from("clear"),
            transitions: TransitionTable::new(),
            orders: Vec::new(),
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Tile rows do not match the declared dimensions.
    #[error(
        "grid shape mismatch: expected {expected_w}x{expected_h}, \
         found row {row} with {found} tiles"
    )]
    GridShape {
        expected_w: usize,
        expected_h: usize,
        row: usize,
        found: usize,
    },
    /// Declared dimensions must be positive.
    #[error("grid must be non-empty")]
    EmptyGrid,
    /// Payout must be strictly positive.
    #[error("order {0} has non-positive payout")]
    NonPositivePayout(OrderId),
    /// Weight must be strictly positive.
    #[error("order {0} has zero weight")]
    ZeroWeight(OrderId),
    /// Deadline must not precede release.
    #[error("order {0} has deadline before its release time")]
    DeadlineBeforeRelease(OrderId),
    /// Pickup or dropoff outside the city.
    #[error("order {0} references a cell outside the city: {1}")]
    OutOfBounds(OrderId, Coord),
    /// Order ids must be unique.
    #[error("duplicate order id: {0}")]
    DuplicateOrderId(OrderId),
}

/// Validate a single order.
pub fn validate_order(o: &Order) -> Result<(), ValidationError> {
    if o.payout <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePayout(o.id.clone()));
    }
    if o.weight == 0 {
        return Err(ValidationError::ZeroWeight(o.id.clone()));
    }
    if o.deadline < o.release_time {
        return Err(ValidationError::DeadlineBeforeRelease(o.id.clone()));
    }
    Ok(())
}

/// Validate orders against the city, including id uniqueness.
pub fn validate_orders(city: &City, orders: &[Order]) -> Result<(), ValidationError> {
    let mut ids: BTreeSet<&OrderId> = BTreeSet::new();
    for o in orders {
        validate_order(o)?;
        if !ids.insert(&o.id) {
            return Err(ValidationError::DuplicateOrderId(o.id.clone()));
        }
        for c in [o.pickup, o.dropoff] {
            if !city.in_bounds(c) {
                return Err(ValidationError::OutOfBounds(o.id.clone(), c));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::Duration;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
    }

    pub fn order(id: &str, weight: u32, priority: u32, deadline_secs: i64) -> Order {
        Order {
            id: OrderId(id.to_string()),
            pickup: Coord::new(1, 1),
            dropoff: Coord::new(3, 2),
            payout: Decimal::new(100, 0),
            weight,
            priority,
            deadline: t0() + Duration::seconds(deadline_secs),
            release_time: t0(),
            status: OrderStatus::Available,
        }
    }
}
