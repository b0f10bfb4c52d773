#![deny(warnings)]

//! Rival decision making: grid pathfinding, order scoring and the
//! per-difficulty strategies that turn them into moves and job intents.

pub mod pathfinding;
pub mod strategy;

pub use pathfinding::{a_star, greedy_best_first, path_cost, step_cost, MIN_MULTIPLIER};
pub use strategy::{EasyStrategy, HardStrategy, MediumStrategy, Strategy};

use courier_core::{City, Coord, Order, OrderId};
use courier_econ::Actor;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Read-only view of the world a strategy decides against.
#[derive(Clone, Copy)]
pub struct StrategyContext<'a> {
    pub city: &'a City,
    /// Orders open for acceptance.
    pub available: &'a [Order],
    /// Blended weather multiplier in effect now.
    pub weather_multiplier: f32,
    pub actor: &'a Actor,
}

/// What a strategy asks the runtime to do with orders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobIntent {
    /// Accept an available order whose pickup is the actor's cell.
    Accept(OrderId),
    /// Deliver the order under the inventory cursor.
    Deliver,
}

fn payout_f64(o: &Order) -> f64 {
    o.payout.to_f64().unwrap_or(0.0)
}

/// Easy selection weight: nearer pickups are likelier.
pub fn easy_weight(order: &Order, at: Coord) -> f64 {
    1.0 / (f64::from(order.pickup.manhattan(at)) + 1.0)
}

/// Medium score: `2 * payout - distance - 0.5 * (1 - mult) * 20`.
/// Orders heavier than `remaining_capacity` score negative infinity.
pub fn medium_score(
    order: &Order,
    at: Coord,
    weather_multiplier: f32,
    remaining_capacity: u32,
) -> f64 {
    if order.weight > remaining_capacity {
        return f64::NEG_INFINITY;
    }
    let weather_penalty = (1.0 - f64::from(weather_multiplier)) * 20.0;
    2.0 * payout_f64(order) - f64::from(order.pickup.manhattan(at)) - 0.5 * weather_penalty
}

/// Hard score: payout minus half the weather-scaled trip length
/// (to the pickup, then on to the dropoff).
pub fn hard_score(order: &Order, at: Coord, weather_multiplier: f32) -> f64 {
    let trip =
        f64::from(order.pickup.manhattan(at)) + f64::from(order.pickup.manhattan(order.dropoff));
    payout_f64(order) - 0.5 * trip * step_cost(weather_multiplier)
}
