//! World resources. Each one is a single piece of session state; systems
//! borrow only what they touch.

use bevy_ecs::prelude::*;
use chrono::{DateTime, Duration, Utc};
use courier_ai::Strategy;
use courier_core::{
    City, MarkovWeather, Order, OrderId, OrderPool, SimConfig, WeatherCondition, WeatherModel,
};
use courier_econ::Actor;
use persistence::UndoHistory;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Resource, Clone, Debug)]
pub struct Settings(pub SimConfig);

/// Virtual game time.
#[derive(Resource, Clone, Debug)]
pub struct SimClock {
    pub elapsed: f32,
    pub dt: f32,
    pub game_start: DateTime<Utc>,
}

impl SimClock {
    /// Wall-clock moment that deadlines are compared against.
    pub fn now(&self) -> DateTime<Utc> {
        self.game_start + Duration::milliseconds((f64::from(self.elapsed) * 1000.0) as i64)
    }
}

/// Player commands issued between two frames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PlayerAction {
    /// Accept an order picked up at the player's cell; `None` takes the
    /// first one there.
    Accept(Option<OrderId>),
    /// Deliver the cursor order at its dropoff.
    Deliver,
    Cancel,
    Next,
    Prev,
    SortPriority,
    SortDeadline,
    Undo(usize),
}

/// Input for one frame. Consumed by the player system.
#[derive(Resource, Clone, Debug, Default)]
pub struct FrameInput {
    pub player_move: Option<(i32, i32)>,
    pub actions: Vec<PlayerAction>,
}

impl FrameInput {
    pub fn moving(dx: i32, dy: i32) -> Self {
        Self {
            player_move: Some((dx, dy)),
            actions: Vec::new(),
        }
    }

    pub fn action(action: PlayerAction) -> Self {
        Self {
            player_move: None,
            actions: vec![action],
        }
    }
}

#[derive(Resource, Clone, Debug)]
pub struct CityMap(pub City);

#[derive(Resource, Clone, Debug)]
pub struct Weather {
    pub model: WeatherModel,
    pub source: MarkovWeather,
}

/// Orders not yet claimed, plus the ones already settled.
#[derive(Resource, Clone, Debug)]
pub struct OrderBoard {
    pub pool: OrderPool,
    /// Delivered, expired or cancelled.
    pub closed: BTreeSet<OrderId>,
    /// Player deliveries and cancellations, keyed to the elapsed second
    /// they happened at.
    settled_by_player: BTreeMap<OrderId, f32>,
    catalog: Vec<Order>,
}

impl OrderBoard {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            pool: OrderPool::new(orders.clone()),
            closed: BTreeSet::new(),
            settled_by_player: BTreeMap::new(),
            catalog: orders,
        }
    }

    /// Close a delivered or cancelled order.
    pub fn settle(&mut self, id: OrderId, who: Courier, elapsed: f32) {
        if who == Courier::Player {
            self.settled_by_player.insert(id.clone(), elapsed);
        }
        self.closed.insert(id);
    }

    /// Undo the player's settlements made after `elapsed`. Orders whose
    /// deadline has passed stay closed. Returns the reopened ids.
    pub fn unsettle_after(&mut self, elapsed: f32, now: DateTime<Utc>) -> Vec<OrderId> {
        let later: Vec<OrderId> = self
            .settled_by_player
            .iter()
            .filter(|(_, at)| **at > elapsed)
            .map(|(id, _)| id.clone())
            .collect();
        let mut reopened = Vec::new();
        for id in later {
            self.settled_by_player.remove(&id);
            let live = self.catalog.iter().any(|o| o.id == id && o.deadline > now);
            if live && self.closed.remove(&id) {
                reopened.push(id);
            }
        }
        reopened
    }

    /// Replace the closed set, e.g. from a save file. Settlement times are
    /// not carried over.
    pub fn restore_closed(&mut self, closed: impl IntoIterator<Item = OrderId>) {
        self.closed = closed.into_iter().collect();
        self.settled_by_player.clear();
    }

    /// Rebuild the pool from the session catalog, leaving out closed orders
    /// and the ones in `carried`.
    pub fn rebuild(
        &mut self,
        closed: BTreeSet<OrderId>,
        carried: &BTreeSet<OrderId>,
        now: DateTime<Utc>,
    ) {
        let open: Vec<Order> = self
            .catalog
            .iter()
            .filter(|o| !closed.contains(&o.id) && !carried.contains(&o.id))
            .cloned()
            .collect();
        self.pool = OrderPool::new(open);
        self.pool.release_due(now);
        self.closed = closed;
    }
}

#[derive(Resource, Clone, Debug)]
pub struct HumanActor {
    pub name: String,
    pub actor: Actor,
    /// Seconds until the next step is allowed.
    pub move_cooldown: f32,
    pub moved: bool,
    /// Strategy steering the player in headless runs.
    pub autopilot: Option<Strategy>,
}

#[derive(Resource, Clone, Debug)]
pub struct RivalActor {
    pub actor: Actor,
    pub strategy: Strategy,
    /// Seconds until the next rival step.
    pub step_timer: f32,
}

#[derive(Resource, Clone, Debug)]
pub struct History(pub UndoHistory);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum GameState {
    #[default]
    Running,
    Victory,
    Defeat,
    /// Time ran out before the goal was reached.
    TimeUp,
}

#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct Outcome(pub GameState);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Courier {
    Player,
    Rival,
}

/// Observable things that happened during a frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum SessionEvent {
    Accepted { who: Courier, order: OrderId },
    Rejected { who: Courier, order: OrderId, reason: String },
    Delivered { who: Courier, order: OrderId, payout: Decimal, rep_change: i32 },
    Expired { who: Courier, order: OrderId },
    Cancelled { who: Courier, order: OrderId },
    Blocked { who: Courier, x: i32, y: i32 },
    WeatherChanging { to: WeatherCondition },
    WeatherSettled { now: WeatherCondition },
    Undone { steps: usize },
    Ended(GameState),
}

#[derive(Resource, Clone, Debug, Default)]
pub struct EventLog(pub Vec<SessionEvent>);
