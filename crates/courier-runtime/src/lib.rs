#![deny(warnings)]

//! Tick-driven courier session on a `bevy_ecs` world.
//!
//! Every frame runs one chained schedule on a single thread. [`Session`]
//! owns the world and is the only entry point callers need.

pub mod resources;
pub mod systems;

pub use resources::*;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use chrono::Utc;
use courier_ai::Strategy;
use courier_core::{
    City, Coord, Difficulty, MarkovWeather, Order, SessionData, SimConfig, WeatherModel,
};
use courier_econ::{final_score, Actor};
use persistence::{GameData, PlayerState, RivalState, SaveGame, Snapshot, UndoHistory};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

const MARKOV_SEED_OFFSET: u64 = 1;
const RIVAL_SEED_OFFSET: u64 = 2;
const AUTOPILOT_SEED_OFFSET: u64 = 3;

/// Per-courier figures reported by [`Session::snapshot`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CourierKpis {
    pub position: Coord,
    pub stamina: f32,
    pub reputation: i32,
    pub income: Decimal,
    pub penalties: u32,
    pub carried: usize,
    pub carried_weight: u32,
}

impl From<&Actor> for CourierKpis {
    fn from(a: &Actor) -> Self {
        Self {
            position: a.position,
            stamina: a.stamina,
            reputation: a.reputation,
            income: a.total_income,
            penalties: a.total_penalties,
            carried: a.inventory.len(),
            carried_weight: a.carried_weight(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub elapsed: f32,
    pub state: GameState,
    pub weather: String,
    pub weather_multiplier: f32,
    pub player: CourierKpis,
    pub rival: CourierKpis,
    pub available_orders: usize,
    pub pending_orders: usize,
    pub closed_orders: usize,
}

fn courier_state(a: &Actor) -> PlayerState {
    PlayerState {
        x: a.position.x,
        y: a.position.y,
        stamina: a.stamina,
        reputation: a.reputation,
        total_income: a.total_income,
        income_goal: a.income_goal,
        total_penalties: a.total_penalties,
    }
}

/// The configured start when it is walkable, otherwise the first open cell.
fn start_cell(city: &City, wanted: Coord) -> Coord {
    if city.in_bounds(wanted) && !city.is_blocked_at(wanted) {
        return wanted;
    }
    let open = city.first_open().unwrap_or(Coord::new(0, 0));
    warn!(%wanted, %open, "start cell not walkable, relocating");
    open
}

fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            systems::advance_clock,
            systems::update_weather,
            systems::player_system,
            systems::expire_orders,
            systems::rival_system,
            systems::record_history,
            systems::check_outcome,
        )
            .chain()
            .run_if(systems::game_running),
    );
    schedule
}

pub struct Session {
    world: World,
    schedule: Schedule,
}

impl Session {
    pub fn new(config: SimConfig, data: SessionData) -> Self {
        let SessionData {
            city,
            initial_weather,
            transitions,
            orders,
        } = data;
        let seed = config.rng_seed;
        let goal = city.goal();

        let player = Actor::new(start_cell(&city, config.player_start), goal, config.max_weight);
        let rival = Actor::new(start_cell(&city, config.rival_start), goal, config.max_weight);
        let mut history = UndoHistory::new(config.max_undo);
        history.save_state(Snapshot::capture(&player, 0.0, &initial_weather));

        let mut board = OrderBoard::new(orders);
        board.pool.release_due(config.game_start);

        info!(
            seed,
            difficulty = ?config.difficulty,
            orders = board.pool.available().len() + board.pool.pending_len(),
            %goal,
            "session created"
        );

        let mut world = World::new();
        world.insert_resource(SimClock {
            elapsed: 0.0,
            dt: config.tick_seconds,
            game_start: config.game_start,
        });
        world.insert_resource(Weather {
            model: WeatherModel::new(initial_weather, config.weather_table(), seed),
            source: MarkovWeather::new(transitions, seed.wrapping_add(MARKOV_SEED_OFFSET)),
        });
        world.insert_resource(HumanActor {
            name: "player".to_string(),
            actor: player,
            move_cooldown: 0.0,
            moved: false,
            autopilot: None,
        });
        world.insert_resource(RivalActor {
            actor: rival,
            strategy: Strategy::new(config.difficulty, seed.wrapping_add(RIVAL_SEED_OFFSET)),
            step_timer: config.rival_step_interval,
        });
        world.insert_resource(CityMap(city));
        world.insert_resource(board);
        world.insert_resource(History(history));
        world.insert_resource(FrameInput::default());
        world.insert_resource(Outcome::default());
        world.insert_resource(EventLog::default());
        world.insert_resource(Settings(config));

        Self {
            world,
            schedule: build_schedule(),
        }
    }

    /// Let a strategy of the given difficulty drive the player.
    pub fn with_autopilot(mut self, difficulty: Difficulty) -> Self {
        let seed = self.world.resource::<Settings>().0.rng_seed;
        self.world.resource_mut::<HumanActor>().autopilot =
            Some(Strategy::new(difficulty, seed.wrapping_add(AUTOPILOT_SEED_OFFSET)));
        self
    }

    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.world.resource_mut::<HumanActor>().name = name.into();
        self
    }

    /// Run one frame with `input`. Frames after the session ended are no-ops.
    pub fn step(&mut self, input: FrameInput) -> GameState {
        self.world.insert_resource(input);
        self.schedule.run(&mut self.world);
        self.outcome()
    }

    /// Run idle frames for `secs` game seconds or until the session ends.
    pub fn run_seconds(&mut self, secs: f32) -> GameState {
        let dt = self.world.resource::<SimClock>().dt;
        let frames = (secs / dt).round() as u64;
        for _ in 0..frames {
            if self.step(FrameInput::default()) != GameState::Running {
                break;
            }
        }
        self.outcome()
    }

    pub fn outcome(&self) -> GameState {
        self.world.resource::<Outcome>().0
    }

    pub fn elapsed(&self) -> f32 {
        self.world.resource::<SimClock>().elapsed
    }

    pub fn player(&self) -> &Actor {
        &self.world.resource::<HumanActor>().actor
    }

    pub fn rival(&self) -> &Actor {
        &self.world.resource::<RivalActor>().actor
    }

    pub fn player_name(&self) -> &str {
        &self.world.resource::<HumanActor>().name
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let weather = &self.world.resource::<Weather>().model;
        let board = self.world.resource::<OrderBoard>();
        SessionSnapshot {
            elapsed: self.elapsed(),
            state: self.outcome(),
            weather: weather.current().to_string(),
            weather_multiplier: weather.current_multiplier(),
            player: self.player().into(),
            rival: self.rival().into(),
            available_orders: board.pool.available().len(),
            pending_orders: board.pool.pending_len(),
            closed_orders: board.closed.len(),
        }
    }

    pub fn final_score(&self) -> i64 {
        let p = self.player();
        final_score(
            p.total_income,
            p.total_penalties,
            self.outcome() == GameState::Victory,
            self.elapsed(),
            self.world.resource::<Settings>().0.game_duration_secs,
        )
    }

    /// Swap in a new city. Cached routes are dropped and couriers standing
    /// on a now blocked cell are moved to the first open one.
    pub fn reload_city(&mut self, city: City) {
        let relocate = |a: &mut Actor| {
            if !city.in_bounds(a.position) || city.is_blocked_at(a.position) {
                a.position = start_cell(&city, a.position);
            }
        };
        {
            let mut rival = self.world.resource_mut::<RivalActor>();
            rival.strategy.clear_path();
            relocate(&mut rival.actor);
        }
        {
            let mut human = self.world.resource_mut::<HumanActor>();
            if let Some(s) = human.autopilot.as_mut() {
                s.clear_path();
            }
            relocate(&mut human.actor);
        }
        info!(width = city.width(), height = city.height(), "city reloaded");
        self.world.insert_resource(CityMap(city));
    }

    /// Roll the player back `steps` snapshots between frames.
    pub fn undo(&mut self, steps: usize) -> bool {
        let now = self.world.resource::<SimClock>().now();
        let rival = self.world.resource::<RivalActor>().actor.inventory.clone();
        self.world.resource_scope(|world, mut history: Mut<History>| {
            world.resource_scope(|world, mut human: Mut<HumanActor>| {
                world.resource_scope(|world, mut board: Mut<OrderBoard>| {
                    let mut events = world.resource_mut::<EventLog>();
                    systems::apply_undo(
                        steps,
                        &mut history,
                        &mut human,
                        &rival,
                        &mut board,
                        now,
                        &mut events,
                    )
                })
            })
        })
    }

    pub fn save_game(&self) -> SaveGame {
        let human = self.world.resource::<HumanActor>();
        let rival = self.world.resource::<RivalActor>();
        let clock = self.world.resource::<SimClock>();
        let weather = &self.world.resource::<Weather>().model;
        let board = self.world.resource::<OrderBoard>();
        SaveGame {
            player_name: human.name.clone(),
            player: courier_state(&human.actor),
            inventory: human.actor.inventory.to_vec(),
            rival: Some(RivalState {
                courier: courier_state(&rival.actor),
                inventory: rival.actor.inventory.to_vec(),
            }),
            game_data: GameData {
                elapsed_time: clock.elapsed,
                weather_state: weather.current().clone(),
                weather_timer: weather.dwell_remaining(),
                game_start_datetime: clock.game_start,
                closed_orders: board.closed.iter().cloned().collect(),
            },
            timestamp: Utc::now(),
        }
    }

    /// Restore a saved game into this session. The city and order catalog
    /// stay as loaded; the open pool is re-derived from the save.
    pub fn load_game(&mut self, save: &SaveGame) {
        let gd = &save.game_data;
        {
            let mut clock = self.world.resource_mut::<SimClock>();
            clock.elapsed = gd.elapsed_time;
            clock.game_start = gd.game_start_datetime;
        }
        self.world
            .resource_mut::<Weather>()
            .model
            .restore(gd.weather_state.clone(), gd.weather_timer);

        let restore = |actor: &mut Actor, s: &PlayerState, orders: &[Order]| {
            actor.income_goal = s.income_goal;
            actor.total_penalties = s.total_penalties;
            for lost in actor.restore(
                Coord::new(s.x, s.y),
                s.stamina,
                s.reputation,
                s.total_income,
                orders.to_vec(),
            ) {
                warn!(order = %lost.id, "saved order dropped");
            }
        };
        {
            let mut human = self.world.resource_mut::<HumanActor>();
            human.name = save.player_name.clone();
            human.move_cooldown = 0.0;
            restore(&mut human.actor, &save.player, &save.inventory);
            if let Some(s) = human.autopilot.as_mut() {
                s.forget_target();
            }
        }
        {
            let mut rival = self.world.resource_mut::<RivalActor>();
            if let Some(r) = &save.rival {
                restore(&mut rival.actor, &r.courier, &r.inventory);
            }
            rival.strategy.forget_target();
        }

        let now = self.world.resource::<SimClock>().now();
        let snapshot = Snapshot::capture(self.player(), gd.elapsed_time, &gd.weather_state);
        self.world.resource_scope(|world, mut board: Mut<OrderBoard>| {
            board.restore_closed(gd.closed_orders.iter().cloned());
            let human = world.resource::<HumanActor>();
            let rival = world.resource::<RivalActor>();
            systems::resync_board(
                &mut board,
                [&human.actor.inventory, &rival.actor.inventory],
                now,
            );
        });
        {
            let mut history = self.world.resource_mut::<History>();
            history.0.clear();
            history.0.save_state(snapshot);
        }
        self.world.insert_resource(Outcome::default());
        info!(player = %save.player_name, elapsed = gd.elapsed_time, "game loaded");
    }

    /// Events since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.world.resource_mut::<EventLog>().0)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use courier_core::{OrderId, OrderStatus, TransitionTable, WeatherCondition};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
    }

    fn order(
        id: &str,
        pickup: (i32, i32),
        dropoff: (i32, i32),
        payout: i64,
        weight: u32,
        deadline_secs: i64,
    ) -> Order {
        Order {
            id: OrderId(id.to_string()),
            pickup: Coord::new(pickup.0, pickup.1),
            dropoff: Coord::new(dropoff.0, dropoff.1),
            payout: Decimal::new(payout, 0),
            weight,
            priority: 0,
            deadline: t0() + Duration::seconds(deadline_secs),
            release_time: t0(),
            status: OrderStatus::Available,
        }
    }

    fn config() -> SimConfig {
        SimConfig {
            tick_seconds: 0.1,
            game_start: t0(),
            player_start: Coord::new(0, 0),
            rival_start: Coord::new(9, 9),
            difficulty: Difficulty::Easy,
            ..SimConfig::default()
        }
    }

    fn data(city: City, orders: Vec<Order>) -> SessionData {
        SessionData {
            city,
            initial_weather: WeatherCondition::from("clear"),
            transitions: TransitionTable::new(),
            orders,
        }
    }

    fn open_city() -> City {
        City::open(10, 10, Decimal::new(1500, 0))
    }

    fn session(orders: Vec<Order>) -> Session {
        Session::new(config(), data(open_city(), orders))
    }

    /// Step in `dir` until the player moved `n` cells.
    fn walk(s: &mut Session, dir: (i32, i32), n: usize) {
        let mut moved = 0;
        for _ in 0..200 {
            if moved == n {
                return;
            }
            let before = s.player().position;
            s.step(FrameInput::moving(dir.0, dir.1));
            if s.player().position != before {
                moved += 1;
            }
        }
        panic!("player did not move {n} cells");
    }

    #[test]
    fn player_moves_and_spends_stamina() {
        let mut s = session(vec![]);
        s.step(FrameInput::moving(1, 0));
        assert_eq!(s.player().position, Coord::new(1, 0));
        assert_eq!(s.player().stamina, 99.5);
        // still cooling down from the first step
        s.step(FrameInput::moving(1, 0));
        assert_eq!(s.player().position, Coord::new(1, 0));
    }

    #[test]
    fn blocked_and_diagonal_moves_are_discarded() {
        let rows = ["..", "#."]
            .iter()
            .map(|r| r.chars().map(|c| if c == '#' { "B" } else { "C" }.to_string()).collect())
            .collect();
        let legend = [
            ("C".to_string(), courier_core::TileInfo { blocked: false, surface_weight: 1.0 }),
            ("B".to_string(), courier_core::TileInfo { blocked: true, surface_weight: 1.0 }),
        ]
        .into_iter()
        .collect();
        let city = City::new(2, 2, rows, legend, Decimal::new(100, 0)).unwrap();
        let mut s = Session::new(config(), data(city, vec![]));
        s.step(FrameInput::moving(0, 1));
        assert_eq!(s.player().position, Coord::new(0, 0));
        assert!(s
            .drain_events()
            .contains(&SessionEvent::Blocked { who: Courier::Player, x: 0, y: 1 }));
        s.step(FrameInput::moving(1, 1));
        assert_eq!(s.player().position, Coord::new(0, 0));
        assert_eq!(s.player().stamina, 100.0);
    }

    #[test]
    fn accept_and_deliver_pays_out() {
        let mut s = session(vec![order("A", (0, 0), (2, 0), 300, 2, 600)]);
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        assert_eq!(s.player().inventory.len(), 1);
        assert_eq!(s.snapshot().available_orders, 0);

        // not at the dropoff yet
        s.step(FrameInput::action(PlayerAction::Deliver));
        assert_eq!(s.player().inventory.len(), 1);

        walk(&mut s, (1, 0), 2);
        s.step(FrameInput::action(PlayerAction::Deliver));
        let p = s.player();
        assert!(p.inventory.is_empty());
        assert_eq!(p.total_income, Decimal::new(300, 0));
        assert_eq!(p.reputation, 75);
        let events = s.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::Delivered { who: Courier::Player, rep_change: 5, .. }
        )));
        assert_eq!(s.snapshot().closed_orders, 1);
    }

    #[test]
    fn over_capacity_accept_is_rejected() {
        let mut cfg = config();
        cfg.max_weight = 4;
        let heavy = order("heavy", (0, 0), (1, 0), 100, 5, 600);
        let mut s = Session::new(cfg, data(open_city(), vec![heavy]));
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        assert!(s.player().inventory.is_empty());
        assert_eq!(s.player().carried_weight(), 0);
        assert_eq!(s.snapshot().available_orders, 1);
        assert!(s
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::Rejected { who: Courier::Player, .. })));
    }

    #[test]
    fn accept_requires_standing_on_pickup() {
        let mut s = session(vec![order("A", (3, 3), (4, 4), 100, 1, 600)]);
        s.step(FrameInput::action(PlayerAction::Accept(Some(OrderId("A".into())))));
        assert!(s.player().inventory.is_empty());
    }

    #[test]
    fn carried_order_expires_with_penalty() {
        let mut s = session(vec![order("A", (0, 0), (5, 5), 100, 1, 2)]);
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        s.run_seconds(3.0);
        let p = s.player();
        assert!(p.inventory.is_empty());
        assert_eq!(p.reputation, 64);
        assert_eq!(p.total_penalties, 6);
        assert!(s
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::Expired { who: Courier::Player, .. })));
    }

    #[test]
    fn cancel_closes_order() {
        let mut s = session(vec![order("A", (0, 0), (5, 5), 100, 1, 600)]);
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        s.step(FrameInput::action(PlayerAction::Cancel));
        assert_eq!(s.player().reputation, 66);
        let snap = s.snapshot();
        assert_eq!(snap.closed_orders, 1);
        assert_eq!(snap.available_orders, 0);
    }

    #[test]
    fn undo_restores_position_and_reopens_order() {
        let mut s = session(vec![order("A", (2, 0), (5, 5), 100, 1, 600)]);
        walk(&mut s, (1, 0), 2);
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        assert_eq!(s.player().inventory.len(), 1);
        let elapsed = s.elapsed();

        assert!(s.undo(1));
        assert_eq!(s.player().position, Coord::new(1, 0));
        assert!(s.player().inventory.is_empty());
        assert_eq!(s.snapshot().available_orders, 1);
        assert_eq!(s.elapsed(), elapsed);

        assert!(s.undo(1));
        assert_eq!(s.player().position, Coord::new(0, 0));
        assert_eq!(s.player().stamina, 100.0);
        assert!(!s.undo(1));
    }

    #[test]
    fn undo_past_a_delivery_reopens_the_order() {
        let mut s = session(vec![order("A", (1, 0), (3, 0), 300, 1, 600)]);
        walk(&mut s, (1, 0), 1);
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        walk(&mut s, (1, 0), 2);
        s.step(FrameInput::action(PlayerAction::Deliver));
        assert_eq!(s.player().total_income, Decimal::new(300, 0));
        assert_eq!(s.snapshot().closed_orders, 1);

        assert!(s.undo(2));
        let p = s.player();
        assert_eq!(p.position, Coord::new(1, 0));
        assert!(p.inventory.is_empty());
        assert_eq!(p.total_income, Decimal::ZERO);
        let snap = s.snapshot();
        assert_eq!(snap.closed_orders, 0);
        assert_eq!(snap.available_orders, 1);

        s.step(FrameInput::action(PlayerAction::Accept(None)));
        assert_eq!(s.player().inventory.len(), 1);
    }

    #[test]
    fn only_later_player_settlements_reopen() {
        let mut board = crate::resources::OrderBoard::new(vec![
            order("early", (0, 0), (1, 0), 100, 1, 600),
            order("late", (0, 0), (1, 0), 100, 1, 600),
            order("rival", (0, 0), (1, 0), 100, 1, 600),
            order("overdue", (0, 0), (1, 0), 100, 1, 8),
        ]);
        board.settle(OrderId("early".into()), Courier::Player, 2.0);
        board.settle(OrderId("late".into()), Courier::Player, 5.0);
        board.settle(OrderId("rival".into()), Courier::Rival, 6.0);
        board.settle(OrderId("overdue".into()), Courier::Player, 7.0);

        let reopened = board.unsettle_after(3.0, t0() + Duration::seconds(10));
        assert_eq!(reopened, vec![OrderId("late".into())]);
        let closed: Vec<_> = board.closed.iter().map(|id| id.0.as_str()).collect();
        assert_eq!(closed, ["early", "overdue", "rival"]);
        assert!(board.unsettle_after(0.0, t0()).contains(&OrderId("early".into())));
    }

    #[test]
    fn undo_action_runs_inside_a_frame() {
        let mut s = session(vec![]);
        walk(&mut s, (1, 0), 1);
        s.step(FrameInput::action(PlayerAction::Undo(1)));
        assert_eq!(s.player().position, Coord::new(0, 0));
        assert!(s.drain_events().contains(&SessionEvent::Undone { steps: 1 }));
    }

    #[test]
    fn hard_rival_delivers() {
        let mut cfg = config();
        cfg.difficulty = Difficulty::Hard;
        cfg.rival_start = Coord::new(0, 0);
        cfg.player_start = Coord::new(9, 9);
        let orders = vec![order("R", (3, 0), (3, 3), 200, 1, 600)];
        let mut s = Session::new(cfg, data(open_city(), orders));
        s.run_seconds(60.0);
        assert_eq!(s.rival().total_income, Decimal::new(200, 0));
        assert!(s.rival().inventory.is_empty());
        assert_eq!(s.snapshot().closed_orders, 1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let orders = vec![
            order("A", (0, 0), (5, 5), 100, 1, 600),
            order("B", (1, 0), (5, 5), 100, 1, 600),
            order("C", (9, 0), (5, 5), 100, 1, 600),
        ];
        let mut s = session(orders.clone()).with_player_name("ada");
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        walk(&mut s, (1, 0), 1);
        s.step(FrameInput::action(PlayerAction::Accept(None)));
        s.step(FrameInput::action(PlayerAction::Cancel));
        let save = s.save_game();
        assert_eq!(save.player_name, "ada");
        assert_eq!(save.inventory.len(), 1);
        // the cursor stays on the first accepted order
        assert_eq!(save.game_data.closed_orders, vec![OrderId("A".into())]);
        let before = s.snapshot();

        let mut fresh = session(orders);
        fresh.load_game(&save);
        let after = fresh.snapshot();
        assert_eq!(after.player, before.player);
        assert_eq!(after.elapsed, before.elapsed);
        assert_eq!(after.closed_orders, 1);
        assert_eq!(after.available_orders, 1);
        assert_eq!(fresh.player_name(), "ada");
        assert!(!fresh.undo(1));
    }

    #[test]
    fn reload_city_relocates_and_clears_routes() {
        let mut s = session(vec![]);
        let rows = vec![vec!["B".to_string(), "C".to_string()]];
        let legend = [
            ("C".to_string(), courier_core::TileInfo { blocked: false, surface_weight: 1.0 }),
            ("B".to_string(), courier_core::TileInfo { blocked: true, surface_weight: 1.0 }),
        ]
        .into_iter()
        .collect();
        s.reload_city(City::new(2, 1, rows, legend, Decimal::new(10, 0)).unwrap());
        assert_eq!(s.player().position, Coord::new(1, 0));
        assert_eq!(s.rival().position, Coord::new(1, 0));
        assert!(s.world().resource::<RivalActor>().strategy.path().is_empty());
    }

    #[test]
    fn defeat_stops_the_clock() {
        let mut s = session(vec![]);
        s.world_mut().resource_mut::<HumanActor>().actor.reputation = 19;
        assert_eq!(s.step(FrameInput::default()), GameState::Defeat);
        let elapsed = s.elapsed();
        s.run_seconds(5.0);
        assert_eq!(s.elapsed(), elapsed);
        assert_eq!(s.outcome(), GameState::Defeat);
    }

    #[test]
    fn victory_scores_early_bonus() {
        let mut s = session(vec![]);
        s.world_mut().resource_mut::<HumanActor>().actor.total_income = Decimal::new(1500, 0);
        assert_eq!(s.step(FrameInput::default()), GameState::Victory);
        assert_eq!(s.final_score(), 2000);
    }

    #[test]
    fn time_runs_out() {
        let mut cfg = config();
        cfg.game_duration_secs = 2.0;
        let mut s = Session::new(cfg, data(open_city(), vec![]));
        assert_eq!(s.run_seconds(10.0), GameState::TimeUp);
        assert!(s.elapsed() < 2.5);
        assert!(s.drain_events().contains(&SessionEvent::Ended(GameState::TimeUp)));
    }

    #[test]
    fn snapshot_serializes() {
        let s = session(vec![]);
        let json = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(json["state"], "Running");
        assert_eq!(json["player"]["reputation"], 70);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]
        #[test]
        fn identical_seeds_replay_identically(seed in any::<u64>()) {
            let run = || {
                let mut cfg = config();
                cfg.rng_seed = seed;
                cfg.difficulty = Difficulty::Medium;
                let orders = vec![
                    order("A", (2, 2), (7, 7), 150, 2, 300),
                    order("B", (8, 1), (1, 8), 90, 1, 300),
                ];
                let mut s = Session::new(cfg, data(open_city(), orders))
                    .with_autopilot(Difficulty::Easy);
                s.run_seconds(20.0);
                s.snapshot()
            };
            prop_assert_eq!(run(), run());
        }
    }
}
