//! Rival behaviors. Each difficulty carries its own planning state and is
//! dispatched by `match` from [`Strategy`].

use crate::pathfinding::{a_star, greedy_best_first};
use crate::{easy_weight, hard_score, medium_score, JobIntent, StrategyContext};
use courier_core::{City, Coord, Difficulty, Order, OrderId};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use tracing::debug;

/// Hard replans at least this often while heading to a dropoff.
pub const HARD_REPLAN_SECS: f32 = 5.0;

/// Target, cached path and re-evaluation timer shared by every difficulty.
#[derive(Clone, Debug)]
struct Planner {
    target: Option<OrderId>,
    path: VecDeque<Coord>,
    reeval_timer: f32,
    reeval_range: (f32, f32),
    rng: ChaCha8Rng,
}

impl Planner {
    fn new(reeval_range: (f32, f32), seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let reeval_timer = rng.gen_range(reeval_range.0..=reeval_range.1);
        Self {
            target: None,
            path: VecDeque::new(),
            reeval_timer,
            reeval_range,
            rng,
        }
    }

    fn reset_timer(&mut self) {
        self.reeval_timer = self.rng.gen_range(self.reeval_range.0..=self.reeval_range.1);
    }

    /// Count down and report whether the target should be chosen again.
    fn due(&mut self, dt: f32, available: &[Order]) -> bool {
        self.reeval_timer -= dt;
        let vanished = match &self.target {
            Some(id) => !available.iter().any(|o| &o.id == id),
            None => true,
        };
        if vanished && self.target.is_some() {
            debug!(target = ?self.target, "target vanished");
            self.target = None;
            self.path.clear();
        }
        vanished || self.reeval_timer <= 0.0
    }

    fn set_path(&mut self, path: Vec<Coord>) {
        self.path = path.into();
    }

    /// Pop the next planned step. Cells equal to `at` are skipped; a step
    /// that is not adjacent invalidates the whole path.
    fn step_from(&mut self, at: Coord) -> (i32, i32) {
        while self.path.front() == Some(&at) {
            self.path.pop_front();
        }
        let Some(next) = self.path.pop_front() else {
            return (0, 0);
        };
        if at.manhattan(next) != 1 {
            debug!(%at, %next, "stale path dropped");
            self.path.clear();
            return (0, 0);
        }
        (next.x - at.x, next.y - at.y)
    }

    /// Deliver when standing on the cursor order's dropoff, otherwise route
    /// toward it; when empty-handed, pick a target and accept it on arrival.
    fn decide(
        &mut self,
        ctx: &StrategyContext<'_>,
        carrying_plan: impl FnOnce(&mut Self, Coord, Coord),
        choose: impl FnOnce(&mut Self, &StrategyContext<'_>) -> Option<Order>,
        pickup_plan: impl FnOnce(&mut Self, Coord, Coord),
        dt: f32,
    ) -> Option<JobIntent> {
        let at = ctx.actor.position;
        if let Some(current) = ctx.actor.inventory.current() {
            if current.dropoff == at {
                self.path.clear();
                self.target = None;
                return Some(JobIntent::Deliver);
            }
            carrying_plan(self, at, current.dropoff);
            return None;
        }
        if self.due(dt, ctx.available) {
            match choose(self, ctx) {
                Some(best) => {
                    debug!(target = %best.id, "target chosen");
                    self.target = Some(best.id.clone());
                    pickup_plan(self, at, best.pickup);
                }
                None => {
                    self.target = None;
                    self.path.clear();
                }
            }
            self.reset_timer();
        }
        let id = self.target.as_ref()?;
        let order = ctx.available.iter().find(|o| &o.id == id)?;
        if order.pickup == at {
            self.path.clear();
            return Some(JobIntent::Accept(order.id.clone()));
        }
        None
    }
}

/// Random walk with weighted-random order choice.
#[derive(Clone, Debug)]
pub struct EasyStrategy {
    planner: Planner,
    last_step: Option<(i32, i32)>,
}

impl EasyStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            planner: Planner::new((5.0, 15.0), seed),
            last_step: None,
        }
    }

    fn next_move(&mut self, ctx: &StrategyContext<'_>) -> (i32, i32) {
        let at = ctx.actor.position;
        let options: Vec<(i32, i32)> = ctx
            .city
            .neighbors4(at)
            .map(|n| (n.x - at.x, n.y - at.y))
            .collect();
        let reverse = self.last_step.map(|(dx, dy)| (-dx, -dy));
        let forward: Vec<(i32, i32)> = options
            .iter()
            .copied()
            .filter(|d| Some(*d) != reverse)
            .collect();
        let pool = if forward.is_empty() { &options } else { &forward };
        let step = pool.choose(&mut self.planner.rng).copied().unwrap_or((0, 0));
        if step != (0, 0) {
            self.last_step = Some(step);
        }
        step
    }

    fn choose(planner: &mut Planner, ctx: &StrategyContext<'_>) -> Option<Order> {
        let at = ctx.actor.position;
        let room = ctx.actor.inventory.remaining_capacity();
        let fitting: Vec<&Order> = ctx.available.iter().filter(|o| o.weight <= room).collect();
        let weights: Vec<f64> = fitting.iter().map(|o| easy_weight(o, at)).collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        Some(fitting[dist.sample(&mut planner.rng)].clone())
    }

    fn decide_job_action(&mut self, dt: f32, ctx: &StrategyContext<'_>) -> Option<JobIntent> {
        self.planner
            .decide(ctx, |_, _, _| {}, Self::choose, |_, _, _| {}, dt)
    }
}

/// Greedy best-first routing with a payout/distance/weather score.
#[derive(Clone, Debug)]
pub struct MediumStrategy {
    planner: Planner,
}

impl MediumStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            planner: Planner::new((4.0, 10.0), seed),
        }
    }

    fn choose(_: &mut Planner, ctx: &StrategyContext<'_>) -> Option<Order> {
        let at = ctx.actor.position;
        let room = ctx.actor.inventory.remaining_capacity();
        best_by(ctx.available, |o| {
            medium_score(o, at, ctx.weather_multiplier, room)
        })
    }

    fn decide_job_action(&mut self, dt: f32, ctx: &StrategyContext<'_>) -> Option<JobIntent> {
        let city = ctx.city;
        self.planner.decide(
            ctx,
            |p, from, to| {
                if p.path.is_empty() {
                    p.set_path(greedy_best_first(city, from, to));
                }
            },
            Self::choose,
            |p, from, to| p.set_path(greedy_best_first(city, from, to)),
            dt,
        )
    }
}

/// A* routing on weather-weighted cost with a profit score.
#[derive(Clone, Debug)]
pub struct HardStrategy {
    planner: Planner,
    replan_timer: f32,
    last_multiplier: Option<f32>,
}

impl HardStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            planner: Planner::new((5.0, 10.0), seed),
            replan_timer: 0.0,
            last_multiplier: None,
        }
    }

    fn choose(_: &mut Planner, ctx: &StrategyContext<'_>) -> Option<Order> {
        let at = ctx.actor.position;
        let room = ctx.actor.inventory.remaining_capacity();
        let fitting: Vec<Order> = ctx
            .available
            .iter()
            .filter(|o| o.weight <= room)
            .cloned()
            .collect();
        best_by(&fitting, |o| hard_score(o, at, ctx.weather_multiplier))
    }

    fn decide_job_action(&mut self, dt: f32, ctx: &StrategyContext<'_>) -> Option<JobIntent> {
        let city = ctx.city;
        let mult = ctx.weather_multiplier;
        self.replan_timer += dt;
        let weather_changed = self.last_multiplier != Some(mult);
        let timer_up = self.replan_timer >= HARD_REPLAN_SECS;
        let mut replanned = false;
        let intent = self.planner.decide(
            ctx,
            |p, from, to| {
                if p.path.is_empty() || timer_up || weather_changed {
                    debug!(%from, %to, mult, "replanning");
                    p.set_path(a_star(city, from, to, mult));
                    replanned = true;
                }
            },
            Self::choose,
            |p, from, to| p.set_path(a_star(city, from, to, mult)),
            dt,
        );
        if replanned {
            self.replan_timer = 0.0;
            self.last_multiplier = Some(mult);
        }
        intent
    }
}

/// Highest-scoring order; the first one wins ties. Orders scoring -inf are
/// never returned.
fn best_by(orders: &[Order], score: impl Fn(&Order) -> f64) -> Option<Order> {
    let mut best: Option<(&Order, f64)> = None;
    for o in orders {
        let s = score(o);
        if s == f64::NEG_INFINITY {
            continue;
        }
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((o, s));
        }
    }
    best.map(|(o, _)| o.clone())
}

/// Rival behavior selected by difficulty.
#[derive(Clone, Debug)]
pub enum Strategy {
    Easy(EasyStrategy),
    Medium(MediumStrategy),
    Hard(HardStrategy),
}

impl Strategy {
    pub fn new(difficulty: Difficulty, seed: u64) -> Self {
        match difficulty {
            Difficulty::Easy => Strategy::Easy(EasyStrategy::new(seed)),
            Difficulty::Medium => Strategy::Medium(MediumStrategy::new(seed)),
            Difficulty::Hard => Strategy::Hard(HardStrategy::new(seed)),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        match self {
            Strategy::Easy(_) => Difficulty::Easy,
            Strategy::Medium(_) => Difficulty::Medium,
            Strategy::Hard(_) => Difficulty::Hard,
        }
    }

    fn planner(&self) -> &Planner {
        match self {
            Strategy::Easy(s) => &s.planner,
            Strategy::Medium(s) => &s.planner,
            Strategy::Hard(s) => &s.planner,
        }
    }

    fn planner_mut(&mut self) -> &mut Planner {
        match self {
            Strategy::Easy(s) => &mut s.planner,
            Strategy::Medium(s) => &mut s.planner,
            Strategy::Hard(s) => &mut s.planner,
        }
    }

    /// Next unit step `(dx, dy)`; at most one axis is non-zero and `(0, 0)`
    /// means stay. The caller still checks blocking and exhaustion.
    pub fn next_move(&mut self, ctx: &StrategyContext<'_>) -> (i32, i32) {
        match self {
            Strategy::Easy(s) => s.next_move(ctx),
            Strategy::Medium(s) => s.planner.step_from(ctx.actor.position),
            Strategy::Hard(s) => s.planner.step_from(ctx.actor.position),
        }
    }

    /// Re-evaluate targets and routes; returns an intent for the runtime to
    /// validate and apply.
    pub fn decide_job_action(&mut self, dt: f32, ctx: &StrategyContext<'_>) -> Option<JobIntent> {
        match self {
            Strategy::Easy(s) => s.decide_job_action(dt, ctx),
            Strategy::Medium(s) => s.decide_job_action(dt, ctx),
            Strategy::Hard(s) => s.decide_job_action(dt, ctx),
        }
    }

    /// Route this difficulty would take. Easy never plans.
    pub fn find_path(
        &self,
        city: &City,
        start: Coord,
        goal: Coord,
        weather_multiplier: f32,
    ) -> Vec<Coord> {
        match self {
            Strategy::Easy(_) => Vec::new(),
            Strategy::Medium(_) => greedy_best_first(city, start, goal),
            Strategy::Hard(_) => a_star(city, start, goal, weather_multiplier),
        }
    }

    pub fn clear_path(&mut self) {
        self.planner_mut().path.clear();
    }

    /// Drop the current target and its route, e.g. after a rejected accept.
    pub fn forget_target(&mut self) {
        let p = self.planner_mut();
        p.target = None;
        p.path.clear();
    }

    pub fn target(&self) -> Option<&OrderId> {
        self.planner().target.as_ref()
    }

    pub fn path(&self) -> &VecDeque<Coord> {
        &self.planner().path
    }
}
