//! Weather state machine with randomized dwell time and smoothed transitions.
//!
//! The model owns timing (dwell and transition window); which condition
//! comes next is decided by a [`TransitionSource`], normally a
//! [`MarkovWeather`] built from provider data.

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Length of the blend between two conditions, in seconds.
pub const TRANSITION_SECS: f32 = 4.0;
/// Dwell time bounds before the next transition decision, in seconds.
pub const DWELL_MIN_SECS: f32 = 45.0;
pub const DWELL_MAX_SECS: f32 = 60.0;

/// Named weather condition, e.g. "clear" or "storm".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeatherCondition(pub String);

impl WeatherCondition {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WeatherCondition {
    fn from(s: &str) -> Self {
        WeatherCondition(s.to_string())
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Condition → speed multiplier lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherTable {
    multipliers: BTreeMap<WeatherCondition, f32>,
}

impl Default for WeatherTable {
    fn default() -> Self {
        let multipliers = [
            ("clear", 1.00),
            ("clouds", 0.98),
            ("rain_light", 0.90),
            ("rain", 0.85),
            ("storm", 0.75),
            ("fog", 0.88),
            ("wind", 0.92),
            ("heat", 0.90),
            ("cold", 0.92),
        ]
        .into_iter()
        .map(|(k, v)| (WeatherCondition::from(k), v))
        .collect();
        Self { multipliers }
    }
}

impl WeatherTable {
    /// Unknown conditions map to 1.0.
    pub fn multiplier(&self, c: &WeatherCondition) -> f32 {
        self.multipliers.get(c).copied().unwrap_or(1.0)
    }

    pub fn set(&mut self, c: WeatherCondition, m: f32) {
        self.multipliers.insert(c, m);
    }
}

/// `from → (to → probability)`.
pub type TransitionTable = BTreeMap<WeatherCondition, BTreeMap<WeatherCondition, f32>>;

/// Decides the condition that follows `current`.
pub trait TransitionSource {
    fn next_state(&mut self, current: &WeatherCondition) -> WeatherCondition;
}

/// Markov chain over conditions driven by a seeded RNG.
#[derive(Clone, Debug)]
pub struct MarkovWeather {
    table: TransitionTable,
    rng: ChaCha8Rng,
}

impl MarkovWeather {
    pub fn new(table: TransitionTable, seed: u64) -> Self {
        Self {
            table,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl TransitionSource for MarkovWeather {
    /// A condition without a usable row stays as it is.
    fn next_state(&mut self, current: &WeatherCondition) -> WeatherCondition {
        let Some(row) = self.table.get(current) else {
            return current.clone();
        };
        let (states, weights): (Vec<&WeatherCondition>, Vec<f32>) =
            row.iter().map(|(c, p)| (c, *p)).unzip();
        match WeightedIndex::new(&weights) {
            Ok(dist) => states[dist.sample(&mut self.rng)].clone(),
            Err(_) => current.clone(),
        }
    }
}

/// Result of a single weather tick.
#[derive(Clone, Debug, PartialEq)]
pub enum WeatherStep {
    Steady,
    TransitionStarted { to: WeatherCondition },
    Committed { now: WeatherCondition },
}

#[derive(Clone, Debug)]
pub struct WeatherModel {
    current: WeatherCondition,
    next: WeatherCondition,
    dwell_timer: f32,
    transition_elapsed: f32,
    in_transition: bool,
    table: WeatherTable,
    rng: ChaCha8Rng,
}

impl WeatherModel {
    pub fn new(initial: WeatherCondition, table: WeatherTable, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dwell_timer = rng.gen_range(DWELL_MIN_SECS..=DWELL_MAX_SECS);
        Self {
            next: initial.clone(),
            current: initial,
            dwell_timer,
            transition_elapsed: 0.0,
            in_transition: false,
            table,
            rng,
        }
    }

    fn sample_dwell(&mut self) -> f32 {
        self.rng.gen_range(DWELL_MIN_SECS..=DWELL_MAX_SECS)
    }

    /// Advance by `dt` seconds.
    pub fn tick(&mut self, dt: f32, source: &mut dyn TransitionSource) -> WeatherStep {
        if self.in_transition {
            self.transition_elapsed += dt;
            if self.transition_elapsed >= TRANSITION_SECS {
                self.current = self.next.clone();
                self.in_transition = false;
                info!(weather = %self.current, "weather settled");
                return WeatherStep::Committed {
                    now: self.current.clone(),
                };
            }
            return WeatherStep::Steady;
        }
        self.dwell_timer -= dt;
        if self.dwell_timer > 0.0 {
            return WeatherStep::Steady;
        }
        self.next = source.next_state(&self.current);
        self.dwell_timer = self.sample_dwell();
        self.transition_elapsed = 0.0;
        self.in_transition = true;
        info!(from = %self.current, to = %self.next, "weather changing");
        WeatherStep::TransitionStarted {
            to: self.next.clone(),
        }
    }

    pub fn current(&self) -> &WeatherCondition {
        &self.current
    }

    /// Incoming condition while a transition is in progress.
    pub fn incoming(&self) -> Option<&WeatherCondition> {
        self.in_transition.then_some(&self.next)
    }

    pub fn in_transition(&self) -> bool {
        self.in_transition
    }

    /// Seconds left before the next transition decision.
    pub fn dwell_remaining(&self) -> f32 {
        self.dwell_timer
    }

    pub fn table(&self) -> &WeatherTable {
        &self.table
    }

    pub fn multiplier(&self, c: &WeatherCondition) -> f32 {
        self.table.multiplier(c)
    }

    /// Blend progress in [0, 1]; 0 when not transitioning.
    pub fn transition_progress(&self) -> f32 {
        if !self.in_transition {
            return 0.0;
        }
        (self.transition_elapsed / TRANSITION_SECS).clamp(0.0, 1.0)
    }

    /// Multiplier in effect now, linearly blended during a transition.
    pub fn current_multiplier(&self) -> f32 {
        let from = self.multiplier(&self.current);
        if !self.in_transition {
            return from;
        }
        let to = self.multiplier(&self.next);
        from + (to - from) * self.transition_progress()
    }

    /// Reset to a settled state, e.g. after loading a save. A non-positive
    /// `dwell` draws a fresh one.
    pub fn restore(&mut self, state: WeatherCondition, dwell: f32) {
        self.next = state.clone();
        self.current = state;
        self.in_transition = false;
        self.transition_elapsed = 0.0;
        self.dwell_timer = if dwell > 0.0 { dwell } else { self.sample_dwell() };
    }
}
