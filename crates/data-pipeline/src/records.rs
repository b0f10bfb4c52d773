//! Wire records as served by the city data service and their conversion
//! into core types.

use crate::DataError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use courier_core::{
    City, Coord, Order, OrderId, OrderStatus, TileInfo, TransitionTable, WeatherCondition,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payloads arrive either bare or wrapped as `{"data": ...}`; cached copies
/// also carry the time they were fetched.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped {
        data: T,
        #[serde(default)]
        timestamp: Option<String>,
    },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            Envelope::Wrapped { data, timestamp } => (data, timestamp),
            Envelope::Bare(data) => (data, None),
        }
    }
}

/// A tile row is either a list of codes or a string of one-letter codes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TileRow {
    Codes(Vec<String>),
    Text(String),
}

impl TileRow {
    fn into_codes(self) -> Vec<String> {
        match self {
            TileRow::Codes(c) => c,
            TileRow::Text(s) => s.chars().map(String::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LegendRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub surface_weight: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<TileRow>,
    #[serde(default)]
    pub legend: BTreeMap<String, LegendRecord>,
    #[serde(default)]
    pub goal: f64,
}

impl MapRecord {
    pub fn into_city(self) -> Result<City, DataError> {
        let legend = self
            .legend
            .into_iter()
            .map(|(code, l)| {
                let info = TileInfo {
                    blocked: l.blocked,
                    surface_weight: l.surface_weight.unwrap_or(1.0),
                };
                (code, info)
            })
            .collect();
        let rows = self.tiles.into_iter().map(TileRow::into_codes).collect();
        let goal = Decimal::from_f64(self.goal)
            .ok_or(DataError::Number("goal"))?
            .round_dp(2);
        Ok(City::new(self.width, self.height, rows, legend, goal)?)
    }
}

/// Initial weather, as a bare name or `{"condition": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialWeather {
    Named(String),
    Detailed {
        #[serde(default = "clear")]
        condition: String,
    },
}

fn clear() -> String {
    "clear".to_string()
}

impl Default for InitialWeather {
    fn default() -> Self {
        InitialWeather::Named(clear())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    #[serde(default, alias = "initial_state")]
    pub initial: InitialWeather,
    #[serde(default, alias = "transition_table")]
    pub transition: BTreeMap<String, BTreeMap<String, f32>>,
}

impl WeatherRecord {
    pub fn into_parts(self) -> (WeatherCondition, TransitionTable) {
        let initial = match self.initial {
            InitialWeather::Named(c) | InitialWeather::Detailed { condition: c } => c,
        };
        let table = self
            .transition
            .into_iter()
            .map(|(from, row)| {
                let row = row
                    .into_iter()
                    .map(|(to, p)| (WeatherCondition(to), p))
                    .collect();
                (WeatherCondition(from), row)
            })
            .collect();
        (WeatherCondition(initial), table)
    }
}

/// Offsets beyond roughly a century are treated as malformed.
const MAX_OFFSET_SECS: f64 = 3.2e9;

/// A point in game time: an ISO-8601 timestamp or seconds after game start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeField {
    Offset(f64),
    Stamp(String),
}

impl TimeField {
    pub fn resolve(&self, game_start: DateTime<Utc>) -> Result<DateTime<Utc>, DataError> {
        match self {
            TimeField::Offset(secs) => {
                if !secs.is_finite() || secs.abs() > MAX_OFFSET_SECS {
                    return Err(DataError::Number("time offset"));
                }
                Duration::try_milliseconds((secs * 1000.0) as i64)
                    .and_then(|d| game_start.checked_add_signed(d))
                    .ok_or(DataError::Number("time offset"))
            }
            TimeField::Stamp(s) => parse_timestamp(s),
        }
    }
}

/// Parse ISO-8601; timestamps without an offset are read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DataError::Timestamp(s.to_string()))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub pickup: [i32; 2],
    pub dropoff: [i32; 2],
    pub payout: f64,
    pub weight: u32,
    #[serde(default)]
    pub priority: u32,
    pub deadline: TimeField,
    /// Missing means released at game start.
    #[serde(default)]
    pub release_time: Option<TimeField>,
}

impl OrderRecord {
    pub fn into_order(self, game_start: DateTime<Utc>) -> Result<Order, DataError> {
        let id = OrderId(self.id);
        let payout = Decimal::from_f64(self.payout)
            .ok_or_else(|| DataError::Payout(id.clone()))?
            .round_dp(2);
        let release_time = match &self.release_time {
            Some(t) => t.resolve(game_start)?,
            None => game_start,
        };
        Ok(Order {
            deadline: self.deadline.resolve(game_start)?,
            release_time,
            id,
            pickup: Coord::from(self.pickup),
            dropoff: Coord::from(self.dropoff),
            payout,
            weight: self.weight,
            priority: self.priority,
            status: OrderStatus::Available,
        })
    }
}

/// Order lists are bare, or nested under `"jobs"`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum OrdersPayload {
    Jobs { jobs: Vec<OrderRecord> },
    List(Vec<OrderRecord>),
}

impl OrdersPayload {
    pub fn into_records(self) -> Vec<OrderRecord> {
        match self {
            OrdersPayload::Jobs { jobs } => jobs,
            OrdersPayload::List(l) => l,
        }
    }
}
