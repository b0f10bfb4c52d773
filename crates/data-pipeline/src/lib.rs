#![deny(warnings)]

//! Data pipeline: reads map, weather and job payloads, converts them into
//! core types and falls back to a playable default when a source fails.

pub mod provider;
pub mod records;

pub use provider::{DataProvider, JsonDirProvider, ProviderChain};
pub use records::{parse_timestamp, MapRecord, OrderRecord, WeatherRecord};

use anyhow::Context;
use chrono::{DateTime, Utc};
use courier_core::{validate_order, City, Order, SessionData, ValidationError};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("{0} not found")]
    Missing(PathBuf),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path} is stale ({age_secs} s old)")]
    Stale { path: PathBuf, age_secs: i64 },
    #[error("unrecognised timestamp {0:?}")]
    Timestamp(String),
    #[error("order {0} has an unrepresentable payout")]
    Payout(courier_core::OrderId),
    #[error("{0} is not a finite number")]
    Number(&'static str),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("no data source configured")]
    NoSource,
}

/// Convert order records, dropping the ones that fail validation against
/// `city` (bad values, out-of-bounds cells, repeated ids).
pub fn convert_orders(
    city: &City,
    records: Vec<OrderRecord>,
    game_start: DateTime<Utc>,
) -> Vec<Order> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(records.len());
    for r in records {
        let id = r.id.clone();
        let order = match r.into_order(game_start) {
            Ok(o) => o,
            Err(e) => {
                warn!(order = %id, error = %e, "order skipped");
                continue;
            }
        };
        if let Err(e) = validate_order(&order) {
            warn!(order = %id, error = %e, "order skipped");
            continue;
        }
        if let Some(c) = [order.pickup, order.dropoff]
            .into_iter()
            .find(|c| !city.in_bounds(*c))
        {
            warn!(order = %id, cell = %c, "order skipped: outside the city");
            continue;
        }
        if !seen.insert(order.id.clone()) {
            warn!(order = %id, "order skipped: duplicate id");
            continue;
        }
        out.push(order);
    }
    out
}

/// Load every part of a session, substituting defaults for whatever the
/// provider cannot deliver.
pub fn load_session_data(provider: &dyn DataProvider, game_start: DateTime<Utc>) -> SessionData {
    let fallback = SessionData::fallback();
    let city = match provider.get_map().and_then(MapRecord::into_city) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "map unavailable, using default city");
            fallback.city
        }
    };
    let (initial_weather, transitions) = match provider.get_weather() {
        Ok(w) => w.into_parts(),
        Err(e) => {
            warn!(error = %e, "weather unavailable, using clear skies");
            (fallback.initial_weather, fallback.transitions)
        }
    };
    let orders = match provider.get_orders() {
        Ok(records) => convert_orders(&city, records, game_start),
        Err(e) => {
            warn!(error = %e, "orders unavailable, starting with none");
            Vec::new()
        }
    };
    info!(
        width = city.width(),
        height = city.height(),
        orders = orders.len(),
        weather = %initial_weather,
        "session data loaded"
    );
    SessionData {
        city,
        initial_weather,
        transitions,
        orders,
    }
}

/// Like [`load_session_data`] but any failure is an error.
pub fn load_session_data_strict(
    provider: &dyn DataProvider,
    game_start: DateTime<Utc>,
) -> anyhow::Result<SessionData> {
    let city = provider
        .get_map()
        .and_then(MapRecord::into_city)
        .context("loading city map")?;
    let (initial_weather, transitions) = provider
        .get_weather()
        .context("loading weather")?
        .into_parts();
    let orders = provider
        .get_orders()
        .context("loading orders")?
        .into_iter()
        .map(|r| r.into_order(game_start))
        .collect::<Result<Vec<_>, _>>()
        .context("converting orders")?;
    courier_core::validate_orders(&city, &orders).context("validating orders")?;
    Ok(SessionData {
        city,
        initial_weather,
        transitions,
        orders,
    })
}
