//! Sources of session data. A directory of JSON files is the only concrete
//! source; [`ProviderChain`] layers several (e.g. cache then bundled data).

use crate::records::{Envelope, MapRecord, OrderRecord, OrdersPayload, WeatherRecord};
use crate::{parse_timestamp, DataError};
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MAP_FILE: &str = "map.json";
pub const WEATHER_FILE: &str = "weather.json";
pub const ORDERS_FILE: &str = "orders.json";

pub trait DataProvider {
    fn get_map(&self) -> Result<MapRecord, DataError>;
    fn get_weather(&self) -> Result<WeatherRecord, DataError>;
    fn get_orders(&self) -> Result<Vec<OrderRecord>, DataError>;
}

/// Reads `map.json`, `weather.json` and `orders.json` from a directory.
#[derive(Clone, Debug)]
pub struct JsonDirProvider {
    dir: PathBuf,
    max_age: Option<Duration>,
}

impl JsonDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: None,
        }
    }

    /// Treat the directory as a cache: payloads stamped older than
    /// `max_age` are rejected as stale.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T, DataError> {
        let path = self.dir.join(file);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DataError::Missing(path.clone()),
            _ => DataError::Io {
                path: path.clone(),
                source: e,
            },
        })?;
        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| DataError::Parse {
            path: path.clone(),
            source: e,
        })?;
        let (data, stamp) = envelope.into_parts();
        if let (Some(max_age), Some(stamp)) = (self.max_age, stamp) {
            let age = Utc::now() - parse_timestamp(&stamp)?;
            if age > max_age {
                return Err(DataError::Stale {
                    path,
                    age_secs: age.num_seconds(),
                });
            }
        }
        debug!(path = %path.display(), "data file read");
        Ok(data)
    }
}

impl DataProvider for JsonDirProvider {
    fn get_map(&self) -> Result<MapRecord, DataError> {
        self.read(MAP_FILE)
    }

    fn get_weather(&self) -> Result<WeatherRecord, DataError> {
        self.read(WEATHER_FILE)
    }

    fn get_orders(&self) -> Result<Vec<OrderRecord>, DataError> {
        self.read::<OrdersPayload>(ORDERS_FILE)
            .map(OrdersPayload::into_records)
    }
}

/// Tries each provider in turn; the first success wins.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn DataProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl DataProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn first<T>(
        &self,
        what: &str,
        get: impl Fn(&dyn DataProvider) -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        let mut last = DataError::NoSource;
        for (i, p) in self.providers.iter().enumerate() {
            match get(p.as_ref()) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(source = i, what, error = %e, "data source failed, trying next");
                    last = e;
                }
            }
        }
        Err(last)
    }
}

impl DataProvider for ProviderChain {
    fn get_map(&self) -> Result<MapRecord, DataError> {
        self.first("map", |p| p.get_map())
    }

    fn get_weather(&self) -> Result<WeatherRecord, DataError> {
        self.first("weather", |p| p.get_weather())
    }

    fn get_orders(&self) -> Result<Vec<OrderRecord>, DataError> {
        self.first("orders", |p| p.get_orders())
    }
}
