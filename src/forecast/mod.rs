//! Reference weather-forecast domain.
//!
//! A small, complete wiring of the core against one entity type: the domain
//! record, an edit action with validation, the storage row and its mapper,
//! named filter/sort resolvers, and an in-memory data broker. The end-to-end
//! tests run against this module, and it doubles as the template for wiring a
//! real domain.

mod edit;
mod persistence;

pub use edit::EditWeatherForecast;
pub use persistence::{
    InMemoryWeatherBroker, WeatherForecastFilters, WeatherForecastMap, WeatherForecastRow,
    WeatherForecastSorts, FILTER_BY_SUMMARY, SORT_BY_DATE, SORT_BY_TEMPERATURE,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::{DiodeEntity, EntityUid};

/// One day's weather forecast.
///
/// An immutable value record: edits go through [`EditWeatherForecast`], which
/// produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherForecast {
    /// Stable identity.
    pub uid: EntityUid,
    /// The day the forecast is for.
    pub date: NaiveDate,
    /// Forecast temperature in degrees Celsius.
    pub temperature_c: i32,
    /// Free-text summary, for example "Mild".
    pub summary: Option<String>,
}

impl WeatherForecast {
    /// A forecast with a fresh identity.
    #[must_use]
    pub fn new(date: NaiveDate, temperature_c: i32, summary: Option<String>) -> Self {
        Self {
            uid: EntityUid::new(),
            date,
            temperature_c,
            summary,
        }
    }
}

impl DiodeEntity for WeatherForecast {
    fn uid(&self) -> EntityUid {
        self.uid
    }
}
