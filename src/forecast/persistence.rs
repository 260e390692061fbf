//! Forecast storage shapes and the in-memory broker.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::broker::{CommandRequest, DataBroker, ItemQueryRequest};
use crate::error::BrokerError;
use crate::forecast::WeatherForecast;
use crate::mapper::EntityMap;
use crate::query::{
    apply_filters, apply_sorts, Comparator, FilterDefinition, FilterResolver, Predicate,
    SortDefinition, SortResolver,
};
use crate::state::CommandKind;

/// Filter name: forecasts whose summary equals the filter data, ignoring
/// ASCII case.
pub const FILTER_BY_SUMMARY: &str = "by-summary";

/// Sort field: forecast date.
pub const SORT_BY_DATE: &str = "date";

/// Sort field: forecast temperature.
pub const SORT_BY_TEMPERATURE: &str = "temperature";

/// The storage-row shape of a [`WeatherForecast`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherForecastRow {
    /// Stable identity.
    pub uid: Uuid,
    /// The day the forecast is for.
    pub date: NaiveDate,
    /// Forecast temperature in degrees Celsius.
    pub temperature_c: i32,
    /// Free-text summary.
    pub summary: Option<String>,
}

/// Pure mapping between [`WeatherForecast`] and [`WeatherForecastRow`].
#[derive(Debug, Clone, Copy)]
pub struct WeatherForecastMap;

impl EntityMap for WeatherForecastMap {
    type Row = WeatherForecastRow;
    type Entity = WeatherForecast;

    fn to_entity(row: &Self::Row) -> Self::Entity {
        WeatherForecast {
            uid: row.uid.into(),
            date: row.date,
            temperature_c: row.temperature_c,
            summary: row.summary.clone(),
        }
    }

    fn to_row(entity: &Self::Entity) -> Self::Row {
        WeatherForecastRow {
            uid: entity.uid.into(),
            date: entity.date,
            temperature_c: entity.temperature_c,
            summary: entity.summary.clone(),
        }
    }
}

/// Named filters over forecasts.
#[derive(Debug, Clone, Copy)]
pub struct WeatherForecastFilters;

impl FilterResolver<WeatherForecast> for WeatherForecastFilters {
    fn resolve(&self, filter: &FilterDefinition) -> Option<Predicate<WeatherForecast>> {
        match filter.name.as_str() {
            FILTER_BY_SUMMARY => {
                let wanted = filter.data.clone();
                Some(Box::new(move |item: &WeatherForecast| {
                    item.summary
                        .as_deref()
                        .is_some_and(|summary| summary.eq_ignore_ascii_case(&wanted))
                }))
            }
            _ => None,
        }
    }
}

/// Named sorts over forecasts.
#[derive(Debug, Clone, Copy)]
pub struct WeatherForecastSorts;

impl SortResolver<WeatherForecast> for WeatherForecastSorts {
    fn resolve(&self, sort: &SortDefinition) -> Option<Comparator<WeatherForecast>> {
        let descending = sort.descending;
        let compare: Comparator<WeatherForecast> = match sort.field.as_str() {
            SORT_BY_DATE => Box::new(|a: &WeatherForecast, b: &WeatherForecast| a.date.cmp(&b.date)),
            SORT_BY_TEMPERATURE => Box::new(|a: &WeatherForecast, b: &WeatherForecast| {
                a.temperature_c.cmp(&b.temperature_c)
            }),
            _ => return None,
        };

        if descending {
            Some(Box::new(move |a, b| compare(a, b).reverse()))
        } else {
            Some(compare)
        }
    }

    fn default_sort(&self) -> Option<Comparator<WeatherForecast>> {
        Some(Box::new(|a: &WeatherForecast, b: &WeatherForecast| {
            a.date.cmp(&b.date)
        }))
    }
}

/// In-memory forecast backend.
///
/// Stores rows behind a lock, records every command it is asked to execute,
/// and enforces the usual store semantics: an add of an existing identity and
/// an update or delete of a missing identity are command failures. Intended
/// for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryWeatherBroker {
    rows: RwLock<HashMap<Uuid, WeatherForecastRow>>,
    commands: RwLock<Vec<CommandRequest<WeatherForecast>>>,
}

impl InMemoryWeatherBroker {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend pre-populated with the given forecasts.
    #[must_use]
    pub fn seeded(forecasts: impl IntoIterator<Item = WeatherForecast>) -> Self {
        let broker = Self::new();
        {
            let mut rows = broker.rows.write();
            for forecast in forecasts {
                let row = WeatherForecastMap::to_row(&forecast);
                rows.insert(row.uid, row);
            }
        }
        broker
    }

    /// True if a row exists for the identity.
    #[must_use]
    pub fn contains(&self, uid: Uuid) -> bool {
        self.rows.read().contains_key(&uid)
    }

    /// Number of stored rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Every command executed against this backend, in order.
    #[must_use]
    pub fn issued_commands(&self) -> Vec<CommandRequest<WeatherForecast>> {
        self.commands.read().clone()
    }

    /// The stored forecasts after applying the named filters and sorts.
    #[must_use]
    pub fn query_many(
        &self,
        filters: &[FilterDefinition],
        sorts: &[SortDefinition],
    ) -> Vec<WeatherForecast> {
        let mut items: Vec<WeatherForecast> = self
            .rows
            .read()
            .values()
            .map(WeatherForecastMap::to_entity)
            .collect();

        apply_filters(&mut items, &WeatherForecastFilters, filters);
        apply_sorts(&mut items, &WeatherForecastSorts, sorts);
        items
    }
}

#[async_trait]
impl DataBroker<WeatherForecast> for InMemoryWeatherBroker {
    async fn execute_query(
        &self,
        request: ItemQueryRequest,
    ) -> Result<Option<WeatherForecast>, BrokerError> {
        Ok(self
            .rows
            .read()
            .get(request.uid.as_uuid())
            .map(WeatherForecastMap::to_entity))
    }

    async fn execute_command(
        &self,
        request: CommandRequest<WeatherForecast>,
    ) -> Result<(), BrokerError> {
        debug!(uid = %request.uid, kind = ?request.kind, "forecast command");
        self.commands.write().push(request.clone());

        let uid = *request.uid.as_uuid();
        let mut rows = self.rows.write();
        match request.kind {
            CommandKind::None => Ok(()),
            CommandKind::Add => {
                if rows.contains_key(&uid) {
                    return Err(BrokerError::command(format!(
                        "a forecast already exists for uid {uid}"
                    )));
                }
                rows.insert(uid, WeatherForecastMap::to_row(&request.item));
                Ok(())
            }
            CommandKind::Update => {
                if !rows.contains_key(&uid) {
                    return Err(BrokerError::command(format!(
                        "no forecast exists for uid {uid}"
                    )));
                }
                rows.insert(uid, WeatherForecastMap::to_row(&request.item));
                Ok(())
            }
            CommandKind::Delete => {
                if rows.remove(&uid).is_none() {
                    return Err(BrokerError::command(format!(
                        "no forecast exists for uid {uid}"
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast(day: u32, temperature_c: i32, summary: &str) -> WeatherForecast {
        WeatherForecast::new(
            NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            temperature_c,
            Some(summary.to_string()),
        )
    }

    #[tokio::test]
    async fn query_returns_none_for_missing_rows() {
        let broker = InMemoryWeatherBroker::new();
        let found = broker
            .execute_query(ItemQueryRequest::new(crate::entity::EntityUid::new()))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn add_then_query_round_trips_through_the_row_shape() {
        let broker = InMemoryWeatherBroker::new();
        let item = forecast(1, 10, "Mild");

        broker
            .execute_command(CommandRequest {
                uid: item.uid,
                kind: CommandKind::Add,
                item: item.clone(),
            })
            .await
            .unwrap();

        let found = broker
            .execute_query(ItemQueryRequest::new(item.uid))
            .await
            .unwrap();
        assert_eq!(found, Some(item));
    }

    #[tokio::test]
    async fn update_and_delete_require_an_existing_row() {
        let broker = InMemoryWeatherBroker::new();
        let item = forecast(1, 10, "Mild");

        let update = broker
            .execute_command(CommandRequest {
                uid: item.uid,
                kind: CommandKind::Update,
                item: item.clone(),
            })
            .await;
        assert!(update.is_err());

        let delete = broker
            .execute_command(CommandRequest {
                uid: item.uid,
                kind: CommandKind::Delete,
                item,
            })
            .await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    async fn duplicate_add_is_a_command_failure() {
        let item = forecast(1, 10, "Mild");
        let broker = InMemoryWeatherBroker::seeded([item.clone()]);

        let err = broker
            .execute_command(CommandRequest {
                uid: item.uid,
                kind: CommandKind::Add,
                item,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::CommandFailed { .. }));
    }

    #[test]
    fn query_many_filters_and_sorts() {
        let broker = InMemoryWeatherBroker::seeded([
            forecast(3, 30, "Hot"),
            forecast(1, 12, "Mild"),
            forecast(2, 11, "Mild"),
        ]);

        let mild = broker.query_many(
            &[FilterDefinition::new(FILTER_BY_SUMMARY, "mild")],
            &[SortDefinition::ascending(SORT_BY_TEMPERATURE)],
        );

        let temps: Vec<i32> = mild.iter().map(|f| f.temperature_c).collect();
        assert_eq!(temps, vec![11, 12]);
    }
}
