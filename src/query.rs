//! Named filter and sort resolution.
//!
//! Query surfaces refer to filters and sorts by name; a per-entity resolver
//! turns those names into a concrete predicate or ordering, or reports the
//! name as unrecognized with `None` so the caller can skip it. State tracking
//! never depends on this seam; it exists for the read side of an application.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A named filter with its argument, for example `("by-summary", "Mild")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// The filter name the resolver matches on.
    pub name: String,
    /// The filter argument.
    pub data: String,
}

impl FilterDefinition {
    /// A filter definition from name and argument.
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A named sort with its direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDefinition {
    /// The sort field name the resolver matches on.
    pub field: String,
    /// True for descending order.
    pub descending: bool,
}

impl SortDefinition {
    /// An ascending sort on the given field.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// A descending sort on the given field.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// A resolved filter predicate.
pub type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A resolved sort comparator.
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Resolves named filters for one entity type.
pub trait FilterResolver<T>: Send + Sync {
    /// The predicate for a named filter, or `None` if the name is
    /// unrecognized.
    fn resolve(&self, filter: &FilterDefinition) -> Option<Predicate<T>>;
}

/// Resolves named sorts for one entity type.
pub trait SortResolver<T>: Send + Sync {
    /// The comparator for a named sort, or `None` if the field is
    /// unrecognized.
    fn resolve(&self, sort: &SortDefinition) -> Option<Comparator<T>>;

    /// The ordering applied when no sort definition resolves.
    fn default_sort(&self) -> Option<Comparator<T>> {
        None
    }
}

/// Drops every item a resolved filter rejects. Unrecognized filter names are
/// skipped.
pub fn apply_filters<T>(
    items: &mut Vec<T>,
    resolver: &dyn FilterResolver<T>,
    filters: &[FilterDefinition],
) {
    for filter in filters {
        if let Some(predicate) = resolver.resolve(filter) {
            items.retain(|item| predicate(item));
        }
    }
}

/// Sorts by the resolved definitions in order, each later definition breaking
/// ties left by the earlier ones. Falls back to the resolver's default sort
/// when nothing resolves.
pub fn apply_sorts<T>(items: &mut [T], resolver: &dyn SortResolver<T>, sorts: &[SortDefinition]) {
    let comparators: Vec<Comparator<T>> = sorts
        .iter()
        .filter_map(|sort| resolver.resolve(sort))
        .collect();

    if comparators.is_empty() {
        if let Some(default) = resolver.default_sort() {
            items.sort_by(|a, b| default(a, b));
        }
        return;
    }

    items.sort_by(|a, b| {
        comparators
            .iter()
            .map(|compare| compare(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{
        WeatherForecast, WeatherForecastFilters, WeatherForecastSorts, FILTER_BY_SUMMARY,
    };
    use chrono::NaiveDate;

    fn forecast(day: u32, temperature_c: i32, summary: &str) -> WeatherForecast {
        WeatherForecast::new(
            NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            temperature_c,
            Some(summary.to_string()),
        )
    }

    #[test]
    fn unrecognized_filter_names_are_skipped() {
        let mut items = vec![forecast(1, 10, "Mild"), forecast(2, 30, "Hot")];
        apply_filters(
            &mut items,
            &WeatherForecastFilters,
            &[FilterDefinition::new("no-such-filter", "x")],
        );
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn summary_filter_matches_case_insensitively() {
        let mut items = vec![forecast(1, 10, "Mild"), forecast(2, 30, "Hot")];
        apply_filters(
            &mut items,
            &WeatherForecastFilters,
            &[FilterDefinition::new(FILTER_BY_SUMMARY, "mild")],
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].summary.as_deref(), Some("Mild"));
    }

    #[test]
    fn sorts_chain_and_respect_direction() {
        let mut items = vec![forecast(1, 30, "Hot"), forecast(2, 10, "Mild"), forecast(3, 30, "Hot")];
        apply_sorts(
            &mut items,
            &WeatherForecastSorts,
            &[
                SortDefinition::descending("temperature"),
                SortDefinition::ascending("date"),
            ],
        );

        let temps: Vec<i32> = items.iter().map(|f| f.temperature_c).collect();
        assert_eq!(temps, vec![30, 30, 10]);
        assert!(items[0].date < items[1].date);
    }

    #[test]
    fn default_sort_is_date_ascending() {
        let mut items = vec![forecast(3, 1, "A"), forecast(1, 2, "B"), forecast(2, 3, "C")];
        apply_sorts(&mut items, &WeatherForecastSorts, &[]);
        let days: Vec<u32> = items
            .iter()
            .map(|f| chrono::Datelike::day(&f.date))
            .collect();
        assert_eq!(days, vec![1, 2, 3]);
    }
}
