//! The forecast edit action.

use async_trait::async_trait;

use chrono::NaiveDate;

use crate::action::{DiodeAction, MutationRequest};
use crate::error::MutationError;
use crate::forecast::WeatherForecast;

const MIN_SUMMARY_LEN: usize = 3;

/// An edit to one [`WeatherForecast`], usually backing an edit form.
///
/// Built from the snapshot being edited; dispatching it replaces the tracked
/// snapshot with the edited values. Record the snapshot version with
/// [`based_on`](EditWeatherForecast::based_on) to have a dispatch rejected if
/// the context moved on since the form was opened.
#[derive(Debug, Clone)]
pub struct EditWeatherForecast {
    /// The edited date.
    pub date: NaiveDate,
    /// The edited temperature in degrees Celsius.
    pub temperature_c: i32,
    /// The edited summary. Must be at least three characters when present.
    pub summary: Option<String>,
    based_on: Option<u64>,
}

impl EditWeatherForecast {
    /// An edit pre-filled from the current snapshot.
    #[must_use]
    pub fn from_snapshot(record: &WeatherForecast) -> Self {
        Self {
            date: record.date,
            temperature_c: record.temperature_c,
            summary: record.summary.clone(),
            based_on: None,
        }
    }

    /// Records the snapshot version this edit was built from, enabling the
    /// stale-dispatch check.
    #[must_use]
    pub fn based_on(mut self, version: u64) -> Self {
        self.based_on = Some(version);
        self
    }
}

#[async_trait]
impl DiodeAction<WeatherForecast> for EditWeatherForecast {
    fn name(&self) -> &str {
        "edit weather forecast"
    }

    fn based_on(&self) -> Option<u64> {
        self.based_on
    }

    async fn apply(
        &self,
        request: MutationRequest<'_, WeatherForecast>,
    ) -> Result<WeatherForecast, MutationError> {
        if let Some(summary) = &self.summary {
            if summary.trim().len() < MIN_SUMMARY_LEN {
                return Err(MutationError::new(format!(
                    "summary must be at least {MIN_SUMMARY_LEN} characters"
                )));
            }
        }

        Ok(WeatherForecast {
            uid: request.item.uid,
            date: self.date,
            temperature_c: self.temperature_c,
            summary: self.summary.clone(),
        })
    }
}
