//! Launch listing filters
//!
//! Parses and validates the query parameters accepted by the launch listing
//! and compiles them into a [`LaunchQuery`] the store can evaluate.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::LaunchQuery;

/// Minimum length for name filters
const MIN_NAME_LEN: usize = 2;

/// Maximum length for the rocket name filter
const MAX_ROCKET_NAME_LEN: usize = 50;

/// Errors for malformed or invalid filter values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Only one side of the date range was supplied
    #[error("Both start_date and end_date must be provided together")]
    UnpairedDates,

    /// The date range is reversed
    #[error("start_date must be before or equal to end_date")]
    DateOrder,

    /// A date parameter is not `YYYY-MM-DD`
    #[error("Invalid date for {field}: '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    /// A string parameter is outside its length bounds
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    /// A value could not be coerced to the parameter's type
    #[error("Invalid input for {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

impl FilterError {
    /// Whether this error comes from type coercion rather than filter shape
    pub fn is_coercion(&self) -> bool {
        matches!(self, FilterError::InvalidValue { .. })
    }
}

/// Filters accepted by the launch listing
///
/// All present filters are combined with logical AND. `None` fields are
/// skipped when serializing so that the cache key of a filter does not depend
/// on how absent values are represented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Case-insensitive substring of the rocket name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rocket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Case-insensitive substring of the launchpad name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launchpad: Option<String>,
}

impl LaunchFilter {
    /// Parses a filter from raw query parameters and validates it
    ///
    /// Empty values are treated as absent. Unknown parameters are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, FilterError> {
        let get = |name: &str| {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let filter = LaunchFilter {
            start_date: get("start_date")
                .map(|v| parse_date("start_date", v))
                .transpose()?,
            end_date: get("end_date")
                .map(|v| parse_date("end_date", v))
                .transpose()?,
            rocket_name: get("rocket_name").map(str::to_string),
            success: get("success").map(parse_bool).transpose()?,
            launchpad: get("launchpad").map(str::to_string),
        };

        filter.validate()?;
        Ok(filter)
    }

    /// Checks date pairing, date order and string length bounds
    pub fn validate(&self) -> Result<(), FilterError> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => return Err(FilterError::DateOrder),
            (Some(_), None) | (None, Some(_)) => return Err(FilterError::UnpairedDates),
            _ => {}
        }

        if let Some(name) = &self.rocket_name {
            let len = name.chars().count();
            if !(MIN_NAME_LEN..=MAX_ROCKET_NAME_LEN).contains(&len) {
                return Err(FilterError::Length {
                    field: "rocket_name",
                    min: MIN_NAME_LEN,
                    max: MAX_ROCKET_NAME_LEN,
                });
            }
        }

        if let Some(pad) = &self.launchpad {
            if pad.chars().count() < MIN_NAME_LEN {
                return Err(FilterError::Length {
                    field: "launchpad",
                    min: MIN_NAME_LEN,
                    max: usize::MAX,
                });
            }
        }

        Ok(())
    }

    /// Compiles the filter into a store predicate
    ///
    /// The date range is inclusive: `start_date` maps to the start of its day
    /// and `end_date` to 23:59:59.999999 of its day, both in UTC.
    pub fn to_query(&self) -> LaunchQuery {
        let date_range = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((start_of_day(start), end_of_day(end))),
            _ => None,
        };

        LaunchQuery {
            date_range,
            rocket_name: self.rocket_name.clone(),
            success: self.success,
            launchpad: self.launchpad.clone(),
        }
    }
}

/// Midnight at the start of `date`, UTC
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last microsecond of `date`, UTC
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    date.and_time(last).and_utc()
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| FilterError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn parse_bool(value: &str) -> Result<bool, FilterError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(FilterError::InvalidValue {
            field: "success",
            value: value.to_string(),
        }),
    }
}
