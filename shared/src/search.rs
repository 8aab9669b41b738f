//! Client-side title search and server-side filter criteria.
//!
//! Text search is a plain case-insensitive substring match over titles that
//! were already fetched. The server filter is keyed by an exact category name
//! and a single instant built from the picked date and the picker's time
//! string.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::Activity;
use crate::FilterError;

/// Wire format of the instant embedded in the filter path.
pub const ISO_INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const TWELVE_HOUR_FORMATS: &[&str] = &["%I:%M %p", "%I:%M:%S %p"];
const TWENTY_FOUR_HOUR_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S"];

#[must_use]
pub fn filter_by_title(activities: &[Activity], query: &str) -> Vec<Activity> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return activities.to_vec();
    }
    activities
        .iter()
        .filter(|a| a.title_contains(&needle))
        .cloned()
        .collect()
}

/// Parses the time string produced by the platform picker.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, FilterError> {
    let normalized = normalize_time(input);
    if normalized.is_empty() {
        return Err(FilterError::InvalidTime(input.to_string()));
    }

    let has_marker = normalized.ends_with(" AM") || normalized.ends_with(" PM");
    let formats = if has_marker {
        TWELVE_HOUR_FORMATS
    } else {
        TWENTY_FOUR_HOUR_FORMATS
    };

    formats
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&normalized, fmt).ok())
        .ok_or_else(|| FilterError::InvalidTime(input.to_string()))
}

// "2:30pm" / " 02:30  p.m. " -> "2:30 PM" / "02:30 PM"
fn normalize_time(input: &str) -> String {
    let upper = input.trim().to_uppercase().replace('.', "");
    let compact: String = upper.split_whitespace().collect::<Vec<_>>().join(" ");

    for marker in ["AM", "PM"] {
        if let Some(head) = compact.strip_suffix(marker) {
            return format!("{} {marker}", head.trim_end());
        }
    }
    compact
}

/// Combines a calendar date with an optional picker time. A missing time
/// means midnight.
pub fn compose_instant(date: NaiveDate, time: Option<&str>) -> Result<NaiveDateTime, FilterError> {
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => parse_time_of_day(raw)?,
        None => NaiveTime::MIN,
    };
    Ok(date.and_time(time))
}

/// Raw picker state, any part of which may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub category_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
}

impl FilterSelection {
    pub fn validate(self) -> Result<FilterCriteria, FilterError> {
        let category_name = self
            .category_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(FilterError::MissingSelection)?;
        let date = self.date.ok_or(FilterError::MissingSelection)?;
        let instant = compose_instant(date, self.time.as_deref())?;

        Ok(FilterCriteria {
            category_name,
            instant,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub category_name: String,
    pub instant: NaiveDateTime,
}

impl FilterCriteria {
    #[must_use]
    pub fn iso_instant(&self) -> String {
        self.instant.format(ISO_INSTANT_FORMAT).to_string()
    }
}
