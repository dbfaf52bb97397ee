//! Denormalization of upstream launches
//!
//! Launch documents embed a summary of their rocket and launchpad so that the
//! listing filters can match on names without joining collections at query
//! time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::spacex::{FetchError, UpstreamLaunch};
use super::{Launch, LaunchLinks, Launchpad, LaunchpadSummary, Rocket, RocketSummary};

/// Name used for launches the upstream did not name
const UNKNOWN_LAUNCH_NAME: &str = "Unknown";

/// Builds launch documents from upstream records
///
/// Rocket and launchpad summaries are looked up by id from the supplied
/// collections; an id that does not resolve leaves the summary empty.
///
/// # Returns
/// * `Ok(Vec<Launch>)` - One document per upstream record, in input order
/// * `Err(FetchError::InvalidDate)` - If a `date_utc` value is not ISO-8601
pub fn normalize_launches(
    launches: Vec<UpstreamLaunch>,
    rockets: &[Rocket],
    launchpads: &[Launchpad],
) -> Result<Vec<Launch>, FetchError> {
    let rocket_index: HashMap<&str, RocketSummary> = rockets
        .iter()
        .map(|rocket| (rocket.id.as_str(), rocket.summary()))
        .collect();
    let pad_index: HashMap<&str, LaunchpadSummary> = launchpads
        .iter()
        .map(|pad| (pad.id.as_str(), pad.summary()))
        .collect();

    launches
        .into_iter()
        .map(|raw| {
            let date = match raw.date_utc.as_deref() {
                Some(value) => Some(parse_launch_date(&raw.id, value)?),
                None => None,
            };

            let rocket = raw
                .rocket
                .as_deref()
                .and_then(|id| rocket_index.get(id))
                .cloned();
            let launchpad = raw
                .launchpad
                .as_deref()
                .and_then(|id| pad_index.get(id))
                .cloned();

            Ok(Launch {
                id: raw.id,
                name: raw.name.unwrap_or_else(|| UNKNOWN_LAUNCH_NAME.to_string()),
                success: raw.success,
                date,
                launchpad_id: raw.launchpad,
                details: raw.details,
                links: LaunchLinks {
                    img: raw.links.patch.small,
                    webcast: raw.links.webcast,
                    article: raw.links.article,
                    wikipedia: raw.links.wikipedia,
                },
                rocket,
                launchpad,
            })
        })
        .collect()
}

/// Parses an upstream ISO-8601 timestamp (e.g. "2006-03-24T22:30:00.000Z")
fn parse_launch_date(id: &str, value: &str) -> Result<DateTime<Utc>, FetchError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| FetchError::InvalidDate {
            id: id.to_string(),
            value: value.to_string(),
        })
}
