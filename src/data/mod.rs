//! Core data models for launchtrack
//!
//! This module contains the normalized documents kept in the persistent store
//! (launches, rockets, launchpads) along with the upstream client that produces
//! them.

pub mod normalize;
pub mod spacex;

pub use normalize::normalize_launches;
pub use spacex::{FetchError, LaunchSource, SpaceXClient, UpstreamLaunch};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single launch with denormalized rocket and launchpad summaries
///
/// The embedded summaries are copies captured when the launch was fetched and
/// may drift from the authoritative [`Rocket`] and [`Launchpad`] documents until
/// the next refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Launch {
    /// Unique launch identifier
    pub id: String,
    /// Mission name
    pub name: String,
    /// Outcome of the launch; `None` when unknown or not yet flown
    pub success: Option<bool>,
    /// Launch time in UTC, if the upstream record carries one
    pub date: Option<DateTime<Utc>>,
    /// Identifier of the launchpad the launch flew from
    pub launchpad_id: Option<String>,
    /// Free-form mission details
    pub details: Option<String>,
    /// Named media and reference links
    pub links: LaunchLinks,
    /// Rocket summary captured at fetch time
    pub rocket: Option<RocketSummary>,
    /// Launchpad summary captured at fetch time
    pub launchpad: Option<LaunchpadSummary>,
}

/// Named URLs attached to a launch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchLinks {
    /// Small mission patch image
    pub img: Option<String>,
    pub webcast: Option<String>,
    pub article: Option<String>,
    pub wikipedia: Option<String>,
}

/// Rocket fields embedded into each launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocketSummary {
    pub id: String,
    pub name: String,
    pub success_rate_pct: Option<f64>,
}

/// Launchpad fields embedded into each launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchpadSummary {
    pub id: String,
    pub name: String,
    pub full_name: Option<String>,
    pub launch_attempts: Option<u32>,
    pub launch_successes: Option<u32>,
}

/// A launch vehicle
///
/// Deserializes directly from the upstream `rockets` payload; fields the
/// service does not use are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rocket {
    /// Unique rocket identifier
    pub id: String,
    /// Rocket name (e.g. "Falcon 9")
    pub name: String,
    /// Vehicle type as reported upstream (e.g. "rocket")
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the vehicle is still in service
    #[serde(default)]
    pub active: Option<bool>,
    /// Cost per launch in USD
    #[serde(default)]
    pub cost_per_launch: Option<u64>,
    /// Success rate percentage (0-100), absent when never recorded
    #[serde(default)]
    pub success_rate_pct: Option<f64>,
    /// Date of first flight
    #[serde(default)]
    pub first_flight: Option<NaiveDate>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// Reference article
    #[serde(default)]
    pub wikipedia: Option<String>,
}

impl Rocket {
    /// Returns the summary embedded into launches flown by this rocket
    pub fn summary(&self) -> RocketSummary {
        RocketSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            success_rate_pct: self.success_rate_pct,
        }
    }
}

/// A launch site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Launchpad {
    /// Unique launchpad identifier
    pub id: String,
    /// Short name (e.g. "KSC LC 39A")
    pub name: String,
    /// Full descriptive name
    pub full_name: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    /// Operational status (e.g. "active", "retired")
    pub status: Option<String>,
    /// Number of launch attempts from this pad
    pub launch_attempts: Option<u32>,
    /// Number of successful launches, never more than `launch_attempts`
    pub launch_successes: Option<u32>,
    pub details: Option<String>,
    /// Large image URLs
    pub images: Vec<String>,
    /// Ids of rockets that have flown from this pad
    pub rockets: Vec<String>,
    /// Ids of launches that flew from this pad
    pub launches: Vec<String>,
}

impl Launchpad {
    /// Returns the summary embedded into launches flown from this pad
    pub fn summary(&self) -> LaunchpadSummary {
        LaunchpadSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            launch_attempts: self.launch_attempts,
            launch_successes: self.launch_successes,
        }
    }
}
