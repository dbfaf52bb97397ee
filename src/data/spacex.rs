//! SpaceX API client
//!
//! This module fetches rockets, launchpads and launches from the public SpaceX
//! REST API and maps the payloads into our data structures. Launches are
//! returned in their upstream shape; see [`super::normalize`] for the
//! denormalization step.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, info};

use super::{Launchpad, Rocket};

/// Base URL for the SpaceX API
pub const SPACEX_BASE_URL: &str = "https://api.spacexdata.com/v4/";

/// Per-request timeout for upstream calls
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when fetching upstream data
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request to {endpoint} failed: {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned {status} for {endpoint}")]
    Status { endpoint: String, status: StatusCode },

    /// Failed to parse JSON response
    #[error("Failed to parse {endpoint} response: {source}")]
    ParseError {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// A launch carried a date that is not ISO-8601
    #[error("Invalid launch date for {id}: {value}")]
    InvalidDate { id: String, value: String },
}

/// Source of upstream launch data
///
/// Implemented by [`SpaceXClient`]; tests substitute in-memory fakes.
#[async_trait]
pub trait LaunchSource: Send + Sync {
    /// Fetches every rocket
    async fn fetch_rockets(&self) -> Result<Vec<Rocket>, FetchError>;

    /// Fetches every launchpad
    async fn fetch_launchpads(&self) -> Result<Vec<Launchpad>, FetchError>;

    /// Fetches every launch in its upstream shape
    async fn fetch_launches(&self) -> Result<Vec<UpstreamLaunch>, FetchError>;
}

/// A launch record as returned by the `launches` endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamLaunch {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    /// ISO-8601 UTC launch time
    #[serde(default)]
    pub date_utc: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: UpstreamLinks,
    /// Rocket id
    #[serde(default)]
    pub rocket: Option<String>,
    /// Launchpad id
    #[serde(default)]
    pub launchpad: Option<String>,
}

/// Links block of an upstream launch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamLinks {
    #[serde(default, deserialize_with = "null_as_default")]
    pub patch: UpstreamPatch,
    #[serde(default)]
    pub webcast: Option<String>,
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub wikipedia: Option<String>,
}

/// Mission patch images of an upstream launch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamPatch {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// Reads an explicit `null` as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Launchpad record as returned by the `launchpads` endpoint
#[derive(Debug, Deserialize)]
struct UpstreamLaunchpad {
    id: String,
    name: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    launch_attempts: Option<u32>,
    #[serde(default)]
    launch_successes: Option<u32>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    images: UpstreamImages,
    #[serde(default)]
    rockets: Vec<String>,
    #[serde(default)]
    launches: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamImages {
    #[serde(default)]
    large: Vec<String>,
}

impl From<UpstreamLaunchpad> for Launchpad {
    fn from(pad: UpstreamLaunchpad) -> Self {
        Launchpad {
            id: pad.id,
            name: pad.name,
            full_name: pad.full_name,
            locality: pad.locality,
            region: pad.region,
            status: pad.status,
            launch_attempts: pad.launch_attempts,
            launch_successes: pad.launch_successes,
            details: pad.details,
            images: pad.images.large,
            rockets: pad.rockets,
            launches: pad.launches,
        }
    }
}

/// Client for fetching data from the SpaceX API
#[derive(Debug, Clone)]
pub struct SpaceXClient {
    client: Client,
    base_url: String,
}

impl SpaceXClient {
    /// Creates a new SpaceXClient against the public API with the default timeout
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(SPACEX_BASE_URL, DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a new SpaceXClient with a custom base URL and request timeout
    ///
    /// A trailing slash is appended to `base_url` when missing so endpoint
    /// names can be joined directly.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::RequestFailed {
                endpoint: base_url.to_string(),
                source,
            })?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a new SpaceXClient with a preconfigured HTTP client
    pub fn with_client(client: Client, base_url: &str) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    /// Returns the base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches a JSON array from `endpoint`
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        info!(url = %url, "Requesting SpaceX API");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status,
            });
        }

        let text = response.text().await.map_err(|e| request_error(endpoint, e))?;
        let records: Vec<T> =
            serde_json::from_str(&text).map_err(|source| FetchError::ParseError {
                endpoint: endpoint.to_string(),
                source,
            })?;

        debug!(endpoint, count = records.len(), "Received records");
        Ok(records)
    }
}

#[async_trait]
impl LaunchSource for SpaceXClient {
    async fn fetch_rockets(&self) -> Result<Vec<Rocket>, FetchError> {
        let rockets: Vec<Rocket> = self.get_json("rockets").await?;
        info!(count = rockets.len(), "Retrieved rockets from API");
        Ok(rockets)
    }

    async fn fetch_launchpads(&self) -> Result<Vec<Launchpad>, FetchError> {
        let pads: Vec<UpstreamLaunchpad> = self.get_json("launchpads").await?;
        info!(count = pads.len(), "Retrieved launchpads from API");
        Ok(pads.into_iter().map(Launchpad::from).collect())
    }

    async fn fetch_launches(&self) -> Result<Vec<UpstreamLaunch>, FetchError> {
        let launches: Vec<UpstreamLaunch> = self.get_json("launches").await?;
        info!(count = launches.len(), "Retrieved launches from API");
        Ok(launches)
    }
}

/// Maps a reqwest error into a FetchError, keeping timeouts distinct
fn request_error(endpoint: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout(endpoint.to_string())
    } else {
        FetchError::RequestFailed {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}
