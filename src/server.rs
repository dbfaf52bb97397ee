//! HTTP surface
//!
//! JSON endpoints over [`TrackerService`]. Every error body has the shape
//! `{"detail": "..."}`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use crate::data::Launch;
use crate::filter::{FilterError, LaunchFilter};
use crate::query::{QueryError, Statistics};
use crate::service::TrackerService;

const LAUNCHES_ATTACHMENT: &str = "attachment; filename=launches.json";
const STATISTICS_ATTACHMENT: &str = "attachment; filename=statistics.json";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: TrackerService,
}

impl AppState {
    pub fn new(service: TrackerService) -> Self {
        Self { service }
    }
}

/// An error rendered as a JSON `detail` response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        let status = if err.is_coercion() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        };
        Self::new(status, err.to_string())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Invalid(e) => e.into(),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal server error: {}", other),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Builds the router with all routes attached
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/launches", get(launches))
        .route("/launches/download", get(download_launches))
        .route("/statistics", get(statistics))
        .route("/statistics/download", get(download_statistics))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn fetch_launches(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<Vec<Launch>, ApiError> {
    let filter = LaunchFilter::from_params(params).map_err(|e| {
        warn!(error = %e, "Rejected launch filter");
        ApiError::from(e)
    })?;
    info!(?filter, "Fetching launches");

    match state.service.launches(&filter).await {
        Ok(launches) => {
            info!(count = launches.len(), "Fetched launches");
            Ok(launches)
        }
        Err(e) => {
            error!(error = %e, "Error fetching launches");
            Err(e.into())
        }
    }
}

async fn fetch_statistics(state: &AppState) -> Result<Statistics, ApiError> {
    info!("Fetching launch statistics");
    state.service.statistics().await.map_err(|e| {
        error!(error = %e, "Error fetching statistics");
        ApiError::from(e)
    })
}

async fn launches(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Launch>>, ApiError> {
    fetch_launches(&state, &params).await.map(Json)
}

async fn download_launches(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let launches = fetch_launches(&state, &params).await?;
    Ok((
        [(header::CONTENT_DISPOSITION, LAUNCHES_ATTACHMENT)],
        Json(launches),
    ))
}

async fn statistics(State(state): State<AppState>) -> Result<Json<Statistics>, ApiError> {
    fetch_statistics(&state).await.map(Json)
}

async fn download_statistics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = fetch_statistics(&state).await?;
    Ok((
        [(header::CONTENT_DISPOSITION, STATISTICS_ATTACHMENT)],
        Json(stats),
    ))
}
