//! Integration tests for the HTTP endpoints
//!
//! Serves the router on an ephemeral port with an in-process upstream and
//! store, and calls it over real HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use launchtrack::app::App;
use launchtrack::cache::MemoryCache;
use launchtrack::config::Config;
use launchtrack::data::spacex::UpstreamLinks;
use launchtrack::data::{FetchError, LaunchSource, Launchpad, Rocket, UpstreamLaunch};
use launchtrack::store::MemoryStore;
use serde_json::Value;

/// Upstream with two rockets, one pad and four launches
#[derive(Default)]
struct StaticSource {
    fail: bool,
    calls: AtomicUsize,
}

fn rocket(id: &str, name: &str, rate: Option<f64>) -> Rocket {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "success_rate_pct": rate,
    }))
    .expect("rocket")
}

fn launch(id: &str, date: &str, rocket: &str, success: Option<bool>) -> UpstreamLaunch {
    UpstreamLaunch {
        id: id.to_string(),
        name: Some(format!("Mission {}", id)),
        success,
        date_utc: Some(date.to_string()),
        details: None,
        links: UpstreamLinks::default(),
        rocket: Some(rocket.to_string()),
        launchpad: Some("pad".to_string()),
    }
}

#[async_trait]
impl LaunchSource for StaticSource {
    async fn fetch_rockets(&self) -> Result<Vec<Rocket>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FetchError::Timeout("rockets".to_string()));
        }
        Ok(vec![
            rocket("f9", "Falcon 9", Some(98.0)),
            rocket("ss", "Starship", None),
        ])
    }

    async fn fetch_launchpads(&self) -> Result<Vec<Launchpad>, FetchError> {
        Ok(vec![Launchpad {
            id: "pad".to_string(),
            name: "KSC LC 39A".to_string(),
            full_name: Some("Kennedy Space Center Historic Launch Complex 39A".to_string()),
            locality: Some("Cape Canaveral".to_string()),
            region: Some("Florida".to_string()),
            status: Some("active".to_string()),
            launch_attempts: Some(55),
            launch_successes: Some(54),
            details: None,
            images: Vec::new(),
            rockets: vec!["f9".to_string()],
            launches: Vec::new(),
        }])
    }

    async fn fetch_launches(&self) -> Result<Vec<UpstreamLaunch>, FetchError> {
        Ok(vec![
            launch("a", "2025-01-05T10:00:00.000Z", "f9", Some(true)),
            launch("b", "2025-01-20T10:00:00.000Z", "f9", Some(false)),
            launch("c", "2025-02-03T10:00:00.000Z", "ss", Some(true)),
            launch("d", "2024-12-31T23:59:59.000Z", "f9", Some(true)),
        ])
    }
}

struct TestServer {
    addr: SocketAddr,
    source: Arc<StaticSource>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(source: StaticSource) -> Self {
        let source = Arc::new(source);
        let app = App::with_clients(
            Config::default(),
            source.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
        );
        let router = app.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, router).await.expect("serve app") });

        Self {
            addr,
            source,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("http://{}{}", self.addr, path))
            .send()
            .await
            .expect("request")
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self.get(path).await;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.expect("json body");
        (status, body)
    }
}

fn ids(body: &Value) -> Vec<&str> {
    body.as_array()
        .expect("array")
        .iter()
        .map(|l| l["id"].as_str().expect("id"))
        .collect()
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(StaticSource::default()).await;
    let (status, body) = server.get_json("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_launches_backfill_and_order() {
    let server = TestServer::start(StaticSource::default()).await;

    let (status, body) = server.get_json("/launches").await;

    assert_eq!(status, 200);
    assert_eq!(ids(&body), vec!["d", "a", "b", "c"]);
    assert_eq!(body[1]["rocket"]["name"], "Falcon 9");
    assert_eq!(body[1]["launchpad"]["name"], "KSC LC 39A");
    assert_eq!(server.source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_launches_date_range_is_inclusive() {
    let server = TestServer::start(StaticSource::default()).await;

    let (status, body) = server
        .get_json("/launches?start_date=2025-01-01&end_date=2025-01-20")
        .await;

    assert_eq!(status, 200);
    assert_eq!(ids(&body), vec!["a", "b"]);
}

#[tokio::test]
async fn test_launches_combined_filters() {
    let server = TestServer::start(StaticSource::default()).await;

    let (status, body) = server
        .get_json("/launches?rocket_name=falcon&success=true&launchpad=39a")
        .await;

    assert_eq!(status, 200);
    assert_eq!(ids(&body), vec!["d", "a"]);
}

#[tokio::test]
async fn test_unpaired_date_is_422() {
    let server = TestServer::start(StaticSource::default()).await;

    let (status, body) = server.get_json("/launches?start_date=2025-01-01").await;

    assert_eq!(status, 422);
    assert_eq!(
        body["detail"],
        "Both start_date and end_date must be provided together"
    );
    assert_eq!(server.source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shape_errors_are_422() {
    let server = TestServer::start(StaticSource::default()).await;

    for path in [
        "/launches?start_date=2025-02-01&end_date=2025-01-01",
        "/launches?start_date=invalid-date&end_date=2025-01-01",
        "/launches?rocket_name=F",
        "/launches?launchpad=K",
        "/launches/download?end_date=2025-01-01",
    ] {
        let (status, body) = server.get_json(path).await;
        assert_eq!(status, 422, "{}", path);
        assert!(body["detail"].is_string(), "{}", path);
    }
}

#[tokio::test]
async fn test_non_boolean_success_is_400() {
    let server = TestServer::start(StaticSource::default()).await;

    let (status, body) = server.get_json("/launches?success=maybe").await;

    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("success"));
}

#[tokio::test]
async fn test_upstream_failure_is_500() {
    let server = TestServer::start(StaticSource {
        fail: true,
        ..Default::default()
    })
    .await;

    let (status, body) = server.get_json("/launches").await;

    assert_eq!(status, 500);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Internal server error"));
}

#[tokio::test]
async fn test_launches_download_sets_attachment() {
    let server = TestServer::start(StaticSource::default()).await;

    let response = server.get("/launches/download?success=false").await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=launches.json"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(ids(&body), vec!["b"]);
}

#[tokio::test]
async fn test_statistics_after_backfill() {
    let server = TestServer::start(StaticSource::default()).await;
    server.get_json("/launches").await;

    let (status, body) = server.get_json("/statistics").await;

    assert_eq!(status, 200);
    assert_eq!(body["rocket_success_rates"]["Falcon 9"], 98.0);
    assert!(body["rocket_success_rates"].get("Starship").is_none());
    assert_eq!(body["launchpad_totals"]["KSC LC 39A"]["launch_attempts"], 55);
    assert_eq!(body["launchpad_totals"]["KSC LC 39A"]["launch_successes"], 54);
    let frequency = &body["launch_frequency"];
    assert_eq!(frequency["monthly_launch_frequency"]["2025-01"], 2);
    assert_eq!(frequency["monthly_launch_frequency"]["2025-02"], 1);
    assert_eq!(frequency["monthly_launch_frequency"]["2024-12"], 1);
    assert_eq!(frequency["yearly_launch_frequency"]["2025"], 3);
    assert_eq!(frequency["yearly_launch_frequency"]["2024"], 1);
}

#[tokio::test]
async fn test_statistics_download_sets_attachment() {
    let server = TestServer::start(StaticSource::default()).await;

    let response = server.get("/statistics/download").await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=statistics.json"
    );
    let body: Value = response.json().await.unwrap();
    assert!(body["launch_frequency"]["yearly_launch_frequency"].is_object());
}

#[tokio::test]
async fn test_repeated_listing_is_served_from_cache() {
    let server = TestServer::start(StaticSource::default()).await;

    let (_, first) = server.get_json("/launches?rocket_name=falcon").await;
    let (_, second) = server.get_json("/launches?rocket_name=falcon").await;

    assert_eq!(first, second);
    assert_eq!(server.source.calls.load(Ordering::SeqCst), 1);
}
