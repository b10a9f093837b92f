//! End-to-end scenarios: a full router over a mock upstream and a gazetteer
//! fixture, driven through the JSON-RPC layer with [`TestClient`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::http::HeaderMap;
use axum::routing::get;
use chrono::{DurationRound, Utc};
use serde_json::{Value, json};

use nordvaer::TestClient;
use nordvaer::gazetteer::{PlaceStore, Resolver};
use nordvaer::metrics::MetricsRegistry;
use nordvaer::router::McpRouter;
use nordvaer::tools::{self, AppState};
use nordvaer::upstream::{RequestPolicy, UpstreamClient};

// =============================================================================
// Mock upstream
// =============================================================================

/// Hourly timeseries steps starting at the top of the current hour.
fn timeseries(hours: usize, temperature: f64, wind: f64, wave_at: Option<usize>) -> Value {
    let start = Utc::now().duration_trunc(chrono::Duration::hours(1)).unwrap();
    let steps: Vec<Value> = (0..hours)
        .map(|h| {
            let time = start + chrono::Duration::hours(h as i64);
            let wave = match wave_at {
                Some(at) if at == h => 1.0,
                _ => 0.2,
            };
            json!({
                "time": time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                "data": {
                    "instant": {"details": {
                        "air_temperature": temperature,
                        "wind_speed": wind,
                        "wind_from_direction": 200.0,
                        "relative_humidity": 70.0,
                        "cloud_area_fraction": 40.0,
                        "sea_surface_wave_height": wave,
                        "sea_water_speed": 0.2,
                        "sea_water_temperature": 14.0
                    }},
                    "next_1_hours": {
                        "summary": {"symbol_code": "partlycloudy_day"},
                        "details": {"precipitation_amount": 0.0}
                    }
                }
            })
        })
        .collect();
    json!({"properties": {"timeseries": steps}})
}

fn cache_headers(status: &str, age: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-cache-status", status.parse().unwrap());
    headers.insert("age", age.parse().unwrap());
    headers
}

/// The happy-path proxy: forecast/nowcast from cache, ocean with one rough
/// hour at the second test waypoint.
fn mock_proxy() -> Router {
    Router::new()
        .route(
            "/weatherapi/locationforecast/2.0/complete",
            get(|| async {
                (
                    cache_headers("EXPIRED", "862"),
                    axum::Json(timeseries(72, 8.0, 5.0, None)),
                )
            }),
        )
        .route(
            "/weatherapi/nowcast/2.0/complete",
            get(|| async {
                (
                    cache_headers("HIT", "30"),
                    axum::Json(timeseries(2, 8.0, 5.0, None)),
                )
            }),
        )
        .route(
            "/weatherapi/oceanforecast/2.0/complete",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let lat = params.get("lat").cloned().unwrap_or_default();
                // The second waypoint of the route scenario gets one hour
                // of wave height right at the kayak's high threshold.
                let wave_at = if lat.starts_with("59.85") { Some(1) } else { None };
                (
                    cache_headers("MISS", "0"),
                    axum::Json(timeseries(12, 10.0, 4.0, wave_at)),
                )
            }),
        )
}

/// A proxy that always answers 429 with a retry hint.
fn rate_limited_proxy() -> Router {
    Router::new().route(
        "/weatherapi/locationforecast/2.0/complete",
        get(|| async {
            let mut headers = HeaderMap::new();
            headers.insert("retry-after", "30".parse().unwrap());
            (axum::http::StatusCode::TOO_MANY_REQUESTS, headers, "slow down")
        }),
    )
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

// =============================================================================
// Server under test
// =============================================================================

struct Harness {
    client: TestClient,
    metrics: MetricsRegistry,
    _gazetteer_dir: tempfile::TempDir,
}

async fn harness(proxy_router: Router) -> Harness {
    let proxy_base = spawn(proxy_router).await;

    let gazetteer_dir = tempfile::tempdir().unwrap();
    let db_path = gazetteer_dir.path().join("places.db");
    create_gazetteer(&db_path);
    let resolver = Arc::new(Resolver::new(Arc::new(PlaceStore::open(&db_path).unwrap())));

    let proxy = UpstreamClient::new(RequestPolicy::proxy(
        &proxy_base,
        Duration::from_secs(5),
        Duration::from_secs(2),
    ))
    .unwrap();
    // Frost is unused by these scenarios; point it at the same mock.
    let frost = UpstreamClient::new(RequestPolicy::frost(
        &proxy_base,
        Some("test-client-id"),
        Duration::from_secs(10),
    ))
    .unwrap();

    let metrics = MetricsRegistry::new();
    let state = Arc::new(AppState::new(proxy, frost, Some(resolver.clone())));
    tools::register_all(&state, &metrics);

    let mut router = McpRouter::new()
        .server_info("nordvaer", "test")
        .toolset(state.tools.clone());
    for resource in nordvaer::resources::build_all(Some(&resolver)) {
        router = router.resource(resource);
    }
    for prompt in nordvaer::prompts::build_all() {
        router = router.prompt(prompt);
    }

    let mut client = TestClient::from_router(router);
    client.initialize().await;
    Harness {
        client,
        metrics,
        _gazetteer_dir: gazetteer_dir,
    }
}

fn create_gazetteer(path: &std::path::Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE places (
            ssr_id TEXT PRIMARY KEY,
            primary_name TEXT NOT NULL,
            alt_names TEXT,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            place_class TEXT NOT NULL,
            municipality_code TEXT,
            municipality_name TEXT,
            county_name TEXT,
            population INTEGER,
            is_county_seat INTEGER NOT NULL DEFAULT 0,
            is_municipality_seat INTEGER NOT NULL DEFAULT 0,
            importance_score REAL NOT NULL DEFAULT 0
        );
        CREATE VIRTUAL TABLE places_fts USING fts5(
            primary_name, alt_names,
            content='places', content_rowid='rowid',
            tokenize = 'unicode61 remove_diacritics 0'
        );
        CREATE TABLE _metadata (key TEXT PRIMARY KEY, value TEXT);
        INSERT INTO _metadata VALUES ('record_count', '2'), ('build_date', '2025-05-01T00:00:00');
        INSERT INTO places VALUES
            ('1', 'Oslo', NULL, 59.91, 10.75, 'city', '0301', 'Oslo', 'Oslo', NULL, 1, 1, 10.0),
            ('2', 'Oslebakke', NULL, 59.30, 10.42, 'farm', '3911', 'Færder', 'Vestfold', NULL, 0, 0, 2.0);
        INSERT INTO places_fts(rowid, primary_name, alt_names)
            SELECT rowid, primary_name, coalesce(alt_names, '') FROM places;
        "#,
    )
    .unwrap();
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn forecast_returns_attributed_hourly_points() {
    let mut h = harness(mock_proxy()).await;

    let result = h
        .client
        .call_tool(
            "weather.get_forecast",
            json!({
                "location": {"lat": 59.91, "lon": 10.75},
                "timeWindow": {"preset": "next_24h"},
                "resolution": "hourly"
            }),
        )
        .await;
    assert!(!result.is_error, "summary: {:?}", result.first_text());

    let structured = result.structured_content.unwrap();
    let points = structured["points"].as_array().unwrap();
    assert!(points.len() >= 24, "got {} points", points.len());
    for point in points {
        assert!(point["temperatureC"].is_number());
        assert!(point["windSpeedMs"].is_number());
        assert!(point["symbol"].is_string());
    }

    // Attribution and cache metadata from the mocked proxy headers.
    assert_eq!(structured["source"]["product"], "Locationforecast 2.0");
    assert_eq!(structured["source"]["provider"], "MET Norway");
    assert_eq!(structured["source"]["cached"], true); // EXPIRED counts as cached
    assert_eq!(structured["source"]["ageSeconds"], 862);
    assert!(
        !structured["source"]["licenseUri"].as_str().unwrap().is_empty()
            && !structured["source"]["creditLine"].as_str().unwrap().is_empty()
    );

    // The wrapper saw the cached result and counted the call.
    assert_eq!(
        h.metrics.tool_call_count("weather.get_forecast", nordvaer::metrics::Outcome::Success),
        1
    );
    assert!(
        h.metrics
            .render()
            .contains("nordvaer_cache_requests_total{status=\"HIT\"} 1")
    );
}

#[tokio::test]
async fn nowcast_outside_the_nordics_is_out_of_coverage() {
    let mut h = harness(mock_proxy()).await;

    let result = h
        .client
        .call_tool(
            "weather.get_nowcast",
            json!({"location": {"lat": 40.71, "lon": -74.01}}),
        )
        .await;
    assert!(result.is_error);

    let structured = result.structured_content.clone().unwrap();
    assert_eq!(structured["error"]["code"], "OUT_OF_COVERAGE");
    assert_eq!(structured["error"]["retryable"], false);
    assert_eq!(structured["error"]["details"]["location"], "40.71,-74.01");
    // The summary names the Nordic bounds.
    assert!(result.first_text().unwrap().contains("lat 55..72"));

    assert_eq!(
        h.metrics.tool_call_count("weather.get_nowcast", nordvaer::metrics::Outcome::Error),
        1
    );
}

#[tokio::test]
async fn resolver_finds_oslo_with_high_confidence() {
    let mut h = harness(mock_proxy()).await;

    let result = h
        .client
        .call_tool("places.resolve_name", json!({"query": "Oslo", "limit": 5}))
        .await;
    assert!(!result.is_error);

    let structured = result.structured_content.clone().unwrap();
    let matches = structured["matches"].as_array().unwrap();
    assert!(!matches.is_empty());
    assert_eq!(matches[0]["name"], "Oslo");
    assert!(matches[0]["confidence"].as_f64().unwrap() >= 0.95);
    assert!(result.first_text().unwrap().contains("Oslo"));
}

#[tokio::test]
async fn activity_scorer_finds_one_full_day_window() {
    let mut h = harness(mock_proxy()).await;

    // Mocked series: steady 8 °C, 5 m/s, dry. All running hours are good.
    let result = h
        .client
        .call_tool(
            "weather.assess_activity_windows",
            json!({
                "location": {"lat": 59.91, "lon": 10.75},
                "activityType": "running",
                "timeWindow": {"preset": "next_24h"}
            }),
        )
        .await;
    assert!(!result.is_error, "summary: {:?}", result.first_text());

    let structured = result.structured_content.unwrap();
    let slots = structured["slots"].as_array().unwrap();
    assert!(slots.len() >= 24);
    assert!(slots.iter().all(|s| s["score"] == "good"));
    assert!(
        slots
            .iter()
            .all(|s| s["temperatureOk"] == true && s["windOk"] == true && s["precipitationOk"] == true)
    );

    let windows = structured["bestWindows"].as_array().unwrap();
    assert_eq!(windows.len(), 1);
    assert!(windows[0]["hours"].as_u64().unwrap() >= 24);

    // Composite and inner data tool are both instrumented.
    assert_eq!(
        h.metrics.tool_call_count(
            "weather.assess_activity_windows",
            nordvaer::metrics::Outcome::Success
        ),
        1
    );
    assert_eq!(
        h.metrics.tool_call_count("weather.get_forecast", nordvaer::metrics::Outcome::Success),
        1
    );
}

#[tokio::test]
async fn route_risk_flags_the_rough_waypoint() {
    let mut h = harness(mock_proxy()).await;

    let result = h
        .client
        .call_tool(
            "weather.assess_route_risk",
            json!({
                "route": [
                    {"lat": 59.9, "lon": 10.7},
                    {"lat": 59.85, "lon": 10.75}
                ],
                "vesselType": "kayak"
            }),
        )
        .await;
    assert!(!result.is_error, "summary: {:?}", result.first_text());

    let structured = result.structured_content.clone().unwrap();
    assert_eq!(structured["verdict"], "caution");

    let waypoints = structured["waypoints"].as_array().unwrap();
    assert_eq!(waypoints.len(), 2); // first and last always assessed
    assert_eq!(waypoints[0]["maxRisk"], "low");
    assert_eq!(waypoints[1]["maxRisk"], "high");

    let hotspots = structured["hotspots"].as_array().unwrap();
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0]["location"]["lat"], 59.85);
    assert_eq!(hotspots[0]["location"]["lon"], 10.75);
    assert_eq!(hotspots[0]["waveHeightM"], 1.0);

    assert!(result.first_text().unwrap().to_lowercase().contains("caution"));
}

#[tokio::test]
async fn rate_limited_upstream_surfaces_retry_hint() {
    let mut h = harness(rate_limited_proxy()).await;

    let result = h
        .client
        .call_tool(
            "weather.get_forecast",
            json!({"location": {"lat": 59.91, "lon": 10.75}}),
        )
        .await;
    assert!(result.is_error);

    let structured = result.structured_content.clone().unwrap();
    assert_eq!(structured["error"]["code"], "RATE_LIMITED");
    assert_eq!(structured["error"]["retryable"], true);
    assert_eq!(structured["error"]["details"]["retryAfterSeconds"], 30);
    assert_eq!(structured["error"]["details"]["upstreamStatus"], 429);
    assert!(
        result
            .first_text()
            .unwrap()
            .ends_with("Retry after 30 seconds.")
    );
}

#[tokio::test]
async fn composite_passes_the_first_sub_call_error_through() {
    let mut h = harness(rate_limited_proxy()).await;

    let result = h
        .client
        .call_tool(
            "weather.assess_activity_windows",
            json!({
                "location": {"lat": 59.91, "lon": 10.75},
                "activityType": "running"
            }),
        )
        .await;
    assert!(result.is_error);
    // The forecast's error arrives unchanged: same code, same details.
    let structured = result.structured_content.unwrap();
    assert_eq!(structured["error"]["code"], "RATE_LIMITED");
    assert_eq!(structured["error"]["details"]["retryAfterSeconds"], 30);
}

#[tokio::test]
async fn tool_catalog_resources_and_prompts_are_served() {
    let mut h = harness(mock_proxy()).await;

    let tools = h.client.list_tools().await;
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    for expected in [
        "weather.get_forecast",
        "weather.get_nowcast",
        "weather.get_air_quality",
        "weather.get_marine_forecast",
        "weather.get_recent_observations",
        "weather.assess_activity_windows",
        "weather.assess_route_risk",
        "places.resolve_name",
    ] {
        assert!(names.contains(&expected), "missing tool {}", expected);
    }

    let resources = h.client.list_resources().await;
    assert!(resources.iter().any(|r| r["uri"] == "weather://license"));
    assert!(resources.iter().any(|r| r["uri"] == "places://info"));

    let info = h.client.read_resource("places://info").await;
    assert!(info.contents[0].text.contains("\"recordCount\": 2"));

    let prompts = h.client.list_prompts().await;
    assert_eq!(prompts.len(), 2);

    let mut args = HashMap::new();
    args.insert("activity".to_string(), "running".to_string());
    args.insert("place".to_string(), "Oslo".to_string());
    let prompt = h.client.get_prompt("plan_outdoor_activity", args).await;
    assert!(!prompt.messages.is_empty());
}
