//! `weather.get_recent_observations`: measured station data from the Frost
//! API. Coordinate mode resolves nearby stations first; station mode queries
//! directly. Bounded to the last seven days.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::attribution::{self, source_metadata};
use crate::coverage::{Coordinate, validate_coordinates};
use crate::error::ToolError;
use crate::protocol::CallToolResult;
use crate::timewindow::{ResolvedWindow, TimeWindowInput, resolve_time_window};
use crate::tool::{Tool, ToolBuilder};
use crate::tools::{AppState, is_norwegian};
use crate::upstream::FetchOptions;

pub const PRODUCT: &str = "Frost API";
const MAX_WINDOW_HOURS: i64 = 7 * 24;
const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;
const ELEMENTS: &str =
    "air_temperature,wind_speed,wind_from_direction,relative_humidity,sum(precipitation_amount PT1H)";

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObservationsInput {
    /// Coordinate mode: find the nearest station within `maxDistanceKm`.
    #[serde(default)]
    pub location: Option<Coordinate>,
    /// Station mode: query a known station id (e.g. "SN18700").
    #[serde(default)]
    pub station_id: Option<String>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

// Frost wire shapes, limited to the fields consumed.
#[derive(Debug, Deserialize)]
struct SourcesResponse {
    #[serde(default)]
    data: Vec<Source>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Source {
    id: String,
    #[serde(default)]
    name: Option<String>,
    /// Kilometres from the query point in nearest-mode responses.
    #[serde(default)]
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    data: Vec<ObservationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationEntry {
    source_id: String,
    reference_time: DateTime<Utc>,
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    element_id: String,
    value: f64,
}

/// One normalised observation hour.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ObservationPoint {
    time: DateTime<Utc>,
    station_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    air_temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wind_speed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wind_direction_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    humidity_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    precipitation_mm: Option<f64>,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("weather.get_recent_observations")
        .description(
            "Measured weather from the nearest station (or a named station): \
             temperature, wind, humidity and precipitation for up to the \
             last seven days.",
        )
        .handler_with_state(
            state,
            |state: Arc<AppState>, input: ObservationsInput| async move {
                match run(&state, input).await {
                    Ok(result) => Ok(result),
                    Err(e) => Ok(attribution::error_response(&e)),
                }
            },
        )
}

async fn run(state: &AppState, input: ObservationsInput) -> Result<CallToolResult, ToolError> {
    let window = observation_window(input.time_window.as_ref(), chrono::Utc::now())?;

    let station = match (&input.station_id, &input.location) {
        (Some(id), _) => Source {
            id: id.clone(),
            name: None,
            distance: None,
        },
        (None, Some(location)) => {
            validate_coordinates(location)?;
            nearest_station(
                state,
                location,
                input.max_distance_km.unwrap_or(DEFAULT_MAX_DISTANCE_KM),
            )
            .await?
        }
        (None, None) => {
            return Err(ToolError::invalid_input(
                "Either 'location' or 'stationId' is required",
            ));
        }
    };

    let path = format!(
        "/observations/v0.jsonld?sources={}&referencetime={}/{}&elements={}",
        station.id,
        window.from.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        window.to.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ELEMENTS
    );
    let response = state.frost.fetch(&path, FetchOptions::default()).await?;
    let parsed: ObservationsResponse = serde_json::from_value(response.data).map_err(|e| {
        ToolError::upstream_unavailable(format!("Unexpected observations payload: {}", e))
    })?;

    let points: Vec<ObservationPoint> = parsed.data.iter().map(observation_point).collect();
    // Frost is reached directly; there is no shared cache in front of it.
    let source = source_metadata(PRODUCT, &response.cache);

    let summary = match points.last() {
        None => format!("No observations from {} in the requested window.", station.id),
        Some(latest) => {
            let name = station.name.as_deref().unwrap_or(&station.id);
            if is_norwegian(input.language.as_deref()) {
                format!(
                    "Siste observasjon fra {}: {} kl {}.",
                    name,
                    latest
                        .air_temperature_c
                        .map(|t| format!("{:.1} °C", t))
                        .unwrap_or_else(|| "ukjent temperatur".to_string()),
                    latest.time.format("%H:%M UTC")
                )
            } else {
                format!(
                    "Latest observation from {}: {} at {}.",
                    name,
                    latest
                        .air_temperature_c
                        .map(|t| format!("{:.1} °C", t))
                        .unwrap_or_else(|| "unknown temperature".to_string()),
                    latest.time.format("%H:%M UTC")
                )
            }
        }
    };

    let structured = serde_json::json!({
        "product": PRODUCT,
        "station": station,
        "timeWindow": {
            "from": window.from.to_rfc3339(),
            "to": window.to.to_rfc3339(),
        },
        "points": points,
        "source": source,
    });

    Ok(attribution::tool_response(structured, summary))
}

/// Observations look backwards: presets and the default window are mirrored
/// into the past, explicit intervals are taken as given.
fn observation_window(
    input: Option<&TimeWindowInput>,
    now: DateTime<Utc>,
) -> Result<ResolvedWindow, ToolError> {
    let window = resolve_time_window(input, now, Duration::hours(MAX_WINDOW_HOURS))?;
    if window.from >= now {
        let span = window.duration();
        Ok(ResolvedWindow {
            from: now - span,
            to: now,
        })
    } else {
        Ok(window)
    }
}

async fn nearest_station(
    state: &AppState,
    location: &Coordinate,
    max_distance_km: f64,
) -> Result<Source, ToolError> {
    let path = format!(
        "/sources/v0.jsonld?types=SensorSystem&geometry=nearest(POINT({} {}))&nearestmaxcount=3",
        location.lon, location.lat
    );
    let response = state.frost.fetch(&path, FetchOptions::default()).await?;
    let parsed: SourcesResponse = serde_json::from_value(response.data).map_err(|e| {
        ToolError::upstream_unavailable(format!("Unexpected sources payload: {}", e))
    })?;

    parsed
        .data
        .into_iter()
        .find(|s| s.distance.map(|d| d <= max_distance_km).unwrap_or(false))
        .ok_or_else(|| {
            ToolError::out_of_coverage(
                format!(
                    "No weather station within {} km of {},{}",
                    max_distance_km, location.lat, location.lon
                ),
                location.lat,
                location.lon,
            )
        })
}

fn observation_point(entry: &ObservationEntry) -> ObservationPoint {
    let values: HashMap<&str, f64> = entry
        .observations
        .iter()
        .map(|o| (o.element_id.as_str(), o.value))
        .collect();
    ObservationPoint {
        time: entry.reference_time,
        station_id: entry.source_id.clone(),
        air_temperature_c: values.get("air_temperature").copied(),
        wind_speed_ms: values.get("wind_speed").copied(),
        wind_direction_deg: values.get("wind_from_direction").copied(),
        humidity_pct: values.get("relative_humidity").copied(),
        precipitation_mm: values.get("sum(precipitation_amount PT1H)").copied(),
    }
}
