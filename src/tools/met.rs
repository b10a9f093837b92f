//! Shared MET payload shapes and normalisation.
//!
//! Locationforecast, Nowcast and Oceanforecast all answer with the same
//! timeseries envelope; only the detail keys differ. Details are decoded
//! into a key/value map so each product picks the fields it consumes and
//! missing optional values stay absent rather than defaulting to zero.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::timewindow::ResolvedWindow;

// =============================================================================
// Wire shapes
// =============================================================================

/// The `properties.timeseries` envelope common to the MET forecast products.
#[derive(Debug, Deserialize)]
pub struct TimeseriesResponse {
    pub properties: TimeseriesProperties,
}

#[derive(Debug, Deserialize)]
pub struct TimeseriesProperties {
    pub timeseries: Vec<TimeStep>,
}

#[derive(Debug, Deserialize)]
pub struct TimeStep {
    pub time: DateTime<Utc>,
    pub data: StepData,
}

#[derive(Debug, Deserialize)]
pub struct StepData {
    pub instant: InstantData,
    #[serde(default)]
    pub next_1_hours: Option<NextHours>,
    #[serde(default)]
    pub next_6_hours: Option<NextHours>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InstantData {
    #[serde(default)]
    pub details: HashMap<String, f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextHours {
    #[serde(default)]
    pub summary: Option<SymbolSummary>,
    #[serde(default)]
    pub details: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolSummary {
    pub symbol_code: String,
}

// =============================================================================
// Normalised points
// =============================================================================

/// One normalised weather hour (SI units, Celsius).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherPoint {
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_mm_per_h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_cover_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_p10: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_p90: Option<f64>,
}

/// Requested sampling density for hourly series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Resolution {
    #[default]
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "3-hourly")]
    ThreeHourly,
}

/// Filter the series to the window, normalise, and decimate if requested.
pub fn weather_points(
    response: &TimeseriesResponse,
    window: &ResolvedWindow,
    resolution: Resolution,
) -> Vec<WeatherPoint> {
    let points = response
        .properties
        .timeseries
        .iter()
        .filter(|step| step.time >= window.from && step.time <= window.to)
        .map(weather_point);
    decimate(points.collect(), resolution)
}

fn weather_point(step: &TimeStep) -> WeatherPoint {
    let instant = &step.data.instant.details;
    let next = step.data.next_1_hours.as_ref().or(step.data.next_6_hours.as_ref());
    WeatherPoint {
        time: step.time,
        temperature_c: instant.get("air_temperature").copied(),
        wind_speed_ms: instant.get("wind_speed").copied(),
        wind_direction_deg: instant.get("wind_from_direction").copied(),
        precipitation_mm_per_h: next.and_then(|n| n.details.get("precipitation_amount").copied()),
        humidity_pct: instant.get("relative_humidity").copied(),
        cloud_cover_pct: instant.get("cloud_area_fraction").copied(),
        symbol: next
            .and_then(|n| n.summary.as_ref())
            .map(|s| s.symbol_code.clone()),
        temperature_p10: instant.get("air_temperature_percentile_10").copied(),
        temperature_p90: instant.get("air_temperature_percentile_90").copied(),
    }
}

/// Keep every third sample for 3-hourly output.
pub fn decimate<T>(points: Vec<T>, resolution: Resolution) -> Vec<T> {
    match resolution {
        Resolution::Hourly => points,
        Resolution::ThreeHourly => points
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == 0)
            .map(|(_, p)| p)
            .collect(),
    }
}

/// Format a coordinate pair the way the MET endpoints expect.
pub fn coord_query(lat: f64, lon: f64) -> String {
    format!("lat={:.4}&lon={:.4}", lat, lon)
}
