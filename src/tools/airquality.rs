//! `weather.get_air_quality`: AQI forecast from the domestic model.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::attribution::{self, source_metadata};
use crate::coverage::{Coordinate, Fence, check_coverage, validate_coordinates};
use crate::error::ToolError;
use crate::protocol::CallToolResult;
use crate::timewindow::{TimeWindowInput, resolve_time_window};
use crate::tool::{Tool, ToolBuilder};
use crate::tools::{AppState, is_norwegian};
use crate::upstream::FetchOptions;

pub const PRODUCT: &str = "Airqualityforecast 0.1";
const MAX_WINDOW_HOURS: i64 = 96;

/// Pollutants with a sub-index in the model, keyed by their AQI variable.
const POLLUTANTS: &[(&str, &str, &str)] = &[
    ("AQI_pm25", "pm25", "pm25_concentration"),
    ("AQI_pm10", "pm10", "pm10_concentration"),
    ("AQI_no2", "no2", "no2_concentration"),
    ("AQI_o3", "o3", "o3_concentration"),
];

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityInput {
    pub location: Coordinate,
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

/// Category from the numeric sub-index.
pub fn categorise(aqi: f64) -> AqiCategory {
    if aqi <= 1.0 {
        AqiCategory::Good
    } else if aqi <= 2.0 {
        AqiCategory::Fair
    } else if aqi <= 3.0 {
        AqiCategory::Moderate
    } else if aqi <= 4.0 {
        AqiCategory::Poor
    } else {
        AqiCategory::VeryPoor
    }
}

/// Deterministic advice per category.
pub fn advice(category: AqiCategory) -> &'static str {
    match category {
        AqiCategory::Good => "Air quality is good; no precautions needed.",
        AqiCategory::Fair => "Air quality is acceptable for most people.",
        AqiCategory::Moderate => {
            "Sensitive groups should consider limiting prolonged outdoor exertion."
        }
        AqiCategory::Poor => "Sensitive groups should avoid outdoor exertion; others limit it.",
        AqiCategory::VeryPoor => "Everyone should avoid outdoor exertion.",
    }
}

// Wire shape: data.time[] entries with a variables map of {value} objects.
#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    data: AirQualityData,
}

#[derive(Debug, Deserialize)]
struct AirQualityData {
    time: Vec<AirQualityStep>,
}

#[derive(Debug, Deserialize)]
struct AirQualityStep {
    from: DateTime<Utc>,
    #[serde(default)]
    variables: HashMap<String, Variable>,
}

#[derive(Debug, Deserialize)]
struct Variable {
    value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AirQualityPoint {
    time: DateTime<Utc>,
    aqi: f64,
    category: AqiCategory,
    dominant_pollutant: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    concentrations_ug_m3: HashMap<String, f64>,
    advice: &'static str,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("weather.get_air_quality")
        .description(
            "Air-quality forecast: AQI category, dominant pollutant and \
             per-pollutant concentrations. Norway only (lat 58..71, lon 4..31).",
        )
        .handler_with_state(
            state,
            |state: Arc<AppState>, input: AirQualityInput| async move {
                match run(&state, input).await {
                    Ok(result) => Ok(result),
                    Err(e) => Ok(attribution::error_response(&e)),
                }
            },
        )
}

async fn run(state: &AppState, input: AirQualityInput) -> Result<CallToolResult, ToolError> {
    validate_coordinates(&input.location)?;
    check_coverage(Fence::Domestic, &input.location)?;
    let window = resolve_time_window(
        input.time_window.as_ref(),
        chrono::Utc::now(),
        Duration::hours(MAX_WINDOW_HOURS),
    )?;

    let path = format!(
        "/weatherapi/airqualityforecast/0.1/?{}",
        crate::tools::met::coord_query(input.location.lat, input.location.lon)
    );
    let response = state.proxy.fetch(&path, FetchOptions::default()).await?;
    let parsed: AirQualityResponse = serde_json::from_value(response.data).map_err(|e| {
        ToolError::upstream_unavailable(format!("Unexpected air-quality payload: {}", e))
    })?;

    let points: Vec<AirQualityPoint> = parsed
        .data
        .time
        .iter()
        .filter(|step| step.from >= window.from && step.from <= window.to)
        .map(air_quality_point)
        .collect();
    let source = source_metadata(PRODUCT, &response.cache);

    let summary = match points.first() {
        None => format!(
            "No air-quality data for {},{} in the requested window.",
            input.location.lat, input.location.lon
        ),
        Some(first) => {
            if is_norwegian(input.language.as_deref()) {
                format!(
                    "Luftkvalitet for {},{}: {:?} (AQI {:.1}), dominert av {}.",
                    input.location.lat,
                    input.location.lon,
                    first.category,
                    first.aqi,
                    first.dominant_pollutant
                )
            } else {
                format!(
                    "Air quality at {},{}: {:?} (AQI {:.1}), dominated by {}. {}",
                    input.location.lat,
                    input.location.lon,
                    first.category,
                    first.aqi,
                    first.dominant_pollutant,
                    first.advice
                )
            }
        }
    };

    let structured = serde_json::json!({
        "product": PRODUCT,
        "location": input.location,
        "timeWindow": {
            "from": window.from.to_rfc3339(),
            "to": window.to.to_rfc3339(),
        },
        "points": points,
        "source": source,
    });

    Ok(attribution::tool_response(structured, summary))
}

fn air_quality_point(step: &AirQualityStep) -> AirQualityPoint {
    let aqi = step.variables.get("AQI").map(|v| v.value).unwrap_or(0.0);
    let category = categorise(aqi);

    // Dominant pollutant is the argmax of the per-pollutant sub-indices.
    let dominant_pollutant = POLLUTANTS
        .iter()
        .filter_map(|(index_key, name, _)| {
            step.variables.get(*index_key).map(|v| (*name, v.value))
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let concentrations_ug_m3 = POLLUTANTS
        .iter()
        .filter_map(|(_, name, conc_key)| {
            step.variables
                .get(*conc_key)
                .map(|v| (name.to_string(), v.value))
        })
        .collect();

    AirQualityPoint {
        time: step.from,
        aqi,
        category,
        dominant_pollutant,
        concentrations_ug_m3,
        advice: advice(category),
    }
}
