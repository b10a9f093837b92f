//! `weather.get_forecast`: hourly forecast from Locationforecast 2.0.

use std::sync::Arc;

use chrono::Duration;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::attribution::{self, source_metadata};
use crate::coverage::{Coordinate, validate_coordinates};
use crate::error::ToolError;
use crate::protocol::CallToolResult;
use crate::timewindow::{TimeWindowInput, resolve_time_window};
use crate::tool::{Tool, ToolBuilder};
use crate::tools::met::{self, Resolution, TimeseriesResponse};
use crate::tools::{AppState, is_norwegian};
use crate::upstream::FetchOptions;

pub const PRODUCT: &str = "Locationforecast 2.0";
const MAX_WINDOW_HOURS: i64 = 240;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastInput {
    pub location: Coordinate,
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("weather.get_forecast")
        .description(
            "Hourly weather forecast for a coordinate: temperature, wind, \
             precipitation, humidity, cloud cover and a symbol code. Up to \
             10 days ahead, hourly or 3-hourly resolution.",
        )
        .handler_with_state(state, |state: Arc<AppState>, input: ForecastInput| async move {
            match run(&state, input).await {
                Ok(result) => Ok(result),
                Err(e) => Ok(attribution::error_response(&e)),
            }
        })
}

async fn run(state: &AppState, input: ForecastInput) -> Result<CallToolResult, ToolError> {
    validate_coordinates(&input.location)?;
    let window = resolve_time_window(
        input.time_window.as_ref(),
        chrono::Utc::now(),
        Duration::hours(MAX_WINDOW_HOURS),
    )?;

    let mut path = format!(
        "/weatherapi/locationforecast/2.0/complete?{}",
        met::coord_query(input.location.lat, input.location.lon)
    );
    if let Some(altitude) = input.location.altitude {
        path.push_str(&format!("&altitude={}", altitude));
    }

    let response = state.proxy.fetch(&path, FetchOptions::default()).await?;
    let series: TimeseriesResponse = serde_json::from_value(response.data).map_err(|e| {
        ToolError::upstream_unavailable(format!("Unexpected forecast payload: {}", e))
    })?;

    let resolution = input.resolution.unwrap_or_default();
    let points = met::weather_points(&series, &window, resolution);
    let source = source_metadata(PRODUCT, &response.cache);

    let summary = match points.first() {
        None => {
            if is_norwegian(input.language.as_deref()) {
                format!(
                    "Ingen varselpunkter for {},{} i valgt tidsrom.",
                    input.location.lat, input.location.lon
                )
            } else {
                format!(
                    "No forecast points for {},{} in the requested window.",
                    input.location.lat, input.location.lon
                )
            }
        }
        Some(first) => {
            let norwegian = is_norwegian(input.language.as_deref());
            let temperature = match first.temperature_c {
                Some(t) => format!("{:.1} °C", t),
                None if norwegian => "ukjent temperatur".to_string(),
                None => "unknown temperature".to_string(),
            };
            let wind = match first.wind_speed_ms {
                Some(w) => format!("{:.1} m/s", w),
                None if norwegian => "ukjent vind".to_string(),
                None => "unknown wind".to_string(),
            };
            if norwegian {
                format!(
                    "Varsel for {},{}: {} punkter fra {}. Nå: {}, vind {}.",
                    input.location.lat,
                    input.location.lon,
                    points.len(),
                    window.from.format("%Y-%m-%d %H:%M UTC"),
                    temperature,
                    wind
                )
            } else {
                format!(
                    "Forecast for {},{}: {} points from {}. Now: {}, wind {}.",
                    input.location.lat,
                    input.location.lon,
                    points.len(),
                    window.from.format("%Y-%m-%d %H:%M UTC"),
                    temperature,
                    wind
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
        "resolution": resolution,
        "points": points,
        "source": source,
    });

    Ok(attribution::tool_response(structured, summary))
}
