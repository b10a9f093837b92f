//! `weather.get_nowcast`: radar-based precipitation nowcast, Nordic only.

use std::sync::Arc;

use chrono::Duration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::attribution::{self, source_metadata};
use crate::coverage::{Coordinate, Fence, check_coverage, validate_coordinates};
use crate::error::ToolError;
use crate::protocol::CallToolResult;
use crate::timewindow::{TimeWindowInput, resolve_time_window};
use crate::tool::{Tool, ToolBuilder};
use crate::tools::met::{self, Resolution, TimeseriesResponse, WeatherPoint};
use crate::tools::{AppState, is_norwegian};
use crate::upstream::FetchOptions;

pub const PRODUCT: &str = "Nowcast 2.0";
const MAX_WINDOW_HOURS: i64 = 2;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NowcastInput {
    pub location: Coordinate,
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

/// Precipitation intensity classes derived from the rate in mm/h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationClass {
    None,
    Light,
    Moderate,
    Heavy,
}

/// Classify a precipitation rate. Missing rates count as zero here; the
/// class is the one field a nowcast cannot leave empty.
pub fn classify_precipitation(rate_mm_per_h: f64) -> PrecipitationClass {
    if rate_mm_per_h <= 0.0 {
        PrecipitationClass::None
    } else if rate_mm_per_h < 2.5 {
        PrecipitationClass::Light
    } else if rate_mm_per_h < 10.0 {
        PrecipitationClass::Moderate
    } else {
        PrecipitationClass::Heavy
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NowcastPoint {
    #[serde(flatten)]
    point: WeatherPoint,
    precipitation_class: PrecipitationClass,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("weather.get_nowcast")
        .description(
            "Minute-scale precipitation nowcast for the next two hours. \
             Nordic coverage only (lat 55..72, lon 4..32).",
        )
        .handler_with_state(state, |state: Arc<AppState>, input: NowcastInput| async move {
            match run(&state, input).await {
                Ok(result) => Ok(result),
                Err(e) => Ok(attribution::error_response(&e)),
            }
        })
}

async fn run(state: &AppState, input: NowcastInput) -> Result<CallToolResult, ToolError> {
    validate_coordinates(&input.location)?;
    check_coverage(Fence::Nordic, &input.location)?;
    let window = resolve_time_window(
        input.time_window.as_ref(),
        chrono::Utc::now(),
        Duration::hours(MAX_WINDOW_HOURS),
    )?;

    let path = format!(
        "/weatherapi/nowcast/2.0/complete?{}",
        met::coord_query(input.location.lat, input.location.lon)
    );
    let response = state.proxy.fetch(&path, FetchOptions::default()).await?;
    let series: TimeseriesResponse = serde_json::from_value(response.data).map_err(|e| {
        ToolError::upstream_unavailable(format!("Unexpected nowcast payload: {}", e))
    })?;

    let points: Vec<NowcastPoint> = met::weather_points(&series, &window, Resolution::Hourly)
        .into_iter()
        .map(|point| NowcastPoint {
            precipitation_class: classify_precipitation(
                point.precipitation_mm_per_h.unwrap_or(0.0),
            ),
            point,
        })
        .collect();
    let source = source_metadata(PRODUCT, &response.cache);

    let raining_now = points
        .first()
        .map(|p| p.precipitation_class != PrecipitationClass::None)
        .unwrap_or(false);
    let summary = if is_norwegian(input.language.as_deref()) {
        format!(
            "Nedbørsvarsel for {},{}: {} de neste to timene.",
            input.location.lat,
            input.location.lon,
            if raining_now {
                "nedbør nå"
            } else {
                "opphold nå"
            }
        )
    } else {
        format!(
            "Nowcast for {},{}: {} over the next two hours.",
            input.location.lat,
            input.location.lon,
            if raining_now {
                "precipitation right now"
            } else {
                "currently dry"
            }
        )
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
