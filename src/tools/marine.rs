//! `weather.get_marine_forecast`: sea state from Oceanforecast 2.0 with
//! vessel-specific risk classification. Coastal coverage only.

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
use crate::tools::met::{self, TimeseriesResponse};
use crate::tools::{AppState, is_norwegian};
use crate::upstream::FetchOptions;

pub const PRODUCT: &str = "Oceanforecast 2.0";
const MAX_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VesselType {
    Kayak,
    SmallSailboat,
    Motorboat,
    Ship,
}

/// Risk tiers, ordered so `max` rolls up correctly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

/// One `(wave_m, current_m_s)` threshold row.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdRow {
    pub wave_m: f64,
    pub current_m_s: f64,
}

/// Per-vessel rows for the low, moderate and high tiers.
#[derive(Debug, Clone, Copy)]
pub struct VesselThresholds {
    pub low: ThresholdRow,
    pub moderate: ThresholdRow,
    pub high: ThresholdRow,
}

const fn row(wave_m: f64, current_m_s: f64) -> ThresholdRow {
    ThresholdRow { wave_m, current_m_s }
}

impl VesselType {
    pub fn thresholds(self) -> VesselThresholds {
        match self {
            VesselType::Kayak => VesselThresholds {
                low: row(0.3, 0.5),
                moderate: row(0.5, 1.0),
                high: row(0.8, 1.5),
            },
            VesselType::SmallSailboat => VesselThresholds {
                low: row(0.5, 1.0),
                moderate: row(1.0, 2.0),
                high: row(1.5, 3.0),
            },
            VesselType::Motorboat => VesselThresholds {
                low: row(0.8, 1.5),
                moderate: row(1.5, 2.5),
                high: row(2.0, 4.0),
            },
            VesselType::Ship => VesselThresholds {
                low: row(2.0, 3.0),
                moderate: row(3.5, 5.0),
                high: row(5.0, 7.0),
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VesselType::Kayak => "kayak",
            VesselType::SmallSailboat => "small sailboat",
            VesselType::Motorboat => "motorboat",
            VesselType::Ship => "ship",
        }
    }
}

/// Classify one hour of sea state against a vessel's thresholds.
///
/// A row counts as crossed when either parameter reaches its bound
/// (inclusive, so a wave exactly at a bound triggers that tier). Crossing
/// the high row on both parameters at once is classified as extreme.
pub fn classify_risk(wave_m: f64, current_m_s: f64, vessel: VesselType) -> RiskLevel {
    let t = vessel.thresholds();
    let crossed = |r: ThresholdRow| wave_m >= r.wave_m || current_m_s >= r.current_m_s;
    if wave_m >= t.high.wave_m && current_m_s >= t.high.current_m_s {
        RiskLevel::Extreme
    } else if crossed(t.high) {
        RiskLevel::High
    } else if crossed(t.moderate) {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

fn risk_note(risk: RiskLevel, vessel: VesselType) -> Option<String> {
    match risk {
        RiskLevel::Low => None,
        RiskLevel::Moderate => Some(format!(
            "Conditions are noticeable for a {}; stay alert.",
            vessel.label()
        )),
        RiskLevel::High => Some(format!(
            "Conditions exceed the safe envelope for a {}.",
            vessel.label()
        )),
        RiskLevel::Extreme => Some(format!(
            "Hazardous sea state for a {}; do not go out.",
            vessel.label()
        )),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarineInput {
    pub location: Coordinate,
    pub vessel_type: VesselType,
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

/// One normalised marine hour. Deserialized back by the route aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarinePoint {
    pub time: DateTime<Utc>,
    pub wave_height_m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wave_direction_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_temperature_c: Option<f64>,
    pub current_speed_m_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_direction_deg: Option<f64>,
    pub risk: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("weather.get_marine_forecast")
        .description(
            "Sea-state forecast for coastal waters: wave height and direction, \
             water temperature, currents, and a per-hour risk level for the \
             given vessel type.",
        )
        .handler_with_state(state, |state: Arc<AppState>, input: MarineInput| async move {
            match run(&state, input).await {
                Ok(result) => Ok(result),
                Err(e) => Ok(attribution::error_response(&e)),
            }
        })
}

async fn run(state: &AppState, input: MarineInput) -> Result<CallToolResult, ToolError> {
    validate_coordinates(&input.location)?;
    check_coverage(Fence::Coastal, &input.location)?;
    let window = resolve_time_window(
        input.time_window.as_ref(),
        chrono::Utc::now(),
        Duration::hours(MAX_WINDOW_HOURS),
    )?;

    let path = format!(
        "/weatherapi/oceanforecast/2.0/complete?{}",
        met::coord_query(input.location.lat, input.location.lon)
    );
    let response = state.proxy.fetch(&path, FetchOptions::default()).await?;
    let series: TimeseriesResponse = serde_json::from_value(response.data).map_err(|e| {
        ToolError::upstream_unavailable(format!("Unexpected ocean payload: {}", e))
    })?;

    let points: Vec<MarinePoint> = series
        .properties
        .timeseries
        .iter()
        .filter(|step| step.time >= window.from && step.time <= window.to)
        .map(|step| marine_point(step, input.vessel_type))
        .collect();
    let source = source_metadata(PRODUCT, &response.cache);

    let max_risk = points.iter().map(|p| p.risk).max();
    let summary = match max_risk {
        None => format!(
            "No marine data for {},{} in the requested window.",
            input.location.lat, input.location.lon
        ),
        Some(risk) => {
            if is_norwegian(input.language.as_deref()) {
                format!(
                    "Sjøvarsel for {},{} ({}): høyeste risiko {:?} i perioden.",
                    input.location.lat,
                    input.location.lon,
                    input.vessel_type.label(),
                    risk
                )
            } else {
                format!(
                    "Marine forecast for {},{} ({}): peak risk {:?} over the window.",
                    input.location.lat,
                    input.location.lon,
                    input.vessel_type.label(),
                    risk
                )
            }
        }
    };

    let structured = serde_json::json!({
        "product": PRODUCT,
        "location": input.location,
        "vesselType": input.vessel_type,
        "timeWindow": {
            "from": window.from.to_rfc3339(),
            "to": window.to.to_rfc3339(),
        },
        "points": points,
        "source": source,
    });

    Ok(attribution::tool_response(structured, summary))
}

fn marine_point(step: &met::TimeStep, vessel: VesselType) -> MarinePoint {
    let details = &step.data.instant.details;
    // The classifier needs numbers; absent sea-state values read as calm.
    let wave_height_m = details
        .get("sea_surface_wave_height")
        .copied()
        .unwrap_or(0.0);
    let current_speed_m_s = details.get("sea_water_speed").copied().unwrap_or(0.0);
    let risk = classify_risk(wave_height_m, current_speed_m_s, vessel);
    MarinePoint {
        time: step.time,
        wave_height_m,
        wave_direction_deg: details.get("sea_surface_wave_from_direction").copied(),
        water_temperature_c: details.get("sea_water_temperature").copied(),
        current_speed_m_s,
        current_direction_deg: details.get("sea_water_to_direction").copied(),
        risk,
        note: risk_note(risk, vessel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive_at_bounds() {
        // A wave exactly at a row's bound triggers that tier.
        assert_eq!(classify_risk(0.8, 0.0, VesselType::Kayak), RiskLevel::High);
        assert_eq!(
            classify_risk(0.5, 0.0, VesselType::Kayak),
            RiskLevel::Moderate
        );
        assert_eq!(classify_risk(0.2, 0.2, VesselType::Kayak), RiskLevel::Low);
    }

    #[test]
    fn either_parameter_can_cross_a_row() {
        assert_eq!(
            classify_risk(0.0, 1.5, VesselType::Kayak),
            RiskLevel::High
        );
        assert_eq!(
            classify_risk(0.0, 1.0, VesselType::Kayak),
            RiskLevel::Moderate
        );
    }

    #[test]
    fn both_parameters_past_high_is_extreme() {
        assert_eq!(
            classify_risk(1.0, 2.0, VesselType::Kayak),
            RiskLevel::Extreme
        );
        // One parameter alone stays high.
        assert_eq!(classify_risk(1.0, 0.1, VesselType::Kayak), RiskLevel::High);
    }

    #[test]
    fn vessel_tables_differ() {
        // A metre of wave is high risk for a kayak, low for a ship.
        assert_eq!(classify_risk(1.0, 0.0, VesselType::Kayak), RiskLevel::High);
        assert_eq!(classify_risk(1.0, 0.0, VesselType::Ship), RiskLevel::Low);
        assert_eq!(
            classify_risk(1.0, 0.0, VesselType::SmallSailboat),
            RiskLevel::Moderate
        );
        assert_eq!(
            classify_risk(2.0, 0.0, VesselType::Motorboat),
            RiskLevel::High
        );
    }

    #[test]
    fn risk_levels_order_for_rollup() {
        assert!(RiskLevel::Extreme > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Moderate);
        assert!(RiskLevel::Moderate > RiskLevel::Low);
    }

    #[test]
    fn marine_point_round_trips_through_json() {
        let point = MarinePoint {
            time: "2025-06-15T12:00:00Z".parse().unwrap(),
            wave_height_m: 1.0,
            wave_direction_deg: Some(200.0),
            water_temperature_c: Some(12.0),
            current_speed_m_s: 0.4,
            current_direction_deg: None,
            risk: RiskLevel::High,
            note: Some("note".to_string()),
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["risk"], "high");
        let back: MarinePoint = serde_json::from_value(json).unwrap();
        assert_eq!(back.risk, RiskLevel::High);
    }
}
