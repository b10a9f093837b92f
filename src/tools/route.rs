//! `weather.assess_route_risk`: samples a route at bounded waypoints, runs
//! the marine forecast for each, and rolls the risk up to a trip verdict.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::attribution::{self, CREDIT_LINE, LICENSE_URI, PROVIDER};
use crate::coverage::Coordinate;
use crate::error::ToolError;
use crate::protocol::CallToolResult;
use crate::timewindow::TimeWindowInput;
use crate::tool::{Tool, ToolBuilder};
use crate::tools::marine::{self, MarinePoint, RiskLevel, VesselType};
use crate::tools::{AppState, is_norwegian};

/// Upper bound on marine sub-calls per trip.
const MAX_WAYPOINTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Caution,
    Dangerous,
    Extreme,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteInput {
    /// Route polyline, at least two waypoints.
    pub route: Vec<Coordinate>,
    pub vessel_type: VesselType,
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WaypointAssessment {
    index: usize,
    location: Coordinate,
    max_risk: RiskLevel,
    high_risk_hours: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Hotspot {
    waypoint_index: usize,
    location: Coordinate,
    time: DateTime<Utc>,
    wave_height_m: f64,
    current_speed_m_s: f64,
    risk: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

// The slice of the marine tool's structured output this tool consumes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarineSlice {
    time_window: WindowSlice,
    points: Vec<MarinePoint>,
}

#[derive(Debug, Deserialize)]
struct WindowSlice {
    from: String,
    to: String,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("weather.assess_route_risk")
        .description(
            "Assess marine risk along a route: samples up to five waypoints, \
             rolls per-hour vessel risk into a trip verdict and lists the \
             high-risk hotspots.",
        )
        .handler_with_state(state, |state: Arc<AppState>, input: RouteInput| async move {
            run(&state, input).await
        })
}

async fn run(state: &AppState, input: RouteInput) -> crate::error::Result<CallToolResult> {
    if input.route.len() < 2 {
        let err = ToolError::invalid_input("A route needs at least two waypoints");
        return Ok(attribution::error_response(&err));
    }

    let sampled = sample_indices(input.route.len(), MAX_WAYPOINTS);

    let mut assessments: Vec<WaypointAssessment> = Vec::new();
    let mut hotspots: Vec<Hotspot> = Vec::new();
    let mut trip_window: Option<WindowSlice> = None;

    // Sub-calls run sequentially; hotspot ordering is fixed afterwards.
    for &index in &sampled {
        let location = input.route[index];
        let mut args = serde_json::json!({
            "location": location,
            "vesselType": input.vessel_type,
        });
        if let Some(window) = &input.time_window {
            args["timeWindow"] = serde_json::to_value(window)?;
        }

        let inner = state.tools.call("weather.get_marine_forecast", args).await?;
        if inner.is_error {
            // No partial aggregation: the first sub-call error is the
            // composite's error, with its original code and details.
            return Ok(inner);
        }

        let structured = inner.structured_content.unwrap_or_default();
        let slice: MarineSlice = match serde_json::from_value(structured) {
            Ok(s) => s,
            Err(e) => {
                let err =
                    ToolError::internal(format!("Marine result had unexpected shape: {}", e));
                return Ok(attribution::error_response(&err));
            }
        };

        if trip_window.is_none() {
            trip_window = Some(slice.time_window);
        }

        let max_risk = slice
            .points
            .iter()
            .map(|p| p.risk)
            .max()
            .unwrap_or(RiskLevel::Low);
        let high_risk_hours = slice
            .points
            .iter()
            .filter(|p| p.risk >= RiskLevel::High)
            .count();

        for point in slice.points.iter().filter(|p| p.risk >= RiskLevel::High) {
            hotspots.push(Hotspot {
                waypoint_index: index,
                location,
                time: point.time,
                wave_height_m: point.wave_height_m,
                current_speed_m_s: point.current_speed_m_s,
                risk: point.risk,
                note: point.note.clone(),
            });
        }

        assessments.push(WaypointAssessment {
            index,
            location,
            max_risk,
            high_risk_hours,
        });
    }

    let verdict = roll_up(&assessments);
    hotspots.sort_by(|a, b| {
        b.risk
            .cmp(&a.risk)
            .then(a.time.cmp(&b.time))
            .then(a.waypoint_index.cmp(&b.waypoint_index))
    });

    // The trip window comes from the first waypoint assessment; if that
    // branch produced none, fall back to the default horizon.
    let (window_from, window_to) = match &trip_window {
        Some(w) => (w.from.clone(), w.to.clone()),
        None => {
            let now = Utc::now();
            (
                now.to_rfc3339(),
                (now + chrono::Duration::hours(48)).to_rfc3339(),
            )
        }
    };

    let recommendation = recommend(verdict, input.vessel_type);
    let summary = render_summary(&input, verdict, &hotspots, &recommendation);

    let structured = serde_json::json!({
        "verdict": verdict,
        "vesselType": input.vessel_type,
        "waypoints": assessments,
        "hotspots": hotspots,
        "timeWindow": {"from": window_from, "to": window_to},
        "recommendation": recommendation,
        "source": {
            "provider": PROVIDER,
            "product": marine::PRODUCT,
            "licenseUri": LICENSE_URI,
            "creditLine": CREDIT_LINE,
        },
    });

    Ok(attribution::tool_response(structured, summary))
}

/// Sample at most `max` indices: always first and last, the rest by even
/// stride. Deterministic; no randomness.
fn sample_indices(len: usize, max: usize) -> Vec<usize> {
    if len <= max {
        return (0..len).collect();
    }
    let last = len - 1;
    let mut indices: Vec<usize> = (0..max)
        .map(|k| (k * last + (max - 1) / 2) / (max - 1))
        .collect();
    indices[0] = 0;
    indices[max - 1] = last;
    indices.dedup();
    indices
}

fn roll_up(assessments: &[WaypointAssessment]) -> Verdict {
    let extreme = assessments
        .iter()
        .any(|a| a.max_risk == RiskLevel::Extreme);
    if extreme {
        return Verdict::Extreme;
    }
    let high_count = assessments
        .iter()
        .filter(|a| a.max_risk >= RiskLevel::High)
        .count();
    if high_count >= 2 {
        return Verdict::Dangerous;
    }
    if high_count == 1 {
        return Verdict::Caution;
    }
    if assessments.iter().any(|a| a.max_risk == RiskLevel::Moderate) {
        return Verdict::Caution;
    }
    Verdict::Safe
}

fn recommend(verdict: Verdict, vessel: VesselType) -> String {
    match verdict {
        Verdict::Safe => format!(
            "Conditions along the route are within the envelope for a {}.",
            vessel.label()
        ),
        Verdict::Caution => format!(
            "Parts of the route are demanding for a {}; plan around the listed hotspots.",
            vessel.label()
        ),
        Verdict::Dangerous => format!(
            "Several waypoints exceed safe conditions for a {}; postpone or reroute.",
            vessel.label()
        ),
        Verdict::Extreme => format!(
            "Hazardous sea state for a {}; do not attempt this trip.",
            vessel.label()
        ),
    }
}

fn render_summary(
    input: &RouteInput,
    verdict: Verdict,
    hotspots: &[Hotspot],
    recommendation: &str,
) -> String {
    if is_norwegian(input.language.as_deref()) {
        format!(
            "Ruterisiko for {}: {:?}. {} risikopunkter. {}",
            input.vessel_type.label(),
            verdict,
            hotspots.len(),
            recommendation
        )
    } else {
        format!(
            "Route verdict for {}: {:?} with {} hotspot(s). {}",
            input.vessel_type.label(),
            verdict,
            hotspots.len(),
            recommendation
        )
    }
}
