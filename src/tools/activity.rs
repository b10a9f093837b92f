//! `weather.assess_activity_windows`: sweeps an hourly forecast against an
//! activity comfort profile and finds contiguous good windows.
//!
//! The forecast is fetched through the registry, so the inner call carries
//! its own request context and metrics like any direct call.

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
use crate::tools::{AppState, forecast, is_norwegian};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Running,
    Cycling,
    Hiking,
    KidsPlayground,
    Commuting,
    Custom,
}

/// Field-wise overrides on top of the activity profile.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub min_temp: Option<f64>,
    #[serde(default)]
    pub max_temp: Option<f64>,
    #[serde(default)]
    pub max_wind: Option<f64>,
    #[serde(default)]
    pub avoid_rain: Option<bool>,
    #[serde(default)]
    pub avoid_heavy_rain: Option<bool>,
}

/// Effective comfort thresholds for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    pub max_wind_ms: f64,
    pub avoid_rain: bool,
    pub avoid_heavy_rain: bool,
}

const fn profile(
    min_temp_c: f64,
    max_temp_c: f64,
    max_wind_ms: f64,
    avoid_heavy_rain: bool,
) -> Thresholds {
    Thresholds {
        min_temp_c,
        max_temp_c,
        max_wind_ms,
        avoid_rain: false,
        avoid_heavy_rain,
    }
}

impl ActivityType {
    pub fn profile(self) -> Thresholds {
        match self {
            ActivityType::Running => profile(5.0, 20.0, 10.0, true),
            ActivityType::Cycling => profile(8.0, 25.0, 12.0, true),
            ActivityType::Hiking => profile(5.0, 25.0, 15.0, false),
            ActivityType::KidsPlayground => profile(10.0, 28.0, 8.0, true),
            ActivityType::Commuting => profile(-10.0, 35.0, 20.0, false),
            // Custom starts permissive; preferences carve it down.
            ActivityType::Custom => profile(-50.0, 50.0, 30.0, false),
        }
    }
}

/// Apply preference overrides field-wise.
pub fn resolve_thresholds(activity: ActivityType, prefs: Option<&Preferences>) -> Thresholds {
    let mut t = activity.profile();
    if let Some(p) = prefs {
        if let Some(v) = p.min_temp {
            t.min_temp_c = v;
        }
        if let Some(v) = p.max_temp {
            t.max_temp_c = v;
        }
        if let Some(v) = p.max_wind {
            t.max_wind_ms = v;
        }
        if let Some(v) = p.avoid_rain {
            t.avoid_rain = v;
        }
        if let Some(v) = p.avoid_heavy_rain {
            t.avoid_heavy_rain = v;
        }
    }
    t
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComfortScore {
    Good,
    Ok,
    Poor,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComfortSlot {
    pub time: DateTime<Utc>,
    pub score: ComfortScore,
    pub temperature_ok: bool,
    pub wind_ok: bool,
    pub precipitation_ok: bool,
    pub reason: String,
    pub temperature_c: f64,
    pub wind_speed_ms: f64,
    pub precipitation_mm_per_h: f64,
}

/// A maximal run of consecutive good slots.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub hours: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInput {
    pub location: Coordinate,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub time_window: Option<TimeWindowInput>,
    #[serde(default)]
    pub preferences: Option<Preferences>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

// The slice of the forecast's structured output this tool consumes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastSlice {
    time_window: WindowSlice,
    points: Vec<PointSlice>,
}

#[derive(Debug, Deserialize)]
struct WindowSlice {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointSlice {
    time: DateTime<Utc>,
    #[serde(default)]
    temperature_c: Option<f64>,
    #[serde(default)]
    wind_speed_ms: Option<f64>,
    #[serde(default)]
    precipitation_mm_per_h: Option<f64>,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("weather.assess_activity_windows")
        .description(
            "Score each forecast hour against an activity comfort profile \
             (temperature, wind, precipitation) and report the best \
             contiguous windows.",
        )
        .handler_with_state(state, |state: Arc<AppState>, input: ActivityInput| async move {
            run(&state, input).await
        })
}

async fn run(state: &AppState, input: ActivityInput) -> crate::error::Result<CallToolResult> {
    let thresholds = resolve_thresholds(input.activity_type, input.preferences.as_ref());

    let mut args = serde_json::json!({
        "location": input.location,
        "resolution": "hourly",
    });
    if let Some(window) = &input.time_window {
        args["timeWindow"] = serde_json::to_value(window)?;
    }

    let inner = state.tools.call("weather.get_forecast", args).await?;
    if inner.is_error {
        // The first sub-call error is the composite's error, unchanged.
        return Ok(inner);
    }

    let structured = inner.structured_content.unwrap_or_default();
    let forecast: ForecastSlice = match serde_json::from_value(structured) {
        Ok(f) => f,
        Err(e) => {
            let err = ToolError::internal(format!("Forecast result had unexpected shape: {}", e));
            return Ok(attribution::error_response(&err));
        }
    };

    let slots: Vec<ComfortSlot> = forecast
        .points
        .iter()
        .map(|p| score_slot(p, &thresholds))
        .collect();
    let windows = good_windows(&slots);
    let good_count = slots
        .iter()
        .filter(|s| s.score == ComfortScore::Good)
        .count();

    let summary = render_summary(&input, &slots, &windows, good_count);

    let structured = serde_json::json!({
        "activityType": input.activity_type,
        "location": input.location,
        "timeWindow": {
            "from": forecast.time_window.from,
            "to": forecast.time_window.to,
        },
        "thresholds": thresholds,
        "slots": slots,
        "bestWindows": windows,
        "source": {
            "provider": PROVIDER,
            "product": forecast::PRODUCT,
            "licenseUri": LICENSE_URI,
            "creditLine": CREDIT_LINE,
        },
    });

    Ok(attribution::tool_response(structured, summary))
}

fn score_slot(point: &PointSlice, t: &Thresholds) -> ComfortSlot {
    // The classifier needs numbers; hours missing a measurement read as 0.
    let temperature = point.temperature_c.unwrap_or(0.0);
    let wind = point.wind_speed_ms.unwrap_or(0.0);
    let rain = point.precipitation_mm_per_h.unwrap_or(0.0);
    let temperature_ok = temperature >= t.min_temp_c && temperature <= t.max_temp_c;
    let wind_ok = wind <= t.max_wind_ms;
    let precipitation_ok =
        (!t.avoid_rain || rain == 0.0) && (!t.avoid_heavy_rain || rain < 2.5);

    let violations = [temperature_ok, wind_ok, precipitation_ok]
        .iter()
        .filter(|ok| !**ok)
        .count();
    let score = match violations {
        0 => ComfortScore::Good,
        1 => ComfortScore::Ok,
        _ => ComfortScore::Poor,
    };

    let mut reasons = Vec::new();
    if !temperature_ok {
        reasons.push(format!(
            "temperature {:.1} °C outside {:.0}..{:.0} °C",
            temperature, t.min_temp_c, t.max_temp_c
        ));
    }
    if !wind_ok {
        reasons.push(format!(
            "wind {:.1} m/s above {:.0} m/s",
            wind, t.max_wind_ms
        ));
    }
    if !precipitation_ok {
        reasons.push(format!("precipitation {:.1} mm/h", rain));
    }
    let reason = if reasons.is_empty() {
        "within limits".to_string()
    } else {
        reasons.join("; ")
    };

    ComfortSlot {
        time: point.time,
        score,
        temperature_ok,
        wind_ok,
        precipitation_ok,
        reason,
        temperature_c: temperature,
        wind_speed_ms: wind,
        precipitation_mm_per_h: rain,
    }
}

/// Maximal runs of consecutive good slots of length >= 2, in time order.
fn good_windows(slots: &[ComfortSlot]) -> Vec<GoodWindow> {
    let mut windows = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, slot) in slots.iter().enumerate() {
        match (slot.score == ComfortScore::Good, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                push_window(&mut windows, slots, start, i);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        push_window(&mut windows, slots, start, slots.len());
    }
    windows
}

fn push_window(windows: &mut Vec<GoodWindow>, slots: &[ComfortSlot], start: usize, end: usize) {
    let hours = end - start;
    if hours >= 2 {
        windows.push(GoodWindow {
            from: slots[start].time,
            to: slots[end - 1].time,
            hours,
        });
    }
}

fn render_summary(
    input: &ActivityInput,
    slots: &[ComfortSlot],
    windows: &[GoodWindow],
    good_count: usize,
) -> String {
    let activity = serde_json::to_value(input.activity_type)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "activity".to_string());
    let norwegian = is_norwegian(input.language.as_deref());
    if windows.is_empty() {
        return if norwegian {
            format!(
                "Ingen sammenhengende gode perioder for {} ({} av {} timer gode).",
                activity,
                good_count,
                slots.len()
            )
        } else {
            format!(
                "No contiguous good windows for {} ({} of {} hours scored good).",
                activity,
                good_count,
                slots.len()
            )
        };
    }

    let listed = windows
        .iter()
        .take(3)
        .map(|w| format!("{}–{} ({} h)", w.from.format("%a %H:%M"), w.to.format("%H:%M"), w.hours))
        .collect::<Vec<_>>()
        .join(", ");
    if norwegian {
        format!(
            "Beste perioder for {}: {}. {} av {} timer er gode.",
            activity,
            listed,
            good_count,
            slots.len()
        )
    } else {
        format!(
            "Best windows for {}: {}. {} of {} hours scored good.",
            activity,
            listed,
            good_count,
            slots.len()
        )
    }
}
