//! Time-window resolution: presets and explicit intervals to absolute UTC.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Client-supplied time window: a preset or an explicit interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowInput {
    /// RFC-3339 UTC start, used together with `to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// RFC-3339 UTC end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Next24h,
    Next48h,
    Next7d,
    FullAvailable,
}

/// A resolved absolute interval, `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ResolvedWindow {
    pub fn duration(&self) -> Duration {
        self.to - self.from
    }
}

/// Longest horizon any product offers.
const FULL_AVAILABLE_HOURS: i64 = 240;

/// Resolve a window against `now`, clamped to the product's horizon `cap`.
///
/// No input defaults to the next 48 hours. Explicit intervals must parse as
/// RFC-3339, run forward, and fit the cap.
pub fn resolve_time_window(
    input: Option<&TimeWindowInput>,
    now: DateTime<Utc>,
    cap: Duration,
) -> Result<ResolvedWindow, ToolError> {
    let input = match input {
        None => return Ok(clamped(now, Duration::hours(48), cap)),
        Some(input) => input,
    };

    if let Some(preset) = input.preset {
        let span = match preset {
            Preset::Next24h => Duration::hours(24),
            Preset::Next48h => Duration::hours(48),
            Preset::Next7d => Duration::days(7),
            Preset::FullAvailable => Duration::hours(FULL_AVAILABLE_HOURS),
        };
        return Ok(clamped(now, span, cap));
    }

    match (&input.from, &input.to) {
        (None, None) => Ok(clamped(now, Duration::hours(48), cap)),
        (Some(from), Some(to)) => {
            let from = parse_utc(from)?;
            let to = parse_utc(to)?;
            if from >= to {
                return Err(ToolError::invalid_input(format!(
                    "Time window start {} is not before end {}",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
            if to - from > cap {
                return Err(ToolError::invalid_input(format!(
                    "Time window exceeds the maximum of {} hours for this product",
                    cap.num_hours()
                )));
            }
            Ok(ResolvedWindow { from, to })
        }
        _ => Err(ToolError::invalid_input(
            "Time window requires both 'from' and 'to', or a preset",
        )),
    }
}

fn clamped(now: DateTime<Utc>, span: Duration, cap: Duration) -> ResolvedWindow {
    let span = if span > cap { cap } else { span };
    ResolvedWindow {
        from: now,
        to: now + span,
    }
}

fn parse_utc(value: &str) -> Result<DateTime<Utc>, ToolError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ToolError::invalid_input(format!("'{}' is not a valid RFC-3339 timestamp", value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn default_window_is_48h() {
        let w = resolve_time_window(None, now(), Duration::hours(240)).unwrap();
        assert_eq!(w.from, now());
        assert_eq!(w.duration(), Duration::hours(48));
    }

    #[test]
    fn presets_resolve_and_are_idempotent() {
        let input = TimeWindowInput {
            preset: Some(Preset::Next24h),
            ..Default::default()
        };
        let a = resolve_time_window(Some(&input), now(), Duration::hours(240)).unwrap();
        let b = resolve_time_window(Some(&input), now(), Duration::hours(240)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.duration(), Duration::hours(24));
    }

    #[test]
    fn full_available_is_clamped_by_product_cap() {
        let input = TimeWindowInput {
            preset: Some(Preset::FullAvailable),
            ..Default::default()
        };
        let w = resolve_time_window(Some(&input), now(), Duration::hours(2)).unwrap();
        assert_eq!(w.duration(), Duration::hours(2));

        let w = resolve_time_window(Some(&input), now(), Duration::hours(240)).unwrap();
        assert_eq!(w.duration(), Duration::hours(240));
    }

    #[test]
    fn explicit_interval() {
        let input = TimeWindowInput {
            from: Some("2025-06-15T12:00:00Z".to_string()),
            to: Some("2025-06-16T00:00:00Z".to_string()),
            preset: None,
        };
        let w = resolve_time_window(Some(&input), now(), Duration::hours(48)).unwrap();
        assert_eq!(w.duration(), Duration::hours(12));
    }

    #[test]
    fn reversed_interval_is_rejected() {
        let input = TimeWindowInput {
            from: Some("2025-06-16T00:00:00Z".to_string()),
            to: Some("2025-06-15T12:00:00Z".to_string()),
            preset: None,
        };
        let err = resolve_time_window(Some(&input), now(), Duration::hours(48)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let input = TimeWindowInput {
            from: Some("2025-06-15T12:00:00Z".to_string()),
            to: Some("2025-06-18T12:00:00Z".to_string()),
            preset: None,
        };
        let err = resolve_time_window(Some(&input), now(), Duration::hours(48)).unwrap_err();
        assert!(err.message.contains("48 hours"));
    }

    #[test]
    fn half_open_interval_is_rejected() {
        let input = TimeWindowInput {
            from: Some("2025-06-15T12:00:00Z".to_string()),
            to: None,
            preset: None,
        };
        assert!(resolve_time_window(Some(&input), now(), Duration::hours(48)).is_err());
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let input = TimeWindowInput {
            from: Some("yesterday".to_string()),
            to: Some("2025-06-16T00:00:00Z".to_string()),
            preset: None,
        };
        let err = resolve_time_window(Some(&input), now(), Duration::hours(48)).unwrap_err();
        assert!(err.message.contains("RFC-3339"));
    }
}
