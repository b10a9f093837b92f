//! Product coverage fences and coordinate validation.
//!
//! Each MET product returns meaningful data only inside a rectangular
//! latitude/longitude region. Membership tests are inclusive on all bounds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A WGS84 coordinate with optional altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinate {
    /// Latitude in decimal degrees, -90..=90.
    pub lat: f64,
    /// Longitude in decimal degrees, -180..=180.
    pub lon: f64,
    /// Altitude in metres above sea level, -500..=9000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<i32>,
}

/// An inclusive lat/lon rectangle.
#[derive(Debug, Clone, Copy)]
struct Rect {
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
}

impl Rect {
    const fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }
}

/// Coverage regions gating specific products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fence {
    /// Nowcast radar coverage over the Nordics.
    Nordic,
    /// Air-quality model coverage over Norway.
    Domestic,
    /// Ocean-forecast coverage: the Oslo fjord and the western coast.
    Coastal,
}

const NORDIC: Rect = Rect::new(55.0, 72.0, 4.0, 32.0);
const DOMESTIC: Rect = Rect::new(58.0, 71.0, 4.0, 31.0);
const COASTAL_OSLO_FJORD: Rect = Rect::new(59.0, 60.5, 10.0, 11.5);
const COASTAL_WEST: Rect = Rect::new(58.0, 63.0, 4.5, 8.0);

impl Fence {
    /// Inclusive membership test.
    pub fn contains(self, coord: &Coordinate) -> bool {
        match self {
            Fence::Nordic => NORDIC.contains(coord.lat, coord.lon),
            Fence::Domestic => DOMESTIC.contains(coord.lat, coord.lon),
            Fence::Coastal => {
                COASTAL_OSLO_FJORD.contains(coord.lat, coord.lon)
                    || COASTAL_WEST.contains(coord.lat, coord.lon)
            }
        }
    }

    /// Human-readable bounds for error messages.
    pub fn describe(self) -> &'static str {
        match self {
            Fence::Nordic => "the Nordic region (lat 55..72, lon 4..32)",
            Fence::Domestic => "Norway (lat 58..71, lon 4..31)",
            Fence::Coastal => "Norwegian coastal waters (Oslo fjord or the western coast)",
        }
    }
}

/// Reject coordinates outside WGS84 bounds.
pub fn validate_coordinates(coord: &Coordinate) -> Result<(), ToolError> {
    if !(-90.0..=90.0).contains(&coord.lat) {
        return Err(ToolError::invalid_input(format!(
            "Latitude {} is out of range (-90..90)",
            coord.lat
        )));
    }
    if !(-180.0..=180.0).contains(&coord.lon) {
        return Err(ToolError::invalid_input(format!(
            "Longitude {} is out of range (-180..180)",
            coord.lon
        )));
    }
    if let Some(alt) = coord.altitude {
        if !(-500..=9000).contains(&alt) {
            return Err(ToolError::invalid_input(format!(
                "Altitude {} is out of range (-500..9000)",
                alt
            )));
        }
    }
    Ok(())
}

/// Apply a product's coverage gate.
pub fn check_coverage(fence: Fence, coord: &Coordinate) -> Result<(), ToolError> {
    if fence.contains(coord) {
        Ok(())
    } else {
        Err(ToolError::out_of_coverage(
            format!(
                "Location {},{} is outside {}",
                coord.lat,
                coord.lon,
                fence.describe()
            ),
            coord.lat,
            coord.lon,
        ))
    }
}
