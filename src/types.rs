//! Data types shared by the sampling pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One vehicle as reported by a single feed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleObservation {
    pub route_tag: String,
    /// Raw `speedKmHr` attribute, unvalidated.
    pub speed: Option<String>,
}

impl VehicleObservation {
    pub fn new(route_tag: impl Into<String>, speed: Option<&str>) -> Self {
        Self {
            route_tag: route_tag.into(),
            speed: speed.map(str::to_string),
        }
    }
}

/// Average speed of one route at one sampling instant.
///
/// Field order is the positional layout of the persisted record:
/// `(timestamp_ms, route_tag, speed_kmh, vehicle_count)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedRecord {
    pub timestamp_ms: i64,
    pub route_tag: String,
    pub speed_kmh: f64,
    pub vehicle_count: u32,
}

/// Route tag to human-readable route title.
pub type RoutesLookup = BTreeMap<String, String>;
