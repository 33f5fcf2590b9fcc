//! Per-vehicle state records and their building blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::MonitorError;

/// A GPS fix in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A raw 3-axis sensor sample (gyroscope in deg/s, accelerometer in m/s²).
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Full 3-axis magnitude.
    #[inline]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Magnitude in the x/y plane. The vertical axis is gravity-dominated
    /// and says nothing about forward motion.
    #[inline]
    pub fn planar_magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Derived operational status of a vehicle.
///
/// `Accident` is sticky: once entered it is only cleared by the accident
/// detector's exit threshold, never by a plain speed reclassification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    /// No telemetry merged yet.
    Unknown,
    Parked,
    Driving,
    Accident,
}

impl OperationalStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Parked => "parked",
            Self::Driving => "driving",
            Self::Accident => "accident",
        }
    }
}

impl std::fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationalStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "parked" => Ok(Self::Parked),
            "driving" => Ok(Self::Driving),
            "accident" => Ok(Self::Accident),
            other => Err(MonitorError::UnrecognizedStatus(other.to_string())),
        }
    }
}

impl Default for OperationalStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The fused state of one tracked vehicle.
///
/// Exactly one record exists per known id. Records are created lazily on the
/// first telemetry event (or pre-seeded via registration) and mutated only by
/// [`VehicleStore::merge`](crate::fusion::VehicleStore::merge).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VehicleState {
    pub id: String,
    /// Present once at least one valid GPS sample has been merged.
    pub location: Option<GeoPoint>,
    /// Always in `[0, max_speed_kmh]`; GPS-reported or accelerometer-estimated.
    pub speed_kmh: f64,
    pub gyroscope: Vector3,
    pub accelerometer: Vector3,
    pub status: OperationalStatus,
    /// Receipt timestamp of the most recent accepted merge, any channel.
    pub last_update: Option<DateTime<Utc>>,
    /// Set once a GPS payload has carried a speed value; gates the
    /// accelerometer speed estimator.
    #[serde(skip)]
    pub(crate) has_gps_speed: bool,
}

impl VehicleState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: None,
            speed_kmh: 0.0,
            gyroscope: Vector3::default(),
            accelerometer: Vector3::default(),
            status: OperationalStatus::Unknown,
            last_update: None,
            has_gps_speed: false,
        }
    }
}
