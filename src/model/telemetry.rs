//! Wire payloads for the four telemetry channels.
//!
//! Trackers in the field are sloppy about types: numeric fields arrive as JSON
//! numbers or as strings, coordinate fields go by several aliases, and axes may
//! be missing entirely. All of that is normalized here, at the decode boundary,
//! so the merge rules only ever see canonical values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::error::MonitorError;
use crate::model::vehicle::Vector3;

/// One of the four telemetry kinds carried as a distinct topic per vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Gps,
    Gyroscope,
    Accelerometer,
    Status,
}

impl Channel {
    /// All channels the transport subscribes to.
    pub const ALL: [Channel; 4] = [
        Channel::Gps,
        Channel::Gyroscope,
        Channel::Accelerometer,
        Channel::Status,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Gyroscope => "gyroscope",
            Self::Accelerometer => "accelerometer",
            Self::Status => "status",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gps" => Ok(Self::Gps),
            "gyroscope" => Ok(Self::Gyroscope),
            "accelerometer" => Ok(Self::Accelerometer),
            "status" => Ok(Self::Status),
            other => Err(MonitorError::UnknownChannel(other.to_string())),
        }
    }
}

/// Parse `{prefix}/{vehicle_id}/{channel}` into its id and channel.
pub fn parse_topic(topic: &str) -> Result<(String, Channel), MonitorError> {
    let mut parts = topic.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_prefix), Some(id), Some(channel), None) if !id.is_empty() => {
            Ok((id.to_string(), channel.parse()?))
        }
        _ => Err(MonitorError::MalformedTopic(topic.to_string())),
    }
}

/// Accept a JSON number or a numeric string; anything else decodes as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) if n.is_finite() => Some(n),
        Some(Raw::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

/// A GPS fix as published on `{prefix}/{id}/gps`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GpsPayload {
    #[serde(default, alias = "lat", deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lon", alias = "lng", deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub speed: Option<f64>,
}

/// A 3-axis sample as published on the gyroscope and accelerometer topics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AxesPayload {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub z: Option<f64>,
}

impl AxesPayload {
    /// Canonical vector with missing axes defaulted to zero.
    pub fn vector(&self) -> Vector3 {
        Vector3::new(
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(0.0),
        )
    }
}

/// An authoritative status push as published on `{prefix}/{id}/status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub status: Option<String>,
}

/// A decoded payload, tagged by the channel it arrived on.
#[derive(Debug, Clone)]
pub enum TelemetryPayload {
    Gps(GpsPayload),
    Gyroscope(AxesPayload),
    Accelerometer(AxesPayload),
    Status(StatusPayload),
}

impl TelemetryPayload {
    /// Decode raw bytes for the given channel. Malformed JSON is an error the
    /// caller drops with a diagnostic; it never reaches the store.
    pub fn decode(channel: Channel, raw: &[u8]) -> Result<Self, MonitorError> {
        Ok(match channel {
            Channel::Gps => Self::Gps(serde_json::from_slice(raw)?),
            Channel::Gyroscope => Self::Gyroscope(serde_json::from_slice(raw)?),
            Channel::Accelerometer => Self::Accelerometer(serde_json::from_slice(raw)?),
            Channel::Status => Self::Status(serde_json::from_slice(raw)?),
        })
    }

    /// The channel this payload arrived on.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Gps(_) => Channel::Gps,
            Self::Gyroscope(_) => Channel::Gyroscope,
            Self::Accelerometer(_) => Channel::Accelerometer,
            Self::Status(_) => Channel::Status,
        }
    }
}

/// One successfully decoded inbound message.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    pub vehicle_id: String,
    pub payload: TelemetryPayload,
    pub received_at: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(vehicle_id: impl Into<String>, payload: TelemetryPayload) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.payload.channel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topic() {
        let (id, channel) = parse_topic("vehicles/vehicle_001/gps").unwrap();
        assert_eq!(id, "vehicle_001");
        assert_eq!(channel, Channel::Gps);
    }

    #[test]
    fn test_parse_topic_unknown_channel() {
        let err = parse_topic("vehicles/vehicle_001/thermometer").unwrap_err();
        assert!(matches!(err, MonitorError::UnknownChannel(c) if c == "thermometer"));
    }

    #[test]
    fn test_parse_topic_malformed() {
        assert!(matches!(
            parse_topic("vehicles/gps"),
            Err(MonitorError::MalformedTopic(_))
        ));
        assert!(matches!(
            parse_topic("vehicles/v1/gps/extra"),
            Err(MonitorError::MalformedTopic(_))
        ));
    }

    #[test]
    fn test_gps_decode_numbers_and_strings() {
        let gps: GpsPayload =
            serde_json::from_str(r#"{"latitude":"-7.9666","longitude":112.6326,"speed":"42.5"}"#)
                .unwrap();
        assert_eq!(gps.latitude, Some(-7.9666));
        assert_eq!(gps.longitude, Some(112.6326));
        assert_eq!(gps.speed, Some(42.5));
    }

    #[test]
    fn test_gps_decode_aliases() {
        let gps: GpsPayload = serde_json::from_str(r#"{"lat":1.5,"lng":"2.5"}"#).unwrap();
        assert_eq!(gps.latitude, Some(1.5));
        assert_eq!(gps.longitude, Some(2.5));
        assert_eq!(gps.speed, None);
    }

    #[test]
    fn test_non_numeric_fields_decode_as_absent() {
        let gps: GpsPayload =
            serde_json::from_str(r#"{"latitude":"not-a-number","longitude":null,"speed":true}"#)
                .unwrap();
        assert_eq!(gps.latitude, None);
        assert_eq!(gps.longitude, None);
        assert_eq!(gps.speed, None);
    }

    #[test]
    fn test_axes_missing_default_to_zero() {
        let axes: AxesPayload = serde_json::from_str(r#"{"x":40,"y":"40"}"#).unwrap();
        assert_eq!(axes.vector(), Vector3::new(40.0, 40.0, 0.0));
    }

    #[test]
    fn test_decode_malformed_json_is_an_error() {
        assert!(TelemetryPayload::decode(Channel::Gps, b"{not json").is_err());
    }

    #[test]
    fn test_decode_tags_by_channel() {
        let payload = TelemetryPayload::decode(Channel::Gyroscope, br#"{"x":1,"y":2,"z":3}"#)
            .unwrap();
        assert_eq!(payload.channel(), Channel::Gyroscope);
    }
}
