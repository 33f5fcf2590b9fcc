pub mod telemetry;
pub mod vehicle;

pub use telemetry::{
    parse_topic, AxesPayload, Channel, GpsPayload, StatusPayload, TelemetryEvent, TelemetryPayload,
};
pub use vehicle::{GeoPoint, OperationalStatus, Vector3, VehicleState};
