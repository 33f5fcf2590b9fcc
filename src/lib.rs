pub mod client;
pub mod config;
mod error;
pub mod fusion;
pub mod model;
pub mod network;
pub mod notify;

pub use client::MonitorClient;
pub use config::{FusionConfig, MonitorConfig, MonitorConfigBuilder};
pub use error::MonitorError;
pub use fusion::{AccidentDetector, VehicleStore};
pub use model::{
    Channel, GeoPoint, OperationalStatus, TelemetryEvent, TelemetryPayload, Vector3, VehicleState,
};
pub use notify::{Notifier, Subscription};
