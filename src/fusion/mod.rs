//! Telemetry fusion: per-vehicle state merging and classification.
//!
//! The store applies one decoded channel event at a time onto the owning
//! vehicle's record, invoking accident detection on gyroscope samples and the
//! fallback speed estimator on accelerometer samples. Observers never write
//! here; every mutation is serialized through [`VehicleStore::merge`].

pub mod accident;
pub mod speed;
pub mod store;

pub use accident::AccidentDetector;
pub use speed::estimate_speed_kmh;
pub use store::VehicleStore;
