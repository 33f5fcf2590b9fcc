//! The keyed, in-memory table of per-vehicle state and its merge rules.
//!
//! All mutation of vehicle state goes through [`VehicleStore::merge`]; readers
//! only ever see fully-merged records.

use std::collections::HashMap;

use tracing::warn;

use crate::config::FusionConfig;
use crate::error::MonitorError;
use crate::fusion::accident::AccidentDetector;
use crate::fusion::speed::estimate_speed_kmh;
use crate::model::{
    AxesPayload, GeoPoint, GpsPayload, OperationalStatus, StatusPayload, TelemetryEvent,
    TelemetryPayload, VehicleState,
};

pub struct VehicleStore {
    vehicles: HashMap<String, VehicleState>,
    detector: AccidentDetector,
    config: FusionConfig,
}

impl VehicleStore {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            vehicles: HashMap::new(),
            detector: AccidentDetector::new(&config),
            config,
        }
    }

    /// Pre-seed a default record for a registered vehicle. A no-op if the id
    /// is already tracked.
    pub fn register(&mut self, id: &str) -> VehicleState {
        self.vehicles
            .entry(id.to_string())
            .or_insert_with(|| VehicleState::new(id))
            .clone()
    }

    /// Apply one decoded telemetry event onto the owning vehicle's record.
    ///
    /// Creates the record lazily for a previously unseen id. Returns a clone
    /// of the fully-merged record. A failed merge leaves the store untouched.
    pub fn merge(&mut self, event: &TelemetryEvent) -> Result<VehicleState, MonitorError> {
        let state = self
            .vehicles
            .entry(event.vehicle_id.clone())
            .or_insert_with(|| VehicleState::new(&event.vehicle_id));

        let direct_override = matches!(event.payload, TelemetryPayload::Status(_));

        match &event.payload {
            TelemetryPayload::Gps(gps) => apply_gps(state, gps, &self.config),
            TelemetryPayload::Gyroscope(axes) => apply_gyroscope(state, axes, &self.detector),
            TelemetryPayload::Accelerometer(axes) => {
                apply_accelerometer(state, axes, &self.config)
            }
            TelemetryPayload::Status(status) => apply_status(state, status),
        }

        // Re-derive status from speed after every merge except a direct
        // override. An active accident flag always wins over this.
        if !direct_override && state.status != OperationalStatus::Accident {
            if state.speed_kmh > self.config.driving_min_kmh {
                state.status = OperationalStatus::Driving;
            } else if state.speed_kmh <= self.config.parked_max_kmh {
                state.status = OperationalStatus::Parked;
            }
            // Speeds inside (parked_max, driving_min] leave the status as-is.
        }

        state.last_update = Some(event.received_at);
        Ok(state.clone())
    }

    /// Read one record.
    pub fn get(&self, id: &str) -> Option<&VehicleState> {
        self.vehicles.get(id)
    }

    /// All records, sorted by id for deterministic consumption.
    pub fn snapshot(&self) -> Vec<VehicleState> {
        let mut all: Vec<VehicleState> = self.vehicles.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, MonitorError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(MonitorError::Validation { field, value })
    }
}

/// Take one coordinate if present and physically plausible; out-of-range
/// values are dropped with a diagnostic while the rest of the payload still
/// applies.
fn valid_coordinate(
    vehicle: &str,
    field: &'static str,
    value: Option<f64>,
    bound: f64,
) -> Option<f64> {
    let value = value?;
    match check_range(field, value, -bound, bound) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(vehicle, %e, "ignoring implausible coordinate");
            None
        }
    }
}

fn apply_gps(state: &mut VehicleState, gps: &GpsPayload, config: &FusionConfig) {
    let latitude = valid_coordinate(&state.id, "latitude", gps.latitude, 90.0);
    let longitude = valid_coordinate(&state.id, "longitude", gps.longitude, 180.0);

    if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
        state.location = Some(GeoPoint {
            latitude,
            longitude,
        });
    }

    // A GPS-reported speed is authoritative and disables estimation.
    if let Some(speed) = gps.speed {
        state.speed_kmh = speed.clamp(0.0, config.max_speed_kmh);
        state.has_gps_speed = true;
    }
}

fn apply_gyroscope(state: &mut VehicleState, axes: &AxesPayload, detector: &AccidentDetector) {
    state.gyroscope = axes.vector();
    let magnitude = state.gyroscope.magnitude();
    if let Some(status) = detector.assess(state.status, magnitude, state.speed_kmh) {
        state.status = status;
    }
}

fn apply_accelerometer(state: &mut VehicleState, axes: &AxesPayload, config: &FusionConfig) {
    state.accelerometer = axes.vector();
    if !state.has_gps_speed && state.speed_kmh == 0.0 {
        state.speed_kmh = estimate_speed_kmh(&state.accelerometer, config);
    }
}

fn apply_status(state: &mut VehicleState, payload: &StatusPayload) {
    let Some(raw) = payload.status.as_deref() else {
        return;
    };
    match raw.parse::<OperationalStatus>() {
        Ok(status) => state.status = status,
        Err(e) => warn!(vehicle = %state.id, %e, "ignoring status override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TelemetryPayload, Vector3};

    fn store() -> VehicleStore {
        VehicleStore::new(FusionConfig::default())
    }

    fn gps(json: &str) -> TelemetryPayload {
        TelemetryPayload::Gps(serde_json::from_str(json).unwrap())
    }

    fn gyro(x: f64, y: f64, z: f64) -> TelemetryPayload {
        TelemetryPayload::Gyroscope(AxesPayload {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        })
    }

    fn accel(x: f64, y: f64, z: f64) -> TelemetryPayload {
        TelemetryPayload::Accelerometer(AxesPayload {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        })
    }

    fn status(value: &str) -> TelemetryPayload {
        TelemetryPayload::Status(StatusPayload {
            status: Some(value.to_string()),
        })
    }

    fn merge(store: &mut VehicleStore, id: &str, payload: TelemetryPayload) -> VehicleState {
        store.merge(&TelemetryEvent::new(id, payload)).unwrap()
    }

    #[test]
    fn test_gps_coordinates_stored_exactly() {
        let mut store = store();
        let state = merge(
            &mut store,
            "v1",
            gps(r#"{"latitude":-7.9666,"longitude":112.6326,"speed":42.0}"#),
        );
        let location = state.location.unwrap();
        assert_eq!(location.latitude, -7.9666);
        assert_eq!(location.longitude, 112.6326);
        assert_eq!(state.speed_kmh, 42.0);
        assert_eq!(state.status, OperationalStatus::Driving);
        assert!(state.last_update.is_some());
    }

    #[test]
    fn test_out_of_range_coordinate_ignored_rest_applies() {
        let mut store = store();
        let state = merge(
            &mut store,
            "v1",
            gps(r#"{"latitude":95.0,"longitude":112.6,"speed":42.0}"#),
        );
        // Implausible latitude drops the fix, but the speed still merged
        assert!(state.location.is_none());
        assert_eq!(state.speed_kmh, 42.0);
    }

    #[test]
    fn test_gps_speed_clamped_to_cap_and_floor() {
        let mut store = store();
        let state = merge(&mut store, "v1", gps(r#"{"speed":900.0}"#));
        assert_eq!(state.speed_kmh, 150.0);
        let state = merge(&mut store, "v1", gps(r#"{"speed":-3.0}"#));
        assert_eq!(state.speed_kmh, 0.0);
    }

    #[test]
    fn test_unseen_id_creates_record_lazily() {
        let mut store = store();
        assert!(store.is_empty());
        merge(&mut store, "ghost", gyro(1.0, 1.0, 1.0));
        assert_eq!(store.len(), 1);
        assert!(store.get("ghost").is_some());
    }

    #[test]
    fn test_gyroscope_spike_flags_accident() {
        let mut store = store();
        // magnitude ≈ 57.4 > 50
        let state = merge(&mut store, "v1", gyro(40.0, 40.0, 10.0));
        assert_eq!(state.status, OperationalStatus::Accident);
        assert_eq!(state.gyroscope, Vector3::new(40.0, 40.0, 10.0));
    }

    #[test]
    fn test_accident_recovers_to_parked_when_stationary() {
        let mut store = store();
        merge(&mut store, "v1", gyro(40.0, 40.0, 10.0));
        // magnitude ≈ 1.73 < 10, speed still 0
        let state = merge(&mut store, "v1", gyro(1.0, 1.0, 1.0));
        assert_eq!(state.status, OperationalStatus::Parked);
    }

    #[test]
    fn test_accident_recovers_to_driving_when_moving() {
        let mut store = store();
        merge(&mut store, "v1", gps(r#"{"speed":60.0}"#));
        merge(&mut store, "v1", gyro(40.0, 40.0, 10.0));
        let state = merge(&mut store, "v1", gyro(1.0, 1.0, 1.0));
        assert_eq!(state.status, OperationalStatus::Driving);
    }

    #[test]
    fn test_accident_survives_speed_rederivation() {
        let mut store = store();
        merge(&mut store, "v1", gyro(40.0, 40.0, 10.0));
        // A fast GPS fix must not reclassify an accident to driving
        let state = merge(&mut store, "v1", gps(r#"{"speed":80.0}"#));
        assert_eq!(state.status, OperationalStatus::Accident);
        // Mid-band gyroscope readings hold the flag too
        let state = merge(&mut store, "v1", gyro(20.0, 10.0, 5.0));
        assert_eq!(state.status, OperationalStatus::Accident);
    }

    #[test]
    fn test_estimator_fires_without_gps_speed() {
        let mut store = store();
        let state = merge(&mut store, "v1", accel(3.0, 4.0, 0.0));
        assert_eq!(state.speed_kmh, 25.0);
        assert_eq!(state.status, OperationalStatus::Driving);
    }

    #[test]
    fn test_estimator_cap() {
        let mut store = store();
        let state = merge(&mut store, "v1", accel(100.0, 100.0, 0.0));
        assert_eq!(state.speed_kmh, 150.0);
    }

    #[test]
    fn test_estimator_never_overrides_gps_speed() {
        let mut store = store();
        merge(&mut store, "v1", gps(r#"{"speed":42.0}"#));
        let state = merge(&mut store, "v1", accel(3.0, 4.0, 0.0));
        assert_eq!(state.speed_kmh, 42.0);
        assert_eq!(state.accelerometer, Vector3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn test_estimator_gated_even_after_zero_gps_speed() {
        let mut store = store();
        merge(&mut store, "v1", gps(r#"{"speed":0.0}"#));
        let state = merge(&mut store, "v1", accel(3.0, 4.0, 0.0));
        assert_eq!(state.speed_kmh, 0.0);
    }

    #[test]
    fn test_speed_band_leaves_status_unchanged() {
        let mut store = store();
        merge(&mut store, "v1", gps(r#"{"speed":20.0}"#));
        assert_eq!(store.get("v1").unwrap().status, OperationalStatus::Driving);
        // 3 km/h sits inside (1, 5]: status must not flap back to parked
        let state = merge(&mut store, "v1", gps(r#"{"speed":3.0}"#));
        assert_eq!(state.status, OperationalStatus::Driving);
        let state = merge(&mut store, "v1", gps(r#"{"speed":0.5}"#));
        assert_eq!(state.status, OperationalStatus::Parked);
    }

    #[test]
    fn test_direct_status_override() {
        let mut store = store();
        let state = merge(&mut store, "v1", status("accident"));
        assert_eq!(state.status, OperationalStatus::Accident);
        // Override bypasses the speed re-derivation entirely
        let state = merge(&mut store, "v1", status("driving"));
        assert_eq!(state.status, OperationalStatus::Driving);
        assert_eq!(state.speed_kmh, 0.0);
    }

    #[test]
    fn test_unrecognized_status_override_ignored() {
        let mut store = store();
        merge(&mut store, "v1", status("driving"));
        let state = merge(&mut store, "v1", status("totaled"));
        assert_eq!(state.status, OperationalStatus::Driving);
        assert!(state.last_update.is_some());
    }

    #[test]
    fn test_remerge_is_idempotent() {
        let mut store = store();
        let payload = gyro(40.0, 40.0, 10.0);
        let first = store
            .merge(&TelemetryEvent::new("v1", payload.clone()))
            .unwrap();
        let second = store.merge(&TelemetryEvent::new("v1", payload)).unwrap();

        let mut a = first;
        let mut b = second;
        a.last_update = None;
        b.last_update = None;
        assert_eq!(a, b);
    }

    #[test]
    fn test_register_preseeds_defaults() {
        let mut store = store();
        let state = store.register("vehicle_001");
        assert_eq!(state.status, OperationalStatus::Unknown);
        assert_eq!(store.len(), 1);
        // Registering again must not reset merged state
        merge(&mut store, "vehicle_001", gps(r#"{"speed":42.0}"#));
        let state = store.register("vehicle_001");
        assert_eq!(state.speed_kmh, 42.0);
    }

    #[test]
    fn test_snapshot_sorted_by_id() {
        let mut store = store();
        store.register("b");
        store.register("a");
        store.register("c");
        let ids: Vec<String> = store.snapshot().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
