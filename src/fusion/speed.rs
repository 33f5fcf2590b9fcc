//! Fallback speed estimation from accelerometer readings.

use crate::config::FusionConfig;
use crate::model::Vector3;

/// Estimate speed in km/h from planar acceleration magnitude.
///
/// Deliberately coarse: it exists to produce a non-zero, order-of-magnitude
/// speed signal when GPS is unavailable, not a calibrated speedometer. The
/// vertical axis is excluded as gravity-dominated.
pub fn estimate_speed_kmh(accelerometer: &Vector3, config: &FusionConfig) -> f64 {
    (accelerometer.planar_magnitude() * config.speed_scale_factor).min(config.max_speed_kmh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_estimate() {
        // sqrt(3² + 4²) = 5, scaled by 5 => 25 km/h
        let v = Vector3::new(3.0, 4.0, 0.0);
        assert_eq!(estimate_speed_kmh(&v, &FusionConfig::default()), 25.0);
    }

    #[test]
    fn test_vertical_axis_ignored() {
        let flat = Vector3::new(3.0, 4.0, 0.0);
        let bumpy = Vector3::new(3.0, 4.0, 9.8);
        let config = FusionConfig::default();
        assert_eq!(
            estimate_speed_kmh(&flat, &config),
            estimate_speed_kmh(&bumpy, &config)
        );
    }

    #[test]
    fn test_cap_enforced() {
        // sqrt(100² + 100²) ≈ 141.4, scaled => ≈707, capped at 150
        let v = Vector3::new(100.0, 100.0, 0.0);
        assert_eq!(estimate_speed_kmh(&v, &FusionConfig::default()), 150.0);
    }
}
