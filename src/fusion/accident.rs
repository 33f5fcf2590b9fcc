//! Hysteresis-based accident detection from gyroscope magnitude.

use tracing::{info, warn};

use crate::config::FusionConfig;
use crate::model::OperationalStatus;

/// Per-vehicle accident/normal classification with asymmetric thresholds.
///
/// A single violent spike must flag the vehicle immediately, but clearing the
/// flag requires readings well below the enter threshold. Magnitudes between
/// the two thresholds never cause a transition in either direction, so the
/// status cannot flap near the boundary.
#[derive(Debug, Clone)]
pub struct AccidentDetector {
    enter_threshold: f64,
    exit_threshold: f64,
    driving_min_kmh: f64,
}

impl AccidentDetector {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            enter_threshold: config.accident_enter_threshold,
            exit_threshold: config.accident_exit_threshold,
            driving_min_kmh: config.driving_min_kmh,
        }
    }

    /// Assess a fresh gyroscope magnitude against the current status.
    ///
    /// Returns `Some(new_status)` on a transition, `None` when the status
    /// holds. Recovery classifies to driving iff the vehicle is currently
    /// moving faster than the driving threshold, else parked.
    pub fn assess(
        &self,
        current: OperationalStatus,
        magnitude: f64,
        speed_kmh: f64,
    ) -> Option<OperationalStatus> {
        if current != OperationalStatus::Accident {
            if magnitude > self.enter_threshold {
                warn!(magnitude, "gyroscope spike: flagging accident");
                return Some(OperationalStatus::Accident);
            }
            return None;
        }

        if magnitude < self.exit_threshold {
            let recovered = if speed_kmh > self.driving_min_kmh {
                OperationalStatus::Driving
            } else {
                OperationalStatus::Parked
            };
            info!(magnitude, status = %recovered, "gyroscope calm: clearing accident");
            return Some(recovered);
        }

        None
    }
}
