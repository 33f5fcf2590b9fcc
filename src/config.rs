//! Monitor configuration with tunable thresholds.

use std::time::Duration;

/// Tunables for the fusion engine: accident hysteresis, speed-derived status
/// bands, and the fallback speed estimator.
///
/// Thresholds are configuration rather than constants so they can be
/// calibrated per tracker hardware.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Gyroscope magnitude above which a vehicle is flagged as an accident
    /// (default: 50.0)
    pub accident_enter_threshold: f64,
    /// Gyroscope magnitude below which an accident clears. Intentionally much
    /// lower than the enter threshold so a real incident is not cleared by a
    /// single calm reading (default: 10.0)
    pub accident_exit_threshold: f64,
    /// Speed above which a vehicle counts as driving (default: 5.0 km/h)
    pub driving_min_kmh: f64,
    /// Speed at or below which a vehicle counts as parked (default: 1.0 km/h).
    /// The band between this and `driving_min_kmh` leaves the status unchanged.
    pub parked_max_kmh: f64,
    /// Multiplier from planar acceleration magnitude to estimated km/h
    /// (default: 5.0)
    pub speed_scale_factor: f64,
    /// Hard cap on any speed value, reported or estimated (default: 150.0 km/h)
    pub max_speed_kmh: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            accident_enter_threshold: 50.0,
            accident_exit_threshold: 10.0,
            driving_min_kmh: 5.0,
            parked_max_kmh: 1.0,
            speed_scale_factor: 5.0,
            max_speed_kmh: 150.0,
        }
    }
}

/// Configuration for a [`MonitorClient`](crate::client::MonitorClient).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Prefix for the randomized MQTT client id (default: "vehicle_monitor")
    pub client_id_prefix: String,
    /// First segment of the telemetry topics, `{prefix}/{id}/{channel}`
    /// (default: "vehicles")
    pub topic_prefix: String,
    /// MQTT keep-alive interval (default: 30s)
    pub keep_alive: Duration,
    /// How long a connection attempt may take before it is retried
    /// (default: 4s)
    pub connect_timeout: Duration,
    /// Pause between reconnect attempts after a transport error (default: 1s)
    pub reconnect_period: Duration,
    /// Capacity of the decoded-event channel between the transport and the
    /// merge task (default: 100)
    pub channel_capacity: usize,
    /// Refresh interval for the polled connectivity flag (default: 1s)
    pub connectivity_poll_interval: Duration,
    /// Fusion engine tunables.
    pub fusion: FusionConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            client_id_prefix: "vehicle_monitor".to_string(),
            topic_prefix: "vehicles".to_string(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(4),
            reconnect_period: Duration::from_secs(1),
            channel_capacity: 100,
            connectivity_poll_interval: Duration::from_secs(1),
            fusion: FusionConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Create a new config builder.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }
}

/// Builder pattern for MonitorConfig.
#[derive(Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Set the prefix used for the randomized client id.
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.client_id_prefix = prefix.into();
        self
    }

    /// Set the first segment of the telemetry topic family.
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.topic_prefix = prefix.into();
        self
    }

    /// Set the MQTT keep-alive interval.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the pause between reconnect attempts.
    pub fn reconnect_period(mut self, period: Duration) -> Self {
        self.config.reconnect_period = period;
        self
    }

    /// Set the decoded-event channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the connectivity poll interval.
    pub fn connectivity_poll_interval(mut self, interval: Duration) -> Self {
        self.config.connectivity_poll_interval = interval;
        self
    }

    /// Set the accident enter/exit gyroscope thresholds.
    pub fn accident_thresholds(mut self, enter: f64, exit: f64) -> Self {
        self.config.fusion.accident_enter_threshold = enter;
        self.config.fusion.accident_exit_threshold = exit;
        self
    }

    /// Set the scale factor for the accelerometer speed estimator.
    pub fn speed_scale_factor(mut self, scale: f64) -> Self {
        self.config.fusion.speed_scale_factor = scale;
        self
    }

    /// Set the hard speed cap in km/h.
    pub fn max_speed_kmh(mut self, cap: f64) -> Self {
        self.config.fusion.max_speed_kmh = cap;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MonitorConfig {
        self.config
    }
}
