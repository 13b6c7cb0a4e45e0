//! Simulation configuration

use orbital_mechanics::OrbitIntent;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::engine::Timeline;
use crate::{Result, SimError};

pub const DEFAULT_RELAY_FOV_DEG: f64 = 10.0;
pub const DEFAULT_BEACON_FOV_DEG: f64 = 120.0;
pub const DEFAULT_DURATION_HOURS: f64 = 24.0;
pub const DEFAULT_TIME_STEP_SECONDS: f64 = 60.0;

/// Upper bound on timeline instants per run (a week at one-second steps)
pub const MAX_TIMELINE_STEPS: usize = 7 * 24 * 3600 + 1;

/// Which antenna geometry must agree before a relay counts as connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkMode {
    /// Beacon inside the relay's nadir cone
    #[default]
    OneWay,
    /// One-way, and the relay inside one of the Beacon's horizon cones
    Bidirectional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub beacon_intent: OrbitIntent,
    /// Full cone angle of each relay's nadir antenna
    #[serde(default = "default_relay_fov")]
    pub relay_fov_deg: f64,
    /// Full cone angle of each Beacon horizon antenna (bidirectional mode)
    #[serde(default = "default_beacon_fov")]
    pub beacon_fov_deg: f64,
    #[serde(default = "default_duration")]
    pub duration_hours: f64,
    #[serde(default = "default_step")]
    pub time_step_seconds: f64,
    #[serde(default)]
    pub link_mode: LinkMode,
}

fn default_relay_fov() -> f64 {
    DEFAULT_RELAY_FOV_DEG
}

fn default_beacon_fov() -> f64 {
    DEFAULT_BEACON_FOV_DEG
}

fn default_duration() -> f64 {
    DEFAULT_DURATION_HOURS
}

fn default_step() -> f64 {
    DEFAULT_TIME_STEP_SECONDS
}

impl SimulationConfig {
    pub fn new(beacon_intent: OrbitIntent) -> Self {
        Self {
            beacon_intent,
            relay_fov_deg: DEFAULT_RELAY_FOV_DEG,
            beacon_fov_deg: DEFAULT_BEACON_FOV_DEG,
            duration_hours: DEFAULT_DURATION_HOURS,
            time_step_seconds: DEFAULT_TIME_STEP_SECONDS,
            link_mode: LinkMode::OneWay,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading simulation config from {:?}", path);

        let file = File::open(path)?;
        let config: SimulationConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.beacon_intent.validate()?;

        for (name, fov) in [
            ("relayFovDeg", self.relay_fov_deg),
            ("beaconFovDeg", self.beacon_fov_deg),
        ] {
            if !(fov > 0.0 && fov <= 180.0) {
                return Err(SimError::InvalidConfig(format!(
                    "{} must be in (0, 180], got {}",
                    name, fov
                )));
            }
        }
        if !(self.duration_hours.is_finite() && self.duration_hours > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "durationHours must be > 0, got {}",
                self.duration_hours
            )));
        }
        // Steps are resolved to whole milliseconds
        if !(self.time_step_seconds.is_finite() && self.time_step_seconds >= 0.001) {
            return Err(SimError::InvalidConfig(format!(
                "timeStepSeconds must be >= 0.001, got {}",
                self.time_step_seconds
            )));
        }
        if self.time_step_seconds > self.duration_hours * 3600.0 {
            return Err(SimError::InvalidConfig(format!(
                "timeStepSeconds {} exceeds the {} h window",
                self.time_step_seconds, self.duration_hours
            )));
        }
        let steps = Timeline::step_count_for(self.duration_hours, self.time_step_seconds);
        if steps > MAX_TIMELINE_STEPS {
            return Err(SimError::InvalidConfig(format!(
                "{} h at {} s steps is {} steps, more than the {} allowed",
                self.duration_hours, self.time_step_seconds, steps, MAX_TIMELINE_STEPS
            )));
        }

        Ok(())
    }
}
