//! Simulation configuration
//!
//! Everything tunable lives here and is passed into components at
//! construction. Persisted as JSON; missing fields fall back to defaults.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{SimError, SimResult};
use crate::sim::road::RoadType;
use crate::sim::state::VehicleState;

/// Fixed-step integration method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepMethod {
    /// Heun's method (two derivative evaluations)
    Heun,
    /// Classical 4th order Runge-Kutta
    #[default]
    Rk4,
}

impl StepMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepMethod::Heun => "heun",
            StepMethod::Rk4 => "rk4",
        }
    }

}

impl FromStr for StepMethod {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heun" | "rk2" => Ok(StepMethod::Heun),
            "rk4" => Ok(StepMethod::Rk4),
            other => Err(SimError::config(format!("unknown integrator '{other}' (heun, rk4)"))),
        }
    }
}

/// Immutable vehicle description shared by dynamics models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParameters {
    /// kg
    pub mass: f64,
    pub drag_coefficient: f64,
    /// m²
    pub frontal_area: f64,
    /// m
    pub tire_radius: f64,
    /// N/rad
    pub cornering_stiffness: f64,
    /// m
    pub wheelbase: f64,
    /// Traction control ceiling (m/s²)
    pub max_acceleration: f64,
    /// N at brake = 1
    pub max_brake_force: f64,
    /// N·m at throttle = 1
    pub max_torque: f64,
}

impl Default for VehicleParameters {
    fn default() -> Self {
        Self {
            mass: 1500.0,
            drag_coefficient: 0.3,
            frontal_area: 2.2,
            tire_radius: 0.3,
            cornering_stiffness: 10_000.0,
            wheelbase: 2.7,
            max_acceleration: 5.0,
            max_brake_force: 5000.0,
            max_torque: 320.0,
        }
    }
}

impl VehicleParameters {
    pub fn validate(&self) -> SimResult<()> {
        let positive = [
            ("mass", self.mass),
            ("tire_radius", self.tire_radius),
            ("wheelbase", self.wheelbase),
            ("max_acceleration", self.max_acceleration),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::config(format!("vehicle.{name} must be > 0, got {value}")));
            }
        }
        let non_negative = [
            ("drag_coefficient", self.drag_coefficient),
            ("frontal_area", self.frontal_area),
            ("cornering_stiffness", self.cornering_stiffness),
            ("max_brake_force", self.max_brake_force),
            ("max_torque", self.max_torque),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimError::config(format!("vehicle.{name} must be >= 0, got {value}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub method: StepMethod,
    /// Largest sub-step (s); longer Δt is subdivided
    pub max_substep: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            method: StepMethod::Rk4,
            max_substep: 0.02,
        }
    }
}

/// Region of interest, relative to the frame size.
///
/// Edges may lie outside the frame; the mask is clipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    /// Left edge in pixels (negative extends past the frame)
    pub left: i32,
    /// Right edge = width + right_extend
    pub right_extend: i32,
    /// Top edge = height / 2 + top_offset
    pub top_offset: i32,
    /// Bottom edge = 2 * height / 3 + bottom_offset
    pub bottom_offset: i32,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            left: -50,
            right_extend: 150,
            top_offset: -30,
            bottom_offset: -20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    /// Accumulator votes needed to accept a line
    pub vote_threshold: u32,
    /// Weaker lines within this many px / degrees of a stronger one are dropped
    pub suppression_radius: u32,
    /// Shortest kept segment, measured along x or y (px)
    pub min_line_length: u32,
    /// Largest bridged gap along a line (px)
    pub max_line_gap: u32,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            vote_threshold: 100,
            suppression_radius: 8,
            min_line_length: 95,
            max_line_gap: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Contrast gain applied to the grayscale frame
    pub contrast: f32,
    /// Gaussian blur ahead of Canny (px)
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub roi: RoiConfig,
    pub hough: HoughConfig,
    /// Segments longer than this are solid markings
    pub solid_line_threshold: f32,
    /// Run perception every N physics ticks in synchronous mode
    pub cadence_ticks: u32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            contrast: 1.5,
            blur_sigma: 1.1,
            canny_low: 255.0,
            canny_high: 255.0,
            roi: RoiConfig::default(),
            hough: HoughConfig::default(),
            solid_line_threshold: 200.0,
            cadence_ticks: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Steering per pixel of lateral error (rad/px)
    pub steering_gain: f64,
    /// Throttle held in AUTO
    pub cruise_throttle: f64,
    /// Brake applied in PARK
    pub park_brake: f64,
    /// Manual throttle change per tick with a key held
    pub throttle_step: f64,
    /// Manual brake change per tick
    pub brake_step: f64,
    /// Manual steering change per tick (rad)
    pub steering_step: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            steering_gain: 0.05,
            cruise_throttle: 1.0,
            park_brake: 0.0,
            throttle_step: 50.0 / 320.0,
            brake_step: 0.1,
            steering_step: 10f64.to_radians(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Length of each road-type stretch
    pub segment_length: f64,
    /// Repeating order of road types
    pub sequence: Vec<RoadType>,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            segment_length: 100.0,
            sequence: RoadType::ALL.to_vec(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub vehicle: VehicleParameters,
    pub integrator: IntegratorConfig,
    pub perception: PerceptionConfig,
    pub control: ControlConfig,
    pub road: RoadConfig,
    pub initial_state: VehicleState,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            vehicle: VehicleParameters::default(),
            integrator: IntegratorConfig::default(),
            perception: PerceptionConfig::default(),
            control: ControlConfig::default(),
            road: RoadConfig::default(),
            initial_state: VehicleState::default(),
        }
    }
}

impl SimConfig {
    /// Horizontal screen center used as the lane-keeping reference
    pub fn screen_center_x(&self) -> f64 {
        f64::from(self.screen_width) / 2.0
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(SimError::config("screen size must be non-zero"));
        }
        self.vehicle.validate()?;
        let sub = self.integrator.max_substep;
        if !(sub.is_finite() && sub > 0.0) {
            return Err(SimError::config(format!("integrator.max_substep must be > 0, got {sub}")));
        }
        let road = &self.road;
        if !(road.segment_length.is_finite() && road.segment_length > 0.0) {
            return Err(SimError::config("road.segment_length must be > 0"));
        }
        if road.sequence.is_empty() {
            return Err(SimError::config("road.sequence must not be empty"));
        }
        let perception = &self.perception;
        if !(perception.blur_sigma.is_finite() && perception.blur_sigma > 0.0) {
            return Err(SimError::config("perception.blur_sigma must be > 0"));
        }
        if !(perception.canny_low <= perception.canny_high) {
            return Err(SimError::config("perception.canny_low must not exceed canny_high"));
        }
        if perception.hough.vote_threshold == 0 {
            return Err(SimError::config("perception.hough.vote_threshold must be >= 1"));
        }
        if perception.cadence_ticks == 0 {
            return Err(SimError::config("perception.cadence_ticks must be >= 1"));
        }
        if !self.initial_state.is_finite() {
            return Err(SimError::config("initial_state must be finite"));
        }
        // no reverse gear
        if self.initial_state.velocity < 0.0 {
            return Err(SimError::config(format!(
                "initial_state.velocity must be >= 0, got {}",
                self.initial_state.velocity
            )));
        }
        Ok(())
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&json)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Config saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{ "vehicle": { "mass": 900.0 }, "integrator": { "method": "heun" } }"#)
                .unwrap();
        assert_eq!(config.vehicle.mass, 900.0);
        assert_eq!(config.vehicle.wheelbase, 2.7);
        assert_eq!(config.integrator.method, StepMethod::Heun);
        assert_eq!(config.screen_width, SCREEN_WIDTH);
    }

    #[test]
    fn test_rejects_non_physical_mass() {
        let mut config = SimConfig::default();
        config.vehicle.mass = 0.0;
        assert!(matches!(config.validate(), Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_rejects_empty_road_sequence() {
        let mut config = SimConfig::default();
        config.road.sequence.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_method_names() {
        assert_eq!("RK4".parse::<StepMethod>().unwrap(), StepMethod::Rk4);
        assert_eq!("rk2".parse::<StepMethod>().unwrap(), StepMethod::Heun);
        assert!(matches!("euler".parse::<StepMethod>(), Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_rejects_negative_initial_velocity() {
        let mut config = SimConfig::default();
        config.initial_state.velocity = -1.0;
        assert!(matches!(config.validate(), Err(SimError::Configuration(_))));
        config.initial_state.velocity = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_edge_settings() {
        let mut config = SimConfig::default();
        config.perception.blur_sigma = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.perception.canny_low = 300.0;
        config.perception.canny_high = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("lanekeep_cfg_{}.json", std::process::id()));
        let mut config = SimConfig::default();
        config.control.cruise_throttle = 0.4;
        config.save(&path).unwrap();
        let loaded = SimConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.control.cruise_throttle, 0.4);
        assert_eq!(loaded.vehicle, config.vehicle);
        assert_eq!(loaded.road, config.road);
    }
}
