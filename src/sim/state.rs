//! Vehicle state and control command types
//!
//! `VehicleState` is only ever replaced by the integrator; `ControlInput`
//! clamps at construction so downstream consumers never re-check ranges.

use serde::{Deserialize, Serialize};

use crate::clamp_or;
use crate::consts::MAX_STEERING_ANGLE;

/// Number of state components
pub const STATE_DIM: usize = 5;

/// Component names in state-vector order
pub const STATE_NAMES: [&str; STATE_DIM] = [
    "position",
    "velocity",
    "lateral_position",
    "lateral_velocity",
    "orientation",
];

/// Kinematic state of the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleState {
    /// Longitudinal position (m)
    pub position: f64,
    /// Longitudinal velocity (m/s)
    pub velocity: f64,
    /// Lateral position (m)
    pub lateral_position: f64,
    /// Lateral velocity (m/s)
    pub lateral_velocity: f64,
    /// Heading (rad, not wrapped)
    pub orientation: f64,
}

impl VehicleState {
    pub fn new(
        position: f64,
        velocity: f64,
        lateral_position: f64,
        lateral_velocity: f64,
        orientation: f64,
    ) -> Self {
        Self {
            position,
            velocity,
            lateral_position,
            lateral_velocity,
            orientation,
        }
    }

    #[inline]
    pub fn to_array(&self) -> [f64; STATE_DIM] {
        [
            self.position,
            self.velocity,
            self.lateral_position,
            self.lateral_velocity,
            self.orientation,
        ]
    }

    #[inline]
    pub fn from_array(v: [f64; STATE_DIM]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4])
    }

    /// First non-finite component, if any
    pub fn non_finite_component(&self) -> Option<(&'static str, f64)> {
        STATE_NAMES
            .iter()
            .zip(self.to_array())
            .find(|(_, v)| !v.is_finite())
            .map(|(name, v)| (*name, v))
    }

    pub fn is_finite(&self) -> bool {
        self.non_finite_component().is_none()
    }
}

/// Throttle/brake/steering command.
///
/// Fields are private: every constructor and `with_*` update clamps, so a
/// `ControlInput` value is always in range. Deserialization goes through
/// `new` as well.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "ControlInputFields")]
pub struct ControlInput {
    throttle: f64,
    brake: f64,
    steering_angle: f64,
}

/// Unchecked wire form of `ControlInput`
#[derive(Deserialize, Default)]
#[serde(default)]
struct ControlInputFields {
    throttle: f64,
    brake: f64,
    steering_angle: f64,
}

impl From<ControlInputFields> for ControlInput {
    fn from(raw: ControlInputFields) -> Self {
        ControlInput::new(raw.throttle, raw.brake, raw.steering_angle)
    }
}

impl ControlInput {
    /// All zero: no throttle, no brake, wheels straight
    pub const IDLE: ControlInput = ControlInput {
        throttle: 0.0,
        brake: 0.0,
        steering_angle: 0.0,
    };

    pub fn new(throttle: f64, brake: f64, steering_angle: f64) -> Self {
        Self::IDLE
            .with_throttle(throttle)
            .with_brake(brake)
            .with_steering(steering_angle)
    }

    #[inline]
    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    #[inline]
    pub fn brake(&self) -> f64 {
        self.brake
    }

    #[inline]
    pub fn steering_angle(&self) -> f64 {
        self.steering_angle
    }

    pub fn with_throttle(self, throttle: f64) -> Self {
        Self {
            throttle: clamp_or(throttle, 0.0, 1.0, 0.0),
            ..self
        }
    }

    pub fn with_brake(self, brake: f64) -> Self {
        Self {
            brake: clamp_or(brake, 0.0, 1.0, 0.0),
            ..self
        }
    }

    pub fn with_steering(self, steering_angle: f64) -> Self {
        Self {
            steering_angle: clamp_or(steering_angle, -MAX_STEERING_ANGLE, MAX_STEERING_ANGLE, 0.0),
            ..self
        }
    }

    /// Apply incremental adjustments, clamping each field
    pub fn adjusted(self, d_throttle: f64, d_brake: f64, d_steering: f64) -> Self {
        self.with_throttle(self.throttle + d_throttle)
            .with_brake(self.brake + d_brake)
            .with_steering(self.steering_angle + d_steering)
    }
}
