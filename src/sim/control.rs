//! Gear-mode state machine and command computation
//!
//! Three authorities can drive the vehicle:
//! - `Auto`: steer toward the perceived lane center at cruise throttle
//! - `Park`: everything released, manual input ignored
//! - `Manual`: key deltas accumulate into the command
//!
//! `compute` is pure; `ControlLoop` only owns the mode, the manual
//! accumulator and the last emitted command.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::state::ControlInput;
use crate::error::SimError;
use crate::perception::LaneObservation;
use crate::settings::ControlConfig;

/// Who is in control of the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GearMode {
    #[default]
    Auto,
    Park,
    Manual,
}

impl GearMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GearMode::Auto => "auto",
            GearMode::Park => "park",
            GearMode::Manual => "manual",
        }
    }

    /// Transition table: one select event moves to exactly one state
    pub fn transition(self, event: ModeSelect) -> GearMode {
        use GearMode::*;
        match (self, event) {
            (Auto, ModeSelect::Auto) => Auto,
            (Auto, ModeSelect::Park) => Park,
            (Auto, ModeSelect::Manual) => Manual,
            (Park, ModeSelect::Auto) => Auto,
            (Park, ModeSelect::Park) => Park,
            (Park, ModeSelect::Manual) => Manual,
            (Manual, ModeSelect::Auto) => Auto,
            (Manual, ModeSelect::Park) => Park,
            (Manual, ModeSelect::Manual) => Manual,
        }
    }
}

impl fmt::Display for GearMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for GearMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(GearMode::Auto),
            "park" => Ok(GearMode::Park),
            "manual" => Ok(GearMode::Manual),
            other => Err(SimError::config(format!("unknown gear mode: {other:?}"))),
        }
    }
}

/// Discrete mode-select event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeSelect {
    Auto,
    Park,
    Manual,
}

impl From<GearMode> for ModeSelect {
    fn from(mode: GearMode) -> Self {
        match mode {
            GearMode::Auto => ModeSelect::Auto,
            GearMode::Park => ModeSelect::Park,
            GearMode::Manual => ModeSelect::Manual,
        }
    }
}

/// Continuous key state sampled once per tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState {
    pub throttle_up: bool,
    pub throttle_down: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
}

/// Per-tick manual adjustments
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualDeltas {
    pub throttle: f64,
    pub brake: f64,
    pub steering: f64,
}

impl ManualDeltas {
    /// Map held keys to deltas. Up wins over down, right over left.
    pub fn from_keys(keys: &KeyState, config: &ControlConfig) -> Self {
        let throttle = if keys.throttle_up {
            config.throttle_step
        } else if keys.throttle_down {
            -config.throttle_step
        } else {
            0.0
        };
        let brake = if keys.brake {
            config.brake_step
        } else {
            -config.brake_step
        };
        let steering = if keys.steer_right {
            config.steering_step
        } else if keys.steer_left {
            -config.steering_step
        } else {
            0.0
        };
        Self {
            throttle,
            brake,
            steering,
        }
    }
}

/// Compute the command for one tick.
///
/// `manual` is the accumulated manual command, `previous` the command emitted
/// last tick.
pub fn compute(
    mode: GearMode,
    observation: Option<&LaneObservation>,
    manual: &ControlInput,
    previous: &ControlInput,
    config: &ControlConfig,
    screen_center_x: f64,
) -> ControlInput {
    match mode {
        GearMode::Park => ControlInput::new(0.0, config.park_brake, 0.0),
        GearMode::Manual => *manual,
        GearMode::Auto => {
            let steering = match observation.and_then(|o| o.lane_center) {
                Some(center) => config.steering_gain * (screen_center_x - f64::from(center.x)),
                None => previous.steering_angle(),
            };
            ControlInput::new(config.cruise_throttle, 0.0, steering)
        }
    }
}

/// Owns the gear mode and the manual accumulator
#[derive(Debug, Clone)]
pub struct ControlLoop {
    config: ControlConfig,
    screen_center_x: f64,
    mode: GearMode,
    manual: ControlInput,
    last: ControlInput,
}

impl ControlLoop {
    pub fn new(config: ControlConfig, screen_center_x: f64) -> Self {
        Self {
            config,
            screen_center_x,
            mode: GearMode::Auto,
            manual: ControlInput::IDLE,
            last: ControlInput::IDLE,
        }
    }

    pub fn mode(&self) -> GearMode {
        self.mode
    }

    /// Last command emitted
    pub fn command(&self) -> ControlInput {
        self.last
    }

    pub fn manual(&self) -> ControlInput {
        self.manual
    }

    /// Apply a mode-select event; effective from the next `update`
    pub fn select(&mut self, event: ModeSelect) {
        let next = self.mode.transition(event);
        if next == self.mode {
            return;
        }
        log::info!("Gear mode {} -> {}", self.mode, next);
        if next == GearMode::Manual {
            // take over from whatever was driving
            self.manual = self.last;
        }
        self.mode = next;
    }

    /// Zero the manual accumulator
    pub fn reset_controls(&mut self) {
        self.manual = ControlInput::IDLE;
        if self.mode == GearMode::Manual {
            self.last = ControlInput::IDLE;
        }
    }

    /// Compute this tick's command
    pub fn update(&mut self, observation: Option<&LaneObservation>, keys: &KeyState) -> ControlInput {
        if self.mode == GearMode::Manual {
            let d = ManualDeltas::from_keys(keys, &self.config);
            self.manual = self.manual.adjusted(d.throttle, d.brake, d.steering);
        }
        let command = compute(
            self.mode,
            observation,
            &self.manual,
            &self.last,
            &self.config,
            self.screen_center_x,
        );
        self.last = command;
        command
    }
}
