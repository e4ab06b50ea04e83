//! Fixed timestep simulation tick
//!
//! `Simulation` ties the control loop to the integrator and advances the
//! vehicle one Δt at a time. Perception results are pushed in from outside
//! (synchronously or from the worker) and read as "latest known estimate".

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use super::control::{ControlLoop, GearMode, KeyState, ModeSelect};
use super::dynamics::VehicleDynamicsModel;
use super::integrator::Integrator;
use super::road::{RoadProperties, RoadSurfaceModel};
use super::state::{ControlInput, VehicleState};
use crate::consts::TELEMETRY_LENGTH;
use crate::error::{SimError, SimResult};
use crate::perception::LaneObservation;
use crate::settings::SimConfig;

/// Input commands for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Held keys (only consulted in MANUAL)
    pub keys: KeyState,
    /// Mode-select event, applied before this tick's command
    pub mode_select: Option<ModeSelect>,
    /// Zero the manual accumulator
    pub reset_controls: bool,
}

/// One telemetry point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub time: f64,
    pub position: f64,
    pub velocity: f64,
}

/// Rolling history for graphs, oldest first
#[derive(Debug, Clone)]
pub struct Telemetry {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl Telemetry {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }
}

/// Serializable view of the simulation after a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimSnapshot {
    pub tick: u64,
    pub time: f64,
    pub state: VehicleState,
    pub observation: Option<LaneObservation>,
    pub mode: GearMode,
    pub command: ControlInput,
    pub road: RoadProperties,
}

/// Complete simulation state
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    integrator: Integrator,
    road: RoadSurfaceModel,
    control: ControlLoop,
    state: VehicleState,
    observation: Option<LaneObservation>,
    tick_count: u64,
    time: f64,
    telemetry: Telemetry,
}

impl Simulation {
    /// Build from a config; rejects invalid configs up front
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let model = VehicleDynamicsModel::new(Arc::new(config.vehicle.clone()));
        let integrator = Integrator::new(model, &config.integrator);
        let road = RoadSurfaceModel::new(&config.road);
        let control = ControlLoop::new(config.control.clone(), config.screen_center_x());
        let state = config.initial_state;
        log::info!(
            "Simulation ready: {} integrator, {:.0} kg, start {:?}",
            config.integrator.method.as_str(),
            config.vehicle.mass,
            state
        );
        Ok(Self {
            config,
            integrator,
            road,
            control,
            state,
            observation: None,
            tick_count: 0,
            time: 0.0,
            telemetry: Telemetry::new(TELEMETRY_LENGTH),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn observation(&self) -> Option<&LaneObservation> {
        self.observation.as_ref()
    }

    pub fn mode(&self) -> GearMode {
        self.control.mode()
    }

    /// Command applied during the last tick
    pub fn command(&self) -> ControlInput {
        self.control.command()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn road(&self) -> &RoadSurfaceModel {
        &self.road
    }

    /// Surface under the vehicle
    pub fn road_properties(&self) -> RoadProperties {
        self.road.properties_at(self.state.position)
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            tick: self.tick_count,
            time: self.time,
            state: self.state,
            observation: self.observation.clone(),
            mode: self.mode(),
            command: self.command(),
            road: self.road_properties(),
        }
    }

    /// Replace the lane estimate
    pub fn publish_observation(&mut self, observation: LaneObservation) {
        self.observation = Some(observation);
    }

    /// Accept a perception outcome. A rejected frame keeps the previous
    /// estimate; any other error is passed back.
    pub fn apply_perception(&mut self, result: SimResult<LaneObservation>) -> SimResult<()> {
        match result {
            Ok(observation) => {
                self.publish_observation(observation);
                Ok(())
            }
            Err(SimError::InvalidFrame(reason)) => {
                log::warn!("Frame rejected, keeping previous lane estimate: {reason}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a synchronous caller should run perception before this tick
    pub fn should_perceive(&self) -> bool {
        self.tick_count % u64::from(self.config.perception.cadence_ticks) == 0
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// The full Δt is integrated, sub-stepped by the integrator. Negative or
    /// non-finite Δt is a configuration error. Frame pacing is the caller's
    /// concern (see `Runner::update`).
    pub fn tick(&mut self, input: &TickInput, dt: f64) -> SimResult<&VehicleState> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::config(format!("clock supplied invalid dt: {dt}")));
        }

        if let Some(event) = input.mode_select {
            self.control.select(event);
        }
        if input.reset_controls {
            self.control.reset_controls();
        }

        let command = self.control.update(self.observation.as_ref(), &input.keys);
        self.state = self.integrator.advance_from(self.time, &self.state, dt, &command)?;
        self.time += dt;
        self.tick_count += 1;

        self.telemetry.push(TelemetrySample {
            time: self.time,
            position: self.state.position,
            velocity: self.state.velocity,
        });
        Ok(&self.state)
    }
}
