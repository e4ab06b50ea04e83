//! Deterministic simulation module
//!
//! Vehicle physics and the control loop. This module must stay deterministic:
//! - Δt comes from the caller, never from a wall clock
//! - The same inputs produce bit-identical states
//! - No rendering or threading; perception results are pushed in

pub mod control;
pub mod dynamics;
pub mod integrator;
pub mod road;
pub mod state;
pub mod tick;

pub use control::{ControlLoop, GearMode, KeyState, ModeSelect};
pub use dynamics::VehicleDynamicsModel;
pub use integrator::{Heun, Integrator, Rk4, StepStrategy};
pub use road::{RoadProperties, RoadSurfaceModel, RoadType};
pub use state::{ControlInput, STATE_DIM, VehicleState};
pub use tick::{SimSnapshot, Simulation, Telemetry, TelemetrySample, TickInput};
