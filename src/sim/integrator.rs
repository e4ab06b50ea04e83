//! Fixed-step time integration of the vehicle dynamics
//!
//! The clock may hand us any Δt; anything longer than `max_substep` is split
//! into equal sub-steps so the step strategy always sees small steps.

use super::dynamics::VehicleDynamicsModel;
use super::state::{ControlInput, STATE_DIM, VehicleState};
use crate::error::{SimError, SimResult};
use crate::settings::{IntegratorConfig, StepMethod};

type Vector = [f64; STATE_DIM];

/// One fixed step of an explicit ODE solver
pub trait StepStrategy: Send + Sync {
    /// Advance `y` at time `t` by `h` using derivative `f(t, y)`
    fn step(&self, f: &dyn Fn(f64, &Vector) -> Vector, t: f64, y: &Vector, h: f64) -> Vector;

    fn name(&self) -> &'static str;
}

#[inline]
fn axpy(y: &Vector, k: &Vector, h: f64) -> Vector {
    let mut out = *y;
    for i in 0..STATE_DIM {
        out[i] += h * k[i];
    }
    out
}

/// Heun's method (explicit trapezoid, two evaluations)
#[derive(Debug, Clone, Copy, Default)]
pub struct Heun;

impl StepStrategy for Heun {
    fn step(&self, f: &dyn Fn(f64, &Vector) -> Vector, t: f64, y: &Vector, h: f64) -> Vector {
        let k1 = f(t, y);
        let k2 = f(t + h, &axpy(y, &k1, h));
        let mut out = *y;
        for i in 0..STATE_DIM {
            out[i] += 0.5 * h * (k1[i] + k2[i]);
        }
        out
    }

    fn name(&self) -> &'static str {
        "heun"
    }
}

/// Classical Runge-Kutta, 4th order
#[derive(Debug, Clone, Copy, Default)]
pub struct Rk4;

impl StepStrategy for Rk4 {
    fn step(&self, f: &dyn Fn(f64, &Vector) -> Vector, t: f64, y: &Vector, h: f64) -> Vector {
        let k1 = f(t, y);
        let k2 = f(t + 0.5 * h, &axpy(y, &k1, 0.5 * h));
        let k3 = f(t + 0.5 * h, &axpy(y, &k2, 0.5 * h));
        let k4 = f(t + h, &axpy(y, &k3, h));
        let mut out = *y;
        for i in 0..STATE_DIM {
            out[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        out
    }

    fn name(&self) -> &'static str {
        "rk4"
    }
}

impl StepMethod {
    pub fn strategy(&self) -> Box<dyn StepStrategy> {
        match self {
            StepMethod::Heun => Box::new(Heun),
            StepMethod::Rk4 => Box::new(Rk4),
        }
    }
}

pub struct Integrator {
    model: VehicleDynamicsModel,
    strategy: Box<dyn StepStrategy>,
    max_substep: f64,
}

impl std::fmt::Debug for Integrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrator")
            .field("strategy", &self.strategy.name())
            .field("max_substep", &self.max_substep)
            .finish()
    }
}

impl Integrator {
    pub fn new(model: VehicleDynamicsModel, config: &IntegratorConfig) -> Self {
        Self::with_strategy(model, config.method.strategy(), config.max_substep)
    }

    pub fn with_strategy(model: VehicleDynamicsModel, strategy: Box<dyn StepStrategy>, max_substep: f64) -> Self {
        Self {
            model,
            strategy,
            max_substep,
        }
    }

    pub fn model(&self) -> &VehicleDynamicsModel {
        &self.model
    }

    /// Number of equal sub-steps used for `dt`
    pub fn substeps_for(&self, dt: f64) -> usize {
        if dt <= self.max_substep {
            1
        } else {
            (dt / self.max_substep).ceil() as usize
        }
    }

    /// Advance `state` by `dt` under fixed `control`
    pub fn advance(&self, state: &VehicleState, dt: f64, control: &ControlInput) -> SimResult<VehicleState> {
        self.advance_from(0.0, state, dt, control)
    }

    /// Like `advance`, starting the local clock at `t0` (used in error reports)
    pub fn advance_from(
        &self,
        t0: f64,
        state: &VehicleState,
        dt: f64,
        control: &ControlInput,
    ) -> SimResult<VehicleState> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::config(format!("clock supplied invalid dt: {dt}")));
        }
        if dt == 0.0 {
            return Ok(*state);
        }

        let n = self.substeps_for(dt);
        let h = dt / n as f64;
        let f = |t: f64, y: &Vector| self.model.state_derivative(&VehicleState::from_array(*y), t, control);

        let mut y = state.to_array();
        let mut t = t0;
        for _ in 0..n {
            let mut next = self.strategy.step(&f, t, &y, h);
            // no reverse gear: forward motion stops at zero instead of reversing
            if y[1] >= 0.0 && next[1] < 0.0 {
                next[1] = 0.0;
            }
            t += h;
            let next_state = VehicleState::from_array(next);
            if let Some((component, value)) = next_state.non_finite_component() {
                log::error!("Integration diverged: {component} = {value} at t = {t:.4}s");
                return Err(SimError::IntegrationDiverged {
                    component,
                    value,
                    time: t,
                });
            }
            y = next;
        }
        Ok(VehicleState::from_array(y))
    }
}
