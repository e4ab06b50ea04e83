//! Single-track vehicle dynamics
//!
//! State derivative for the five-component `VehicleState`:
//!
//! ```text
//! dx/dt   = v cos(theta)
//! dv/dt   = (F_engine - F_drag - F_rolling - F_brake) / m
//! dy/dt   = v sin(theta)
//! dv_y/dt = -C_alpha (atan2(v_y, v) + delta) / m
//! dth/dt  = v sin(delta) / L
//! ```
//!
//! Engine force passes through an analytic traction limiter so that the
//! longitudinal acceleration never exceeds `max_acceleration`.

use std::sync::Arc;

use super::state::{ControlInput, STATE_DIM, VehicleState};
use crate::consts::{AIR_DENSITY, GRAVITY, ROLLING_RESISTANCE};
use crate::settings::VehicleParameters;

#[derive(Debug, Clone)]
pub struct VehicleDynamicsModel {
    params: Arc<VehicleParameters>,
}

impl VehicleDynamicsModel {
    pub fn new(params: Arc<VehicleParameters>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VehicleParameters {
        &self.params
    }

    /// Aerodynamic drag magnitude (N)
    #[inline]
    pub fn drag_force(&self, velocity: f64) -> f64 {
        let p = &self.params;
        0.5 * AIR_DENSITY * p.frontal_area * p.drag_coefficient * velocity * velocity
    }

    /// Rolling resistance magnitude (N)
    #[inline]
    pub fn rolling_force(&self) -> f64 {
        self.params.mass * GRAVITY * ROLLING_RESISTANCE
    }

    /// Engine force requested at the wheels for a throttle position (N)
    #[inline]
    pub fn requested_engine_force(&self, throttle: f64) -> f64 {
        throttle * self.params.max_torque / self.params.tire_radius
    }

    /// Limit engine force so total acceleration stays under the ceiling.
    ///
    /// `baseline_force` is the zero-throttle net force. If the baseline alone
    /// already exceeds the ceiling the request is scaled by
    /// `max_acceleration / baseline_acceleration` first.
    pub fn traction_control(&self, requested: f64, baseline_force: f64) -> f64 {
        let p = &self.params;
        let baseline_acc = baseline_force / p.mass;
        let mut force = requested;
        if baseline_acc > p.max_acceleration {
            force *= p.max_acceleration / baseline_acc;
        }
        let ceiling = (p.mass * p.max_acceleration - baseline_force).max(0.0);
        force.min(ceiling)
    }

    /// Longitudinal acceleration (m/s²).
    ///
    /// There is no reverse gear. While moving forward, drag, rolling
    /// resistance and brake oppose motion; at or below standstill they can
    /// only cancel drive force, never push the vehicle backward.
    pub fn longitudinal_acceleration(&self, velocity: f64, throttle: f64, brake: f64) -> f64 {
        let p = &self.params;
        let resistance = self.drag_force(velocity) + self.rolling_force();
        let brake_force = brake * p.max_brake_force;
        let requested = self.requested_engine_force(throttle);

        let baseline = -resistance;
        let engine = self.traction_control(requested, baseline);
        let net = engine + baseline - brake_force;
        if velocity <= 0.0 {
            return net.max(0.0) / p.mass;
        }
        net / p.mass
    }

    /// Linear tire model (m/s²)
    #[inline]
    pub fn lateral_acceleration(&self, _lateral_velocity: f64, slip_angle: f64) -> f64 {
        -self.params.cornering_stiffness * slip_angle / self.params.mass
    }

    /// Time derivative of the state vector under a fixed control input
    pub fn state_derivative(&self, state: &VehicleState, _t: f64, control: &ControlInput) -> [f64; STATE_DIM] {
        let v = state.velocity;
        let theta = state.orientation;
        let steering = control.steering_angle();

        let slip_angle = state.lateral_velocity.atan2(v);
        let dv = self.longitudinal_acceleration(v, control.throttle(), control.brake());
        let dv_y = self.lateral_acceleration(state.lateral_velocity, slip_angle + steering);

        [
            v * theta.cos(),
            dv,
            v * theta.sin(),
            dv_y,
            v * steering.sin() / self.params.wheelbase,
        ]
    }
}
