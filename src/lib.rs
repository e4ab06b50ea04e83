//! Lanekeep - single-vehicle road simulation with camera lane keeping
//!
//! Core modules:
//! - `sim`: Vehicle dynamics, integration, road surface and the control loop
//! - `perception`: Frame -> edge map -> line segments -> lane estimate
//! - `scene`: Synthetic road frames and overlay annotations
//! - `runner`: Fixed-step frame loop wiring the pieces together
//! - `settings`: Data-driven configuration (JSON)

pub mod error;
pub mod perception;
pub mod runner;
pub mod scene;
pub mod settings;
pub mod sim;

pub use error::{SimError, SimResult};
pub use settings::SimConfig;

/// Physical and screen constants
pub mod consts {
    /// Air density at sea level (kg/m³)
    pub const AIR_DENSITY: f64 = 1.225;
    /// Gravitational acceleration (m/s²)
    pub const GRAVITY: f64 = 9.81;
    /// Rolling resistance coefficient (dimensionless)
    pub const ROLLING_RESISTANCE: f64 = 0.015;

    /// Steering lock, either side (30 degrees)
    pub const MAX_STEERING_ANGLE: f64 = std::f64::consts::PI / 6.0;

    /// Default camera/screen size in pixels
    pub const SCREEN_WIDTH: u32 = 800;
    pub const SCREEN_HEIGHT: u32 = 600;

    /// Physics clock (50 Hz)
    pub const SIM_DT: f64 = 1.0 / 50.0;

    /// Number of telemetry samples kept for graphs
    pub const TELEMETRY_LENGTH: usize = 100;
}

/// Clamp into `[lo, hi]`, mapping NaN to `fallback`
#[inline]
pub fn clamp_or(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}
