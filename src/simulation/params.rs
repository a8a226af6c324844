//! Physical constants and per-run numerical parameters
//!
//! Units: solar masses, AU and years, so `G = 4π²`.
//! `RunParams` holds what one integration run needs:
//! - end time and (initial or fixed) step size,
//! - whether the step size is held constant,
//! - whether plotting output is thinned.

use std::f64::consts::PI;

pub const G: f64 = 4.0 * PI * PI; // gravitational constant
pub const R_DISTANCE: f64 = 5.2; // Sun-Jupiter separation
pub const PRIMARY_MASS: f64 = 1.0;

pub const ABS_TOLERANCE: f64 = 1e-12; // adaptive stepper, per state component
pub const REL_TOLERANCE: f64 = 0.0;

/// Recorded samples per run when output is restricted
pub const OUTPUT_DIVISIONS: f64 = 10_000.0;
/// Width of the window after each division in which samples are kept
pub const OUTPUT_WINDOW: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParams {
    pub t_final: f64, // time end (years)
    pub h0: f64, // step size
    pub constant_step_size: bool, // fixed-step rk4 instead of adaptive rkf45
    pub restrict_data_output: bool, // thin recorded samples
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            t_final: 1000.0,
            h0: 1e-3,
            constant_step_size: false,
            restrict_data_output: true,
        }
    }
}

/// Angular velocity of the frame co-rotating with the pair
pub fn rotation_rate(total_mass: f64) -> f64 {
    (G * total_mass / R_DISTANCE.powi(3)).sqrt()
}
