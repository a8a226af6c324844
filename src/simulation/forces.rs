//! Equations of motion for the stepper
//!
//! Defines the `DerivativeFunction` capability the stepper is generic over
//! and the restricted three-body dynamics in the rotating frame. Each call
//! returns the derivatives together with the specific potential energy at
//! the evaluated state.

use nalgebra::SVector;

use super::params::G;
use super::states::{BodyPair, NVec2, NVec4};

/// Result of one derivative evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivative<const N: usize> {
    pub dydt: SVector<f64, N>,
    pub potential_energy: f64, // per unit mass, at the evaluated state
}

/// Right-hand side `dy/dt = f(t, y)` of a first-order system
pub trait DerivativeFunction<const N: usize> {
    fn derivatives(&self, t: f64, y: &SVector<f64, N>) -> Derivative<N>;
}

/// Restricted three-body problem in the frame rotating at `omega`
///
/// State is `(x, y, vx, vy)`. The primaries are fixed in this frame.
/// No softening: the caller keeps the asteroid away from the bodies.
#[derive(Debug, Clone, Copy)]
pub struct RestrictedThreeBody {
    pub bodies: BodyPair,
    pub omega: f64, // rotation rate of the frame
}

impl RestrictedThreeBody {
    pub fn new(bodies: BodyPair, omega: f64) -> Self {
        Self { bodies, omega }
    }

    /// Gravitational acceleration and potential energy per unit mass at `pos`
    pub fn gravity(&self, pos: NVec2) -> (NVec2, f64) {
        let mut acc = NVec2::zeros();
        let mut u = 0.0;

        for b in [&self.bodies.first, &self.bodies.second] {
            let r = pos - b.x;
            let r2 = r.norm_squared();
            let inv_r = r2.sqrt().recip();

            acc -= G * b.m * inv_r * inv_r * inv_r * r;
            u -= G * b.m * inv_r;
        }

        (acc, u)
    }
}

impl DerivativeFunction<4> for RestrictedThreeBody {
    fn derivatives(&self, _t: f64, y: &NVec4) -> Derivative<4> {
        let (f, u) = self.gravity(NVec2::new(y[0], y[1]));
        let w = self.omega;
        let w2 = w * w;

        // gravity + Coriolis + centrifugal
        let dydt = NVec4::new(
            y[2],
            y[3],
            f.x + 2.0 * w * y[3] + w2 * y[0],
            f.y - 2.0 * w * y[2] + w2 * y[1],
        );

        Derivative { dydt, potential_energy: u }
    }
}

/// Hamiltonian per unit mass in the rotating frame (Jacobi-type constant)
pub fn hamiltonian(state: &NVec4, omega: f64, potential_energy: f64) -> f64 {
    let r2 = state[0] * state[0] + state[1] * state[1];
    let v2 = state[2] * state[2] + state[3] * state[3];

    -0.5 * omega * omega * r2 + 0.5 * v2 + potential_energy
}
