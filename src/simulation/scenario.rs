//! Build a fully-initialized run from immutable inputs
//!
//! A `Scenario` bundles everything one integration needs:
//! - the body pair placed in the rotating frame (`BodyPair`)
//! - the equations of motion at the matching rotation rate (`RestrictedThreeBody`)
//! - the asteroid start derived from a Lagrange point and deviation (`InitialConditions`)
//! - numerical parameters (`RunParams`)
//!
//! Sweep drivers build a fresh scenario per iteration instead of mutating a
//! shared one.

use super::forces::RestrictedThreeBody;
use super::integrator::Stepper;
use super::params::{rotation_rate, RunParams, ABS_TOLERANCE, PRIMARY_MASS, REL_TOLERANCE};
use super::states::{BodyPair, Deviation, InitialConditions, LagrangePoint};

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub bodies: BodyPair,
    pub system: RestrictedThreeBody,
    pub initial: InitialConditions,
    pub deviation: Deviation,
    pub params: RunParams,
}

impl Scenario {
    pub fn build(
        secondary_mass: f64,
        point: LagrangePoint,
        deviation: Deviation,
        params: RunParams,
    ) -> Self {
        Self::build_with_primary(PRIMARY_MASS, secondary_mass, point, deviation, params)
    }

    pub fn build_with_primary(
        primary_mass: f64,
        secondary_mass: f64,
        point: LagrangePoint,
        deviation: Deviation,
        params: RunParams,
    ) -> Self {
        let bodies = BodyPair::new(primary_mass, secondary_mass);
        let system = RestrictedThreeBody::new(bodies, rotation_rate(bodies.total_mass()));
        let initial = InitialConditions::new(&bodies, point, &deviation);

        Self {
            bodies,
            system,
            initial,
            deviation,
            params,
        }
    }

    /// Same run about the other Lagrange point
    pub fn mirrored(&self) -> Self {
        Self::build_with_primary(
            self.bodies.first.m,
            self.bodies.second.m,
            self.initial.point.other(),
            self.deviation,
            self.params,
        )
    }

    /// Stepper configured for this run
    pub fn stepper(&self) -> Stepper<4> {
        if self.params.constant_step_size {
            Stepper::fixed(self.params.h0)
        } else {
            Stepper::adaptive(self.params.h0, ABS_TOLERANCE, REL_TOLERANCE)
        }
    }

    /// Radial wander per unit angular wander, scaled by the Lagrange-point
    /// distance. Absent when it cannot be formed.
    pub fn libration_ratio(&self, angular_wander: f64, radial_wander: f64) -> Option<f64> {
        let ratio = radial_wander / (angular_wander * self.initial.lagrange_point().norm());
        (angular_wander != 0.0 && ratio.is_finite()).then_some(ratio)
    }

    /// Log the full setup of the run at debug level
    pub fn dump(&self) {
        log::debug!(
            "first body: m = {} x = ({}, {}); second body: m = {} x = ({}, {})",
            self.bodies.first.m,
            self.bodies.first.x.x,
            self.bodies.first.x.y,
            self.bodies.second.m,
            self.bodies.second.x.x,
            self.bodies.second.x.y
        );
        log::debug!(
            "initial position ({}, {}), speed ({}, {}), L4 ({}, {}), L5 ({}, {})",
            self.initial.position.x,
            self.initial.position.y,
            self.initial.speed.x,
            self.initial.speed.y,
            self.initial.l4.x,
            self.initial.l4.y,
            self.initial.l5.x,
            self.initial.l5.y
        );
        log::debug!(
            "deviation {:?}, t_final {}, step size {}",
            self.deviation,
            self.params.t_final,
            self.params.h0
        );
    }
}
