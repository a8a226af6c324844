//! Trajectory integration loop
//!
//! Drives the [`Stepper`] from `t = 0` to `t_final` for one [`Scenario`].
//! After every accepted step the loop:
//! - evaluates the Hamiltonian and tracks its spread,
//! - updates the angular and radial wander about the chosen Lagrange point,
//! - optionally hands a record to the trajectory and energy sinks.
//!
//! A stepper failure aborts the run and is returned as an
//! [`IntegrationFailure`] carrying the number of completed steps.

use std::f64::consts::PI;
use std::io;

use log::{debug, error};

use super::forces::hamiltonian;
use super::integrator::{Stats, Stepper};
use super::params::{R_DISTANCE, OUTPUT_DIVISIONS, OUTPUT_WINDOW};
use super::scenario::Scenario;
use super::states::{NVec2, NVec4};
use crate::error::{IntegrationFailure, Result};

/// Largest slope difference still counted as on the Lagrange-point ray
pub const COLLINEAR_SLOPE: f64 = 1e-4;

/// True when `pos` lies on the line through the origin and `l_point`.
///
/// Compares slopes, so positions too close to the y axis never count.
pub fn position_is_collinear(pos: &NVec2, l_point: &NVec2) -> bool {
    if pos.x.abs() < 1e-8 {
        return false;
    }

    let slope = pos.y / pos.x - l_point.y / l_point.x;
    slope.abs() < COLLINEAR_SLOPE
}

/// Angle of `v` from the x axis in `[0, 2π)`
fn polar_angle(v: &NVec2) -> f64 {
    let angle = v.y.atan2(v.x);
    if angle < 0.0 {
        angle + 2.0 * PI
    } else {
        angle
    }
}

/// Position relative to the Lagrange point at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderSample {
    pub angle: f64, // radians from the Lagrange point, anticlockwise
    pub radius: Option<f64>, // distance from the origin, only when collinear
}

pub fn calc_wander(pos: &NVec2, l_point: &NVec2) -> WanderSample {
    let angle = polar_angle(pos) - polar_angle(l_point);
    let radius = position_is_collinear(pos, l_point).then(|| pos.norm());

    WanderSample { angle, radius }
}

/// Running extremes over one trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderStatistics {
    pub min_angle: f64,
    pub max_angle: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    pub min_hamiltonian: f64,
    pub max_hamiltonian: f64,
}

impl WanderStatistics {
    /// Start with the angular extremes at the initial offset and the radial
    /// extremes at the primary separation
    pub fn new(initial_angle: f64) -> Self {
        Self {
            min_angle: initial_angle,
            max_angle: initial_angle,
            min_radius: R_DISTANCE,
            max_radius: R_DISTANCE,
            min_hamiltonian: f64::INFINITY,
            max_hamiltonian: f64::NEG_INFINITY,
        }
    }

    pub fn observe(&mut self, sample: &WanderSample) {
        self.min_angle = self.min_angle.min(sample.angle);
        self.max_angle = self.max_angle.max(sample.angle);

        if let Some(r) = sample.radius {
            self.min_radius = self.min_radius.min(r);
            self.max_radius = self.max_radius.max(r);
        }
    }

    pub fn observe_hamiltonian(&mut self, h: f64) {
        self.min_hamiltonian = self.min_hamiltonian.min(h);
        self.max_hamiltonian = self.max_hamiltonian.max(h);
    }

    pub fn angular_wander(&self) -> f64 {
        self.max_angle - self.min_angle
    }

    pub fn radial_wander(&self) -> f64 {
        self.max_radius - self.min_radius
    }

    /// Zero until a Hamiltonian has been observed
    pub fn hamiltonian_spread(&self) -> f64 {
        if self.max_hamiltonian < self.min_hamiltonian {
            return 0.0;
        }
        self.max_hamiltonian - self.min_hamiltonian
    }
}

/// One sample of a recorded trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryRecord {
    pub t: f64,
    pub state: NVec4, // rotating frame
    pub hamiltonian: f64,
    pub hamiltonian_spread: f64,
    pub inertial: NVec2,
    pub angle_from_point: f64, // radians
    pub radial_offset: Option<f64>, // (r - |L|) / |L| when collinear
}

/// Hamiltonian drift after one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRecord {
    pub t: f64,
    pub hamiltonian: f64,
    pub hamiltonian_spread: f64,
}

pub trait TrajectorySink {
    fn record(&mut self, rec: &TrajectoryRecord) -> io::Result<()>;
}

pub trait EnergySink {
    fn record(&mut self, rec: &EnergyRecord) -> io::Result<()>;
}

impl TrajectorySink for Vec<TrajectoryRecord> {
    fn record(&mut self, rec: &TrajectoryRecord) -> io::Result<()> {
        self.push(*rec);
        Ok(())
    }
}

impl EnergySink for Vec<EnergyRecord> {
    fn record(&mut self, rec: &EnergyRecord) -> io::Result<()> {
        self.push(*rec);
        Ok(())
    }
}

/// Optional outputs of one run
#[derive(Default)]
pub struct Sinks<'a> {
    pub trajectory: Option<&'a mut dyn TrajectorySink>,
    pub energy: Option<&'a mut dyn EnergySink>,
}

impl<'a> Sinks<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn trajectory(sink: &'a mut dyn TrajectorySink) -> Self {
        Self { trajectory: Some(sink), energy: None }
    }

    pub fn energy(sink: &'a mut dyn EnergySink) -> Self {
        Self { trajectory: None, energy: Some(sink) }
    }
}

/// Reduced metrics of a finished run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub angular_wander: f64, // radians
    pub radial_wander: f64, // AU
    pub hamiltonian_spread: f64,
    pub steps: u64,
    pub stats: Stats,
}

impl RunSummary {
    pub fn angular_wander_degrees(&self) -> f64 {
        self.angular_wander.to_degrees()
    }
}

/// Rotate a rotating-frame position into the inertial frame at time `t`
pub fn to_inertial(pos: &NVec2, omega: f64, t: f64) -> NVec2 {
    let (sin, cos) = (omega * t).sin_cos();
    NVec2::new(pos.x * cos - pos.y * sin, pos.y * cos + pos.x * sin)
}

/// Whether a sample taken at `t_before` is written out
pub fn keep_sample(t_before: f64, t_final: f64, restrict: bool) -> bool {
    !restrict || t_before % (t_final / OUTPUT_DIVISIONS) < OUTPUT_WINDOW
}

/// Integrate one scenario to `t_final` and reduce its wander statistics
pub fn run_trajectory(scenario: &Scenario, sinks: &mut Sinks) -> Result<RunSummary> {
    let params = &scenario.params;
    let system = &scenario.system;
    let omega = system.omega;
    let l_point = scenario.initial.lagrange_point();
    let l_mag = l_point.norm();

    let mut stepper: Stepper<4> = scenario.stepper();
    let mut y = scenario.initial.state();
    let mut t = 0.0;
    let mut steps = 0u64;

    let mut wander = WanderStatistics::new(scenario.deviation.a * scenario.initial.point.sign());

    while t < params.t_final {
        let t_before = t;

        let d = match stepper.step(system, &mut t, &mut y, params.t_final) {
            Ok(d) => d,
            Err(cause) => {
                error!("stepper returned unsuccessfully after {} steps: {}", steps, cause);
                return Err(IntegrationFailure { steps, t, cause }.into());
            }
        };
        steps += 1;

        let h = hamiltonian(&y, omega, d.potential_energy);
        wander.observe_hamiltonian(h);

        let pos = NVec2::new(y[0], y[1]);
        let sample = calc_wander(&pos, &l_point);
        wander.observe(&sample);

        if let Some(r) = sample.radius {
            debug!("radial wander: {}\t{}", t, r - R_DISTANCE);
        }

        if let Some(sink) = sinks.trajectory.as_mut() {
            if keep_sample(t_before, params.t_final, params.restrict_data_output) {
                sink.record(&TrajectoryRecord {
                    t: t_before,
                    state: y,
                    hamiltonian: h,
                    hamiltonian_spread: wander.hamiltonian_spread(),
                    inertial: to_inertial(&pos, omega, t_before),
                    angle_from_point: sample.angle,
                    radial_offset: sample.radius.map(|r| (r - l_mag) / l_mag),
                })?;
            }
        }

        if let Some(sink) = sinks.energy.as_mut() {
            sink.record(&EnergyRecord {
                t: t_before,
                hamiltonian: h,
                hamiltonian_spread: wander.hamiltonian_spread(),
            })?;
        }
    }

    debug!("integration performed in {} time steps ({:?})", steps, stepper.stats);

    Ok(RunSummary {
        angular_wander: wander.angular_wander(),
        radial_wander: wander.radial_wander(),
        hamiltonian_spread: wander.hamiltonian_spread(),
        steps,
        stats: stepper.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn on_the_ray_is_collinear() {
        let l = NVec2::new(2.6, 4.5);
        assert!(position_is_collinear(&l, &l));
        assert!(position_is_collinear(&(l * 1.01), &l));
        assert!(position_is_collinear(&(l * 0.5), &l));
    }

    #[test]
    fn right_angle_is_not_collinear() {
        let l = NVec2::new(2.6, 4.5);
        let perpendicular = NVec2::new(-l.y, l.x);
        assert!(!position_is_collinear(&perpendicular, &l));
    }

    #[test]
    fn y_axis_is_never_collinear() {
        let l = NVec2::new(2.6, 4.5);
        assert!(!position_is_collinear(&NVec2::new(0.0, 5.0), &l));
    }

    #[test]
    fn wander_angle_is_relative_to_point() {
        let l = NVec2::new(1.0, 0.0).scale(5.0);
        let pos = NVec2::new((0.1f64).cos(), (0.1f64).sin()) * 5.0;
        let s = calc_wander(&pos, &l);
        assert_relative_eq!(s.angle, 0.1, epsilon = 1e-12);
        assert!(s.radius.is_none());
    }

    #[test]
    fn angles_below_the_axis_are_wrapped() {
        let l5 = NVec2::new(2.6, -4.5);
        let pos = NVec2::new(2.6, -4.6);
        let s = calc_wander(&pos, &l5);
        assert!(s.angle.abs() < 0.1);
    }

    #[test]
    fn statistics_track_extremes() {
        let mut w = WanderStatistics::new(0.0);
        w.observe(&WanderSample { angle: 0.2, radius: Some(5.3) });
        w.observe(&WanderSample { angle: -0.1, radius: None });
        w.observe(&WanderSample { angle: 0.05, radius: Some(5.1) });
        assert_relative_eq!(w.angular_wander(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(w.radial_wander(), 0.2, epsilon = 1e-12);

        assert_eq!(w.hamiltonian_spread(), 0.0);
        w.observe_hamiltonian(-3.0);
        w.observe_hamiltonian(-2.5);
        assert_relative_eq!(w.hamiltonian_spread(), 0.5);
    }

    #[test]
    fn restricted_output_keeps_window_only() {
        assert!(keep_sample(0.0, 1000.0, true));
        assert!(keep_sample(0.105, 1000.0, true));
        assert!(!keep_sample(0.05, 1000.0, true));
        assert!(keep_sample(0.05, 1000.0, false));
    }

    #[test]
    fn inertial_frame_rotates_anticlockwise() {
        let p = to_inertial(&NVec2::new(1.0, 0.0), PI / 2.0, 1.0);
        assert_relative_eq!(p, NVec2::new(0.0, 1.0), epsilon = 1e-12);
    }
}
