//! Parameter sweeps built on the trajectory loop
//!
//! - mass analysis: vary the secondary mass
//! - deviation analysis: vary one component of the initial offset at a time
//! - error analysis: fixed offsets, Hamiltonian drift logged every step
//!
//! Mass and deviation sweeps can be repeated about the other Lagrange point
//! and averaged index by index.

use log::{debug, error, info, warn};

use super::params::{RunParams, R_DISTANCE};
use super::scenario::Scenario;
use super::states::{Deviation, DeviationAxis, LagrangePoint};
use super::trajectory::{run_trajectory, EnergySink, RunSummary, Sinks, TrajectorySink};
use crate::error::{Result, SimError};

/// Smallest secondary mass of a mass sweep
pub const MIN_SWEEP_MASS: f64 = 0.0001;

const SWEEP_EPS: f64 = 1e-10;

/// Inclusive range sampled at fixed increments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRange {
    pub from: f64,
    pub to: f64,
    pub step: f64,
}

impl SweepRange {
    pub fn new(from: f64, to: f64, step: f64) -> Self {
        Self { from, to, step }
    }

    /// Sample points `from + i * step` up to `to`.
    ///
    /// Values are computed from the index so both halves of an averaged sweep
    /// see the same count. When the last increment overshoots `to`, `to`
    /// itself is appended as the final sample.
    pub fn values(&self) -> Vec<f64> {
        if self.from > self.to + SWEEP_EPS {
            return Vec::new();
        }
        if !(self.step > 0.0) {
            return vec![self.from];
        }

        let mut out = Vec::new();
        let mut i = 0u64;
        loop {
            let v = self.from + i as f64 * self.step;
            if v > self.to + SWEEP_EPS {
                break;
            }
            out.push(v);
            i += 1;
        }

        if let Some(&last) = out.last() {
            if last < self.to - SWEEP_EPS {
                out.push(self.to);
            }
        }
        out
    }
}

/// Run one scenario, turning an integration failure into an absent result
fn run_or_skip(scenario: &Scenario, sinks: &mut Sinks) -> Result<Option<RunSummary>> {
    match run_trajectory(scenario, sinks) {
        Ok(summary) => Ok(Some(summary)),
        Err(SimError::Integration(e)) => {
            warn!(
                "run for mass {} at {} abandoned: {}",
                scenario.bodies.second.m,
                scenario.initial.point.label(),
                e
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Index-wise mean of two sweeps; absent where either side is absent
pub fn average_sweeps(what: &str, a: &[Option<f64>], b: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    if a.len() != b.len() {
        return Err(SimError::InconsistentSweepLengths {
            what: what.to_string(),
            first: a.len(),
            second: b.len(),
        });
    }

    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(0.5 * (x + y)),
            _ => None,
        })
        .collect())
}

/// Drop an averaged sweep whose halves disagree in length, keeping the
/// single-point results
fn averaged_or_skipped<T>(averaged: Result<Vec<T>>) -> Result<Option<Vec<T>>> {
    match averaged {
        Ok(v) => Ok(Some(v)),
        Err(e @ SimError::InconsistentSweepLengths { .. }) => {
            error!("{}; averaged output skipped", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

// =========================================================================================
// Mass analysis
// =========================================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassSample {
    pub mass: f64,
    pub reduced_mass: f64,
    pub wander_degrees: Option<f64>,
    pub libration_ratio: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MassSweep {
    pub samples: Vec<MassSample>,
    /// Scenario whose trajectory went to the trajectory sink
    pub recorded: Option<Scenario>,
}

#[derive(Debug, Clone)]
pub struct MassReport {
    pub sweep: MassSweep,
    pub averaged: Option<Vec<MassSample>>,
}

/// Index-wise mean of a sweep about each point
pub fn average_mass_samples(a: &[MassSample], b: &[MassSample]) -> Result<Vec<MassSample>> {
    let wander = average_sweeps(
        "mass analysis",
        &a.iter().map(|s| s.wander_degrees).collect::<Vec<_>>(),
        &b.iter().map(|s| s.wander_degrees).collect::<Vec<_>>(),
    )?;
    let ratio = average_sweeps(
        "mass analysis libration ratio",
        &a.iter().map(|s| s.libration_ratio).collect::<Vec<_>>(),
        &b.iter().map(|s| s.libration_ratio).collect::<Vec<_>>(),
    )?;

    Ok(a.iter()
        .zip(wander.into_iter().zip(ratio))
        .map(|(s, (w, r))| MassSample {
            wander_degrees: w,
            libration_ratio: r,
            ..*s
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct MassAnalysis {
    pub masses: SweepRange,
    pub point: LagrangePoint,
    pub deviation: Deviation,
    pub params: RunParams,
    /// Record the trajectory of the sample within half an increment of this mass
    pub trajectory_mass: Option<f64>,
}

impl MassAnalysis {
    pub fn new(max_mass: f64, increment: f64, point: LagrangePoint, deviation: Deviation, params: RunParams) -> Self {
        Self {
            masses: SweepRange::new(MIN_SWEEP_MASS, max_mass, increment),
            point,
            deviation,
            params,
            trajectory_mass: None,
        }
    }

    pub fn with_trajectory(mut self, mass: f64) -> Self {
        self.trajectory_mass = Some(mass);
        self
    }

    /// One sweep about `point`, optionally recording a single trajectory
    pub fn sweep(&self, point: LagrangePoint, mut trajectory: Option<&mut dyn TrajectorySink>) -> Result<MassSweep> {
        let mut samples = Vec::new();
        let mut recorded = None;

        for m in self.masses.values() {
            let scenario = Scenario::build(m, point, self.deviation, self.params);
            scenario.dump();
            debug!("doing mass analysis for mass = {}", m);

            let record = recorded.is_none()
                && self
                    .trajectory_mass
                    .is_some_and(|tm| (tm - m).abs() < self.masses.step / 2.0);

            let summary = match (record, trajectory.as_deref_mut()) {
                (true, Some(sink)) => {
                    info!("doing trajectory analysis for mass {}", m);
                    recorded = Some(scenario);
                    run_or_skip(&scenario, &mut Sinks::trajectory(sink))?
                }
                _ => run_or_skip(&scenario, &mut Sinks::none())?,
            };

            samples.push(MassSample {
                mass: m,
                reduced_mass: scenario.bodies.reduced_mass(),
                wander_degrees: summary.map(|s| s.angular_wander_degrees()),
                libration_ratio: summary
                    .and_then(|s| scenario.libration_ratio(s.angular_wander, s.radial_wander)),
            });
        }

        Ok(MassSweep { samples, recorded })
    }

    /// Sweep about the configured point and, if `average`, about the other
    /// point too, returning the index-wise means
    pub fn run(&self, average: bool, trajectory: Option<&mut dyn TrajectorySink>) -> Result<MassReport> {
        let sweep = self.sweep(self.point, trajectory)?;
        if !average {
            return Ok(MassReport { sweep, averaged: None });
        }

        let other = self.sweep(self.point.other(), None)?;
        let averaged = averaged_or_skipped(average_mass_samples(&sweep.samples, &other.samples))?;

        Ok(MassReport { sweep, averaged })
    }
}

// =========================================================================================
// Deviation analysis
// =========================================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationSweep {
    pub axis: DeviationAxis,
    pub range: SweepRange,
}

impl DeviationSweep {
    /// The four sweeps of a full deviation analysis
    pub fn defaults() -> [DeviationSweep; 4] {
        [
            DeviationSweep { axis: DeviationAxis::Radial, range: SweepRange::new(-0.015, 0.015, 0.0001) },
            DeviationSweep { axis: DeviationAxis::Azimuthal, range: SweepRange::new(-0.9, 5.5, 0.01) },
            DeviationSweep { axis: DeviationAxis::RadialSpeed, range: SweepRange::new(-0.8, 0.8, 0.002) },
            DeviationSweep { axis: DeviationAxis::TangentialSpeed, range: SweepRange::new(-0.1, 0.1, 0.002) },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationSample {
    pub deviation: f64,
    pub wander_degrees: Option<f64>,
    /// Half the radial wander in units of `R_DISTANCE`
    pub radial_wander: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DeviationReport {
    pub axis: DeviationAxis,
    pub samples: Vec<DeviationSample>,
    pub averaged: Option<Vec<DeviationSample>>,
}

/// Index-wise mean of a deviation sweep about each point
pub fn average_deviation_samples(what: &str, a: &[DeviationSample], b: &[DeviationSample]) -> Result<Vec<DeviationSample>> {
    let wander = average_sweeps(
        what,
        &a.iter().map(|s| s.wander_degrees).collect::<Vec<_>>(),
        &b.iter().map(|s| s.wander_degrees).collect::<Vec<_>>(),
    )?;
    let radial = average_sweeps(
        what,
        &a.iter().map(|s| s.radial_wander).collect::<Vec<_>>(),
        &b.iter().map(|s| s.radial_wander).collect::<Vec<_>>(),
    )?;

    Ok(a.iter()
        .zip(wander.into_iter().zip(radial))
        .map(|(s, (w, r))| DeviationSample {
            deviation: s.deviation,
            wander_degrees: w,
            radial_wander: r,
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct DeviationAnalysis {
    pub secondary_mass: f64,
    pub base: Deviation, // held fixed for the components not being swept
    pub point: LagrangePoint,
    pub params: RunParams,
    pub sweeps: Vec<DeviationSweep>,
}

impl DeviationAnalysis {
    pub fn new(secondary_mass: f64, base: Deviation, point: LagrangePoint, params: RunParams) -> Self {
        Self {
            secondary_mass,
            base,
            point,
            params,
            sweeps: DeviationSweep::defaults().to_vec(),
        }
    }

    pub fn sweep(&self, sweep: &DeviationSweep, point: LagrangePoint) -> Result<Vec<DeviationSample>> {
        let mut samples = Vec::new();

        for d in sweep.range.values() {
            let deviation = sweep.axis.apply(self.base, d);
            let scenario = Scenario::build(self.secondary_mass, point, deviation, self.params);
            scenario.dump();

            let summary = run_or_skip(&scenario, &mut Sinks::none())?;

            samples.push(DeviationSample {
                deviation: d,
                wander_degrees: summary.map(|s| s.angular_wander_degrees()),
                radial_wander: summary.map(|s| 0.5 * s.radial_wander / R_DISTANCE),
            });
        }

        Ok(samples)
    }

    pub fn run_sweep(&self, sweep: &DeviationSweep, average: bool) -> Result<DeviationReport> {
        let samples = self.sweep(sweep, self.point)?;
        if !average {
            return Ok(DeviationReport { axis: sweep.axis, samples, averaged: None });
        }

        let other = self.sweep(sweep, self.point.other())?;
        let what = format!("deviation simulation ({})", sweep.axis.file_stem());
        let averaged = averaged_or_skipped(average_deviation_samples(&what, &samples, &other))?;

        Ok(DeviationReport { axis: sweep.axis, samples, averaged })
    }

    pub fn run(&self, average: bool) -> Result<Vec<DeviationReport>> {
        self.sweeps.iter().map(|s| self.run_sweep(s, average)).collect()
    }
}

// =========================================================================================
// Error analysis
// =========================================================================================

/// Offsets run back to back by the error analysis
pub const ERROR_DEVIATIONS: [Deviation; 4] = [
    Deviation { xr: 0.006, a: 0.0, vr: 0.0, vt: 0.0 },
    Deviation { xr: 0.005, a: 0.0, vr: 0.0, vt: 0.0 },
    Deviation { xr: 0.004, a: 0.0, vr: 0.0, vt: 0.0 },
    Deviation { xr: 0.003, a: 0.0, vr: 0.0, vt: 0.0 },
];

#[derive(Debug, Clone)]
pub struct ErrorAnalysis {
    pub secondary_mass: f64,
    pub params: RunParams,
    pub deviations: Vec<Deviation>,
}

impl ErrorAnalysis {
    pub fn new(secondary_mass: f64, params: RunParams) -> Self {
        Self {
            secondary_mass,
            params,
            deviations: ERROR_DEVIATIONS.to_vec(),
        }
    }

    /// Run one offset about L4, logging the Hamiltonian every step
    pub fn run_one(&self, deviation: &Deviation, sink: &mut dyn EnergySink) -> Result<Option<RunSummary>> {
        let scenario = Scenario::build(self.secondary_mass, LagrangePoint::L4, *deviation, self.params);
        scenario.dump();

        run_or_skip(&scenario, &mut Sinks::energy(sink))
    }
}
