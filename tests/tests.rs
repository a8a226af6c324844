use std::path::PathBuf;

use nalgebra::Vector2;

use trojan_sim::simulation::analysis::{DeviationSweep, ERROR_DEVIATIONS};
use trojan_sim::simulation::trajectory::{EnergyRecord, TrajectoryRecord};
use trojan_sim::{BodyPair, Deviation, DeviationAxis, LagrangePoint, NVec2, NVec4, RunParams};
use trojan_sim::{Derivative, DerivativeFunction, RestrictedThreeBody, StepError, Stepper};
use trojan_sim::{DeviationAnalysis, ErrorAnalysis, MassAnalysis, Scenario, SweepRange};
use trojan_sim::{run_trajectory, Sinks};
use trojan_sim::{OutputDir, ProgramConfig, SimError, TrajectoryFiles};

use approx::assert_relative_eq;

/// Short adaptive run, every sample kept
pub fn short_params(t_final: f64) -> RunParams {
    RunParams {
        t_final,
        h0: 1e-3,
        constant_step_size: false,
        restrict_data_output: false,
    }
}

pub fn radial(xr: f64) -> Deviation {
    Deviation { xr, ..Deviation::ZERO }
}

/// Fresh empty directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("trojan-sim-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// y'' = -y, exact solution (cos t, -sin t)
struct Oscillator;

impl DerivativeFunction<2> for Oscillator {
    fn derivatives(&self, _t: f64, y: &Vector2<f64>) -> Derivative<2> {
        Derivative {
            dydt: Vector2::new(y[1], -y[0]),
            potential_energy: 0.5 * y[0] * y[0],
        }
    }
}

/// Blows up on the first evaluation
struct Singular;

impl DerivativeFunction<2> for Singular {
    fn derivatives(&self, _t: f64, _y: &Vector2<f64>) -> Derivative<2> {
        Derivative {
            dydt: Vector2::new(f64::NAN, 0.0),
            potential_energy: 0.0,
        }
    }
}

fn rk4_error(h: f64) -> f64 {
    let mut stepper = Stepper::<2>::fixed(h);
    let (mut t, mut y) = (0.0, Vector2::new(1.0, 0.0));
    while t < 1.0 {
        stepper.step(&Oscillator, &mut t, &mut y, 1.0).unwrap();
    }
    (y - Vector2::new(1f64.cos(), -1f64.sin())).norm()
}

// ==================================================================================
// Dynamics tests
// ==================================================================================

#[test]
fn massless_secondary_matches_single_primary() {
    let with = RestrictedThreeBody::new(BodyPair::new(1.0, 0.0), 1.0);
    let y = NVec4::new(-2.0, 4.0, 0.1, 0.2);
    let d = with.derivatives(0.0, &y);

    let pos = NVec2::new(y[0], y[1]);
    let (acc, u) = with.gravity(pos);
    let r = pos.norm();
    assert_relative_eq!(u, -trojan_sim::simulation::params::G / r, epsilon = 1e-12);
    assert_relative_eq!(d.dydt[2], acc.x + 2.0 * y[3] + y[0], epsilon = 1e-12);
    assert_relative_eq!(d.dydt[3], acc.y - 2.0 * y[2] + y[1], epsilon = 1e-12);
}

#[test]
fn hamiltonian_is_conserved_over_one_orbit() {
    let scenario = Scenario::build(0.001, LagrangePoint::L4, radial(0.005), short_params(12.0));
    let mut energy: Vec<EnergyRecord> = Vec::new();
    let summary = run_trajectory(&scenario, &mut Sinks::energy(&mut energy)).unwrap();

    let h0 = energy[0].hamiltonian;
    assert!(h0 < 0.0);
    assert!(
        summary.hamiltonian_spread / h0.abs() < 1e-6,
        "relative drift {}",
        summary.hamiltonian_spread / h0.abs()
    );
    assert_eq!(energy.len() as u64, summary.steps);
}

#[test]
fn fixed_step_run_conserves_hamiltonian() {
    let params = RunParams { constant_step_size: true, ..short_params(12.0) };
    let scenario = Scenario::build(0.001, LagrangePoint::L4, radial(0.005), params);
    let mut energy: Vec<EnergyRecord> = Vec::new();
    let summary = run_trajectory(&scenario, &mut Sinks::energy(&mut energy)).unwrap();

    assert!(summary.hamiltonian_spread / energy[0].hamiltonian.abs() < 1e-6);
    assert!(energy.last().unwrap().t < 12.0);
    assert!(summary.steps >= 12_000);
}

#[test]
fn lagrange_points_reflect_across_the_axis() {
    for (m1, m2) in [(1.0, 0.0), (1.0, 0.001), (1.0, 0.045), (2.0, 0.5), (0.3, 0.3)] {
        let (l4, l5) = trojan_sim::simulation::states::lagrange_points(&BodyPair::new(m1, m2));
        assert_eq!(l4.x, l5.x, "m1 = {}, m2 = {}", m1, m2);
        assert_eq!(l4.y, -l5.y, "m1 = {}, m2 = {}", m1, m2);
        assert!(l4.y > 0.0);
    }
}

#[test]
fn radial_start_wanders_alike_about_both_points() {
    // Coriolis breaks the plain mirror, so only a start at rest stays close
    let l4 = Scenario::build(0.001, LagrangePoint::L4, radial(0.005), short_params(2.0));
    let l5 = l4.mirrored();
    assert_eq!(l5.initial.point, LagrangePoint::L5);
    assert_eq!(l4.initial.position.y, -l5.initial.position.y);

    let a = run_trajectory(&l4, &mut Sinks::none()).unwrap();
    let b = run_trajectory(&l5, &mut Sinks::none()).unwrap();

    assert_relative_eq!(a.angular_wander, b.angular_wander, max_relative = 1e-2);
}

#[test]
fn asteroid_on_the_point_barely_moves() {
    let scenario = Scenario::build(0.001, LagrangePoint::L4, Deviation::ZERO, short_params(5.0));
    let summary = run_trajectory(&scenario, &mut Sinks::none()).unwrap();
    assert!(summary.angular_wander < 1e-6, "wander {}", summary.angular_wander);
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn rk4_error_scales_with_fourth_power() {
    let e1 = rk4_error(0.1);
    let e2 = rk4_error(0.05);
    let e3 = rk4_error(0.025);

    let r1 = e1 / e2;
    let r2 = e2 / e3;
    assert!(r1 > 12.0 && r1 < 20.0, "ratio {}", r1);
    assert!(r2 > 12.0 && r2 < 20.0, "ratio {}", r2);
}

#[test]
fn non_finite_derivative_fails_the_step() {
    let mut stepper = Stepper::<2>::fixed(0.1);
    let (mut t, mut y) = (0.0, Vector2::new(1.0, 0.0));
    let err = stepper.step(&Singular, &mut t, &mut y, 1.0).unwrap_err();

    assert!(matches!(err, StepError::NonFiniteState { .. }));
    assert_eq!(t, 0.0);
    assert_eq!(y, Vector2::new(1.0, 0.0));
}

#[test]
fn adaptive_stats_count_every_step() {
    let scenario = Scenario::build(0.001, LagrangePoint::L4, radial(0.005), short_params(2.0));
    let summary = run_trajectory(&scenario, &mut Sinks::none()).unwrap();
    assert_eq!(summary.stats.accepted_steps, summary.steps);
    assert!(summary.stats.fn_evals >= 6 * summary.steps);
}

// ==================================================================================
// Analysis tests
// ==================================================================================

#[test]
fn mass_sweep_includes_capped_end() {
    let mut analysis = MassAnalysis::new(0.001, 0.0005, LagrangePoint::L4, radial(0.005), short_params(1.0));
    analysis.masses = SweepRange::new(0.0001, 0.001, 0.0005);

    let report = analysis.run(false, None).unwrap();
    let masses: Vec<f64> = report.sweep.samples.iter().map(|s| s.mass).collect();

    assert_eq!(masses.len(), 3);
    assert_eq!(*masses.last().unwrap(), 0.001);
    assert!(report.averaged.is_none());
    assert!(report.sweep.recorded.is_none());
    assert!(report.sweep.samples.iter().all(|s| s.wander_degrees.is_some()));
}

#[test]
fn mass_sweep_records_trajectory_once_at_mvt_mass() {
    let analysis = MassAnalysis::new(0.0021, 0.001, LagrangePoint::L4, radial(0.005), short_params(1.0))
        .with_trajectory(0.0011);

    let mut records: Vec<TrajectoryRecord> = Vec::new();
    let report = analysis.run(false, Some(&mut records)).unwrap();

    let recorded = report.sweep.recorded.unwrap();
    assert_relative_eq!(recorded.bodies.second.m, 0.0011, epsilon = 1e-12);
    assert!(!records.is_empty());
    assert_eq!(records[0].t, 0.0);
}

#[test]
fn averaged_mass_sweep_matches_single_point() {
    let analysis = MassAnalysis::new(0.0011, 0.001, LagrangePoint::L5, radial(0.005), short_params(2.0));
    let report = analysis.run(true, None).unwrap();
    let averaged = report.averaged.unwrap();

    assert_eq!(averaged.len(), report.sweep.samples.len());
    for (s, a) in report.sweep.samples.iter().zip(&averaged) {
        assert_eq!(s.mass, a.mass);
        assert_relative_eq!(s.wander_degrees.unwrap(), a.wander_degrees.unwrap(), max_relative = 1e-3);
    }
}

#[test]
fn symmetric_deviation_averaging_without_secondary_mass() {
    let mut analysis = DeviationAnalysis::new(0.0, Deviation::ZERO, LagrangePoint::L4, short_params(3.0));
    analysis.sweeps = vec![DeviationSweep {
        axis: DeviationAxis::Radial,
        range: SweepRange::new(-0.004, 0.004, 0.004),
    }];

    let reports = analysis.run(true).unwrap();
    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    let averaged = report.averaged.as_ref().unwrap();
    assert_eq!(report.samples.len(), 3);

    for (s, a) in report.samples.iter().zip(averaged) {
        assert_relative_eq!(s.wander_degrees.unwrap(), a.wander_degrees.unwrap(), epsilon = 1e-7, max_relative = 1e-6);
    }
}

#[test]
fn error_analysis_logs_every_step() {
    let analysis = ErrorAnalysis::new(0.001, short_params(0.5));
    assert_eq!(analysis.deviations, ERROR_DEVIATIONS.to_vec());

    let mut energy: Vec<EnergyRecord> = Vec::new();
    let summary = analysis.run_one(&analysis.deviations[0], &mut energy).unwrap().unwrap();

    assert_eq!(energy.len() as u64, summary.steps);
    assert!(energy.windows(2).all(|w| w[1].t > w[0].t));
    assert!(energy.windows(2).all(|w| w[1].hamiltonian_spread >= w[0].hamiltonian_spread));
}

#[test]
fn mismatched_sweeps_are_an_error() {
    let err = trojan_sim::simulation::analysis::average_sweeps("mass analysis", &[Some(1.0); 3], &[Some(1.0); 2])
        .unwrap_err();
    assert!(matches!(err, SimError::InconsistentSweepLengths { first: 3, second: 2, .. }));
    assert!(err.to_string().contains("inconsistent"));
}

// ==================================================================================
// Output and configuration tests
// ==================================================================================

#[test]
fn trajectory_files_have_one_line_per_record() {
    let dir = scratch_dir("trajectory");
    let out = OutputDir::new(&dir);

    let scenario = Scenario::build(0.001, LagrangePoint::L4, radial(0.005), short_params(0.5));
    let mut files = TrajectoryFiles::create(&out).unwrap();
    let summary = run_trajectory(&scenario, &mut Sinks::trajectory(&mut files)).unwrap();
    files.finish().unwrap();
    trojan_sim::output::writer::write_trajectory_params(&out, &scenario).unwrap();

    for (name, cols) in [("trojan.dat", 7), ("inertial.dat", 3), ("wander_time.dat", 3)] {
        let text = std::fs::read_to_string(dir.join(name)).unwrap();
        assert_eq!(text.lines().count() as u64, summary.steps, "{}", name);
        assert!(text.lines().all(|l| l.split('\t').count() == cols), "{}", name);
    }

    let params = std::fs::read_to_string(dir.join("trojan.params")).unwrap();
    assert!(params.trim_end().ends_with("|L4"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn default_scenario_file_matches_defaults() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join("default.yaml");
    let cfg = ProgramConfig::load(&path).unwrap();
    assert_eq!(cfg, ProgramConfig::default());
}

#[test]
fn quick_scenario_validates() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join("quick.yaml");
    let mut cfg = ProgramConfig::load(&path).unwrap();
    cfg.control.output_dir = std::env::temp_dir();

    let cfg = cfg.validate().unwrap();
    assert_eq!(cfg.lagrange_point(), LagrangePoint::L5);
    assert_eq!(cfg.run_params().t_final, 50.0);
    assert!(cfg.control.calc_average_wander);
}
