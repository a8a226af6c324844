use std::time::{Duration, Instant};

use log::info;

use crate::simulation::params::{rotation_rate, RunParams, PRIMARY_MASS};
use crate::simulation::scenario::Scenario;
use crate::simulation::states::{Deviation, LagrangePoint};
use crate::simulation::trajectory::{run_trajectory, RunSummary, Sinks};

/// Elapsed-time reporting around one driver
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log the time since `start` under `title` and return it
    pub fn end(self, title: &str) -> Duration {
        let dt = self.elapsed();
        info!("{}: {:.3} secs", title, dt.as_secs_f64());
        dt
    }
}

/// Time fixed-step RK4 against adaptive RKF45 over one period of the frame
/// Paste output directly into a spreadsheet to compare
pub fn bench_steppers() {
    let masses = [0.0001, 0.001, 0.01, 0.045];
    let deviation = Deviation { xr: 0.005, ..Deviation::ZERO };

    println!("mass,fixed_ms,fixed_steps,adaptive_ms,adaptive_steps,adaptive_rejected");

    for m in masses {
        let period = 2.0 * std::f64::consts::PI / rotation_rate(PRIMARY_MASS + m);

        let fixed = RunParams {
            t_final: period,
            h0: 1e-3,
            constant_step_size: true,
            restrict_data_output: true,
        };
        let adaptive = RunParams {
            constant_step_size: false,
            ..fixed
        };

        let mut results: Vec<(f64, Option<RunSummary>)> = Vec::with_capacity(2);
        for params in [fixed, adaptive] {
            let scenario = Scenario::build(m, LagrangePoint::L4, deviation, params);

            // Warm-up
            let _ = run_trajectory(&scenario, &mut Sinks::none());

            let t0 = Instant::now();
            let summary = run_trajectory(&scenario, &mut Sinks::none());
            let ms = t0.elapsed().as_secs_f64() * 1000.0;

            results.push((ms, summary.ok()));
        }

        let (fixed_ms, fixed_run) = results[0];
        let (adaptive_ms, adaptive_run) = results[1];

        println!(
            "{},{:.3},{},{:.3},{},{}",
            m,
            fixed_ms,
            fixed_run.map_or(0, |s| s.steps),
            adaptive_ms,
            adaptive_run.map_or(0, |s| s.steps),
            adaptive_run.map_or(0, |s| s.stats.rejected_steps)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_is_monotonic() {
        let t = Timer::start();
        let a = t.elapsed();
        let b = t.end("test");
        assert!(b >= a);
    }
}
