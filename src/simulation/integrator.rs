//! Single-step ODE integrators for the trojan state
//!
//! Provides a fixed-step classical RK4 and an adaptive Runge-Kutta-Fehlberg
//! 4(5) pair behind one `Stepper`. Both advance `(t, y)` in place towards
//! `t_final` and never step past it.

use std::fmt;

use nalgebra::SVector;

use super::forces::{Derivative, DerivativeFunction};

/// Which scheme a [`Stepper`] uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMethod {
    Rk4, // fixed step, four evaluations, weights 1:2:2:1
    Rkf45, // embedded 4(5) pair with local error control
}

// Fehlberg 4(5) tableau
const C: [f64; 6] = [0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0];
const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 4.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0],
    [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0],
    [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0],
    [-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
];
// 5th order weights
const B: [f64; 6] = [16.0 / 135.0, 0.0, 6656.0 / 12825.0, 28561.0 / 56430.0, -9.0 / 50.0, 2.0 / 55.0];
// 5th minus 4th order weights
const B_ERR: [f64; 6] = [1.0 / 360.0, 0.0, -128.0 / 4275.0, -2197.0 / 75240.0, 1.0 / 50.0, 2.0 / 55.0];

const RKF45_ORDER: f64 = 5.0;

/// Step-size controller
///
/// Shrinks when the scaled error exceeds `1.1`, grows when it falls below `0.5`,
/// otherwise keeps the step.
#[derive(Debug, Clone)]
pub struct StepController {
    pub safety: f64,
    pub max_factor: f64,
    pub min_factor: f64,
    order: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            order: RKF45_ORDER,
        }
    }
}

impl StepController {
    /// Factor applied to a rejected step
    pub fn decrease(&self, error: f64) -> f64 {
        let r = self.safety * error.powf(-1.0 / self.order);
        r.max(self.min_factor)
    }

    /// Factor applied after an accepted step
    pub fn increase(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        let r = self.safety * error.powf(-1.0 / (self.order + 1.0));
        r.clamp(1.0, self.max_factor)
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub fn_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
}

/// Why a step could not be taken
#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    /// Error control drove the step below what `t` can resolve
    StepSizeTooSmall { t: f64, h: f64 },
    /// The new state contains NaN or infinity
    NonFiniteState { t: f64 },
    /// Nothing left to integrate, or a non-positive step size
    DegenerateStep { t: f64, h: f64 },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::StepSizeTooSmall { t, h } => write!(f, "step size {} too small at t = {}", h, t),
            StepError::NonFiniteState { t } => write!(f, "non-finite state at t = {}", t),
            StepError::DegenerateStep { t, h } => write!(f, "degenerate step h = {} at t = {}", h, t),
        }
    }
}

impl std::error::Error for StepError {}

/// One-step integrator, generic over the dynamics it is handed
///
/// Keeps the current step size between calls and caches the derivative at the
/// last accepted state, so consecutive adaptive steps reuse their first stage.
#[derive(Debug, Clone)]
pub struct Stepper<const N: usize> {
    method: StepMethod,
    atol: f64,
    rtol: f64,
    controller: StepController,
    h: f64,
    cache: Option<(f64, SVector<f64, N>, Derivative<N>)>,
    pub stats: Stats,
}

impl<const N: usize> Stepper<N> {
    pub fn new(method: StepMethod, h0: f64, atol: f64, rtol: f64) -> Self {
        Self {
            method,
            atol,
            rtol,
            controller: StepController::default(),
            h: h0,
            cache: None,
            stats: Stats::default(),
        }
    }

    pub fn fixed(h: f64) -> Self {
        Self::new(StepMethod::Rk4, h, 0.0, 0.0)
    }

    pub fn adaptive(h0: f64, atol: f64, rtol: f64) -> Self {
        Self::new(StepMethod::Rkf45, h0, atol, rtol)
    }

    /// Step size the next call will try first
    pub fn step_size(&self) -> f64 {
        self.h
    }

    /// Advance `(t, y)` by one accepted step, not past `t_final`.
    ///
    /// Returns the derivative evaluated at the new state. On error `t` and `y`
    /// are left at the last accepted values.
    pub fn step<F: DerivativeFunction<N>>(
        &mut self,
        f: &F,
        t: &mut f64,
        y: &mut SVector<f64, N>,
        t_final: f64,
    ) -> Result<Derivative<N>, StepError> {
        let remaining = t_final - *t;
        if !(remaining > 0.0) || !(self.h > 0.0) {
            return Err(StepError::DegenerateStep { t: *t, h: self.h });
        }

        match self.method {
            StepMethod::Rk4 => self.step_rk4(f, t, y, t_final),
            StepMethod::Rkf45 => self.step_rkf45(f, t, y, t_final),
        }
    }

    fn eval<F: DerivativeFunction<N>>(&mut self, f: &F, t: f64, y: &SVector<f64, N>) -> Derivative<N> {
        self.stats.fn_evals += 1;
        f.derivatives(t, y)
    }

    /// Derivative at the start of the step, from the cache when it matches
    fn first_stage<F: DerivativeFunction<N>>(&mut self, f: &F, t: f64, y: &SVector<f64, N>) -> SVector<f64, N> {
        if let Some((ct, cy, d)) = &self.cache {
            if *ct == t && cy == y {
                return d.dydt;
            }
        }
        self.eval(f, t, y).dydt
    }

    fn finish<F: DerivativeFunction<N>>(
        &mut self,
        f: &F,
        t: &mut f64,
        y: &mut SVector<f64, N>,
        t_new: f64,
        y_new: SVector<f64, N>,
    ) -> Result<Derivative<N>, StepError> {
        if !y_new.iter().all(|v| v.is_finite()) {
            return Err(StepError::NonFiniteState { t: t_new });
        }

        *t = t_new;
        *y = y_new;
        self.stats.accepted_steps += 1;

        let d = self.eval(f, t_new, &y_new);
        self.cache = Some((t_new, y_new, d));
        Ok(d)
    }

    fn step_rk4<F: DerivativeFunction<N>>(
        &mut self,
        f: &F,
        t: &mut f64,
        y: &mut SVector<f64, N>,
        t_final: f64,
    ) -> Result<Derivative<N>, StepError> {
        let (t0, y0) = (*t, *y);
        let h = self.h.min(t_final - t0);
        let half = 0.5 * h;

        let k1 = self.first_stage(f, t0, &y0);
        let k2 = self.eval(f, t0 + half, &(y0 + k1 * half)).dydt;
        let k3 = self.eval(f, t0 + half, &(y0 + k2 * half)).dydt;
        let k4 = self.eval(f, t0 + h, &(y0 + k3 * h)).dydt;

        let y_new = y0 + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0);
        let t_new = if h < self.h { t_final } else { (t0 + h).min(t_final) };

        if t_new <= t0 {
            return Err(StepError::StepSizeTooSmall { t: t0, h });
        }

        self.finish(f, t, y, t_new, y_new)
    }

    #[allow(clippy::needless_range_loop)]
    fn step_rkf45<F: DerivativeFunction<N>>(
        &mut self,
        f: &F,
        t: &mut f64,
        y: &mut SVector<f64, N>,
        t_final: f64,
    ) -> Result<Derivative<N>, StepError> {
        let (t0, y0) = (*t, *y);
        let mut k = [SVector::<f64, N>::zeros(); 6];
        k[0] = self.first_stage(f, t0, &y0);

        loop {
            let final_step = self.h >= t_final - t0;
            let h = if final_step { t_final - t0 } else { self.h };

            if t0 + h <= t0 {
                return Err(StepError::StepSizeTooSmall { t: t0, h });
            }

            for i in 1..6 {
                let mut y_stage = y0;
                for j in 0..i {
                    y_stage += k[j] * (h * A[i][j]);
                }
                k[i] = self.eval(f, t0 + C[i] * h, &y_stage).dydt;
            }

            let mut y_new = y0;
            let mut err = SVector::<f64, N>::zeros();
            for i in 0..6 {
                y_new += k[i] * (h * B[i]);
                err += k[i] * (h * B_ERR[i]);
            }

            let error = self.scaled_error(&y_new, &err);

            if error > 1.1 {
                self.stats.rejected_steps += 1;
                self.h = h * self.controller.decrease(error);
                continue;
            }

            if error < 0.5 {
                self.h = h * self.controller.increase(error);
            } else if !final_step {
                self.h = h;
            }

            let t_new = if final_step { t_final } else { t0 + h };
            return self.finish(f, t, y, t_new, y_new);
        }
    }

    /// Infinity norm of the error, scaled by the tolerance per component
    fn scaled_error(&self, y_new: &SVector<f64, N>, err: &SVector<f64, N>) -> f64 {
        y_new
            .iter()
            .zip(err.iter())
            .map(|(yi, ei)| ei.abs() / (self.atol + self.rtol * yi.abs()))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    struct HarmonicOscillator {
        omega: f64,
    }

    impl DerivativeFunction<2> for HarmonicOscillator {
        fn derivatives(&self, _t: f64, y: &Vector2<f64>) -> Derivative<2> {
            let w2 = self.omega * self.omega;
            Derivative {
                dydt: Vector2::new(y[1], -w2 * y[0]),
                potential_energy: 0.5 * w2 * y[0] * y[0],
            }
        }
    }

    fn run(stepper: &mut Stepper<2>, t_final: f64) -> (f64, Vector2<f64>) {
        let sys = HarmonicOscillator { omega: 1.0 };
        let mut t = 0.0;
        let mut y = Vector2::new(1.0, 0.0);
        while t < t_final {
            stepper.step(&sys, &mut t, &mut y, t_final).unwrap();
        }
        (t, y)
    }

    #[test]
    fn adaptive_oscillator_returns_after_one_period() {
        let tf = 2.0 * std::f64::consts::PI;
        let mut stepper = Stepper::adaptive(1e-3, 1e-12, 0.0);
        let (t, y) = run(&mut stepper, tf);

        assert_eq!(t, tf);
        assert!((y[0] - 1.0).abs() < 1e-9, "y(2π) = {}", y[0]);
        assert!(y[1].abs() < 1e-9, "y'(2π) = {}", y[1]);
        assert!(stepper.step_size() > 1e-3, "step size never grew");
    }

    #[test]
    fn fixed_step_lands_on_t_final() {
        let mut stepper = Stepper::fixed(0.3);
        let (t, _) = run(&mut stepper, 1.0);
        assert_eq!(t, 1.0);
        assert_eq!(stepper.stats.accepted_steps, 4);
        assert_eq!(stepper.stats.rejected_steps, 0);
    }

    #[test]
    fn tight_tolerance_forces_rejections() {
        let mut stepper = Stepper::adaptive(1.0, 1e-12, 0.0);
        run(&mut stepper, 1.0);
        assert!(stepper.stats.rejected_steps > 0);
    }

    #[test]
    fn time_never_regresses() {
        let sys = HarmonicOscillator { omega: 2.0 };
        let mut stepper = Stepper::adaptive(0.5, 1e-10, 0.0);
        let mut t = 0.0;
        let mut y = Vector2::new(0.0, 1.0);
        while t < 3.0 {
            let before = t;
            stepper.step(&sys, &mut t, &mut y, 3.0).unwrap();
            assert!(t > before);
        }
    }

    #[test]
    fn stepping_at_t_final_is_degenerate() {
        let sys = HarmonicOscillator { omega: 1.0 };
        let mut stepper = Stepper::fixed(0.1);
        let mut t = 1.0;
        let mut y = Vector2::new(1.0, 0.0);
        let err = stepper.step(&sys, &mut t, &mut y, 1.0).unwrap_err();
        assert!(matches!(err, StepError::DegenerateStep { .. }));
    }

    #[test]
    fn returned_derivative_is_at_new_state() {
        let sys = HarmonicOscillator { omega: 1.0 };
        let mut stepper = Stepper::adaptive(0.1, 1e-12, 0.0);
        let mut t = 0.0;
        let mut y = Vector2::new(1.0, 0.0);
        let d = stepper.step(&sys, &mut t, &mut y, 1.0).unwrap();
        assert_relative_eq!(d.potential_energy, 0.5 * y[0] * y[0], epsilon = 1e-15);
    }

    #[test]
    fn controller_factors_stay_bounded() {
        let c = StepController::default();
        assert_eq!(c.increase(0.0), 5.0);
        assert_eq!(c.decrease(1e12), 0.2);
        assert!(c.increase(0.49) >= 1.0);
        assert!(c.decrease(2.0) < 1.0);
    }
}
