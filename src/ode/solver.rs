//! Embedded Dormand–Prince 5(4) integrator.
//!
//! Purpose
//! -------
//! Provide the one ODE family the likelihood engine needs: adaptive
//! explicit integration of small, smooth-to-mildly-stiff systems over a
//! prescribed interval, either to the interval's endpoint or densely onto
//! an ascending time grid whose points are hit exactly (steps never
//! overshoot the next output point).
//!
//! Key behaviors
//! -------------
//! - Classical Dormand–Prince 5(4) embedded pair with PI-free step
//!   control: accept when the weighted RMS error is ≤ 1, rescale the
//!   step by `0.9 · err^(−1/5)` clamped to `[0.2, 5.0]`.
//! - Mixed absolute/relative error weights `atol + rtol·max(|y|, |y'|)`.
//! - Hard failure modes instead of silent drift: step-size underflow,
//!   step-budget exhaustion, and non-finite derivatives are reported as
//!   [`OdeError`] values for the caller to handle (the branch integrator
//!   reacts by bisecting, see `likelihood::branch`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Intervals are ascending (`t0 < t1`); degenerate intervals return the
//!   initial state unchanged.
//! - State vectors are `ndarray::Array1<f64>`; the right-hand side is a
//!   pure function of `(y, t)` with no interior mutability.
//!
//! Testing notes
//! -------------
//! - Unit tests validate the stepper against closed-form solutions
//!   (exponential decay, logistic growth) and the dense-grid contract.
use crate::ode::errors::{OdeError, OdeResult};
use ndarray::{Array1, Array2};

// Butcher tableau of the Dormand–Prince 5(4) pair.
const C: [f64; 6] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A2: [f64; 1] = [1.0 / 5.0];
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
const B5: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
const B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const SHRINK_LIMIT: f64 = 0.2;
const GROW_LIMIT: f64 = 5.0;

/// Validated options for the Dormand–Prince stepper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepperOptions {
    /// Relative error tolerance.
    pub rtol: f64,
    /// Absolute error tolerance.
    pub atol: f64,
    /// Maximum accepted-plus-rejected steps per `integrate` call.
    pub max_steps: usize,
}

impl StepperOptions {
    /// Construct validated stepper options.
    ///
    /// # Rules
    /// - `rtol` and `atol` must be finite and strictly positive.
    /// - `max_steps` must be `> 0`.
    ///
    /// # Errors
    /// [`OdeError::InvalidTolerance`] / [`OdeError::InvalidMaxSteps`].
    pub fn new(rtol: f64, atol: f64, max_steps: usize) -> OdeResult<Self> {
        if !rtol.is_finite() || rtol <= 0.0 {
            return Err(OdeError::InvalidTolerance { name: "rtol", value: rtol });
        }
        if !atol.is_finite() || atol <= 0.0 {
            return Err(OdeError::InvalidTolerance { name: "atol", value: atol });
        }
        if max_steps == 0 {
            return Err(OdeError::InvalidMaxSteps { max_steps });
        }
        Ok(Self { rtol, atol, max_steps })
    }
}

impl Default for StepperOptions {
    fn default() -> Self {
        Self { rtol: 1e-8, atol: 1e-12, max_steps: 100_000 }
    }
}

/// Adaptive Dormand–Prince 5(4) integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DormandPrince54 {
    pub opts: StepperOptions,
}

impl DormandPrince54 {
    pub fn new(opts: StepperOptions) -> Self {
        Self { opts }
    }

    /// Integrate `dy/dt = f(y, t)` from `t0` to `t1` and return `y(t1)`.
    ///
    /// A degenerate interval (`t1 == t0`) returns `y0` unchanged.
    ///
    /// # Errors
    /// - [`OdeError::InvalidInterval`] for descending or non-finite
    ///   intervals.
    /// - [`OdeError::StepSizeUnderflow`], [`OdeError::MaxStepsExceeded`],
    ///   [`OdeError::NonFiniteDerivative`] when error control fails; the
    ///   caller decides whether to retry on a smaller interval.
    pub fn integrate<F>(&self, f: F, y0: Array1<f64>, t0: f64, t1: f64) -> OdeResult<Array1<f64>>
    where
        F: Fn(&Array1<f64>, f64) -> Array1<f64>,
    {
        if !t0.is_finite() || !t1.is_finite() || t1 < t0 {
            return Err(OdeError::InvalidInterval { t0, t1 });
        }
        if t1 == t0 {
            return Ok(y0);
        }
        let span = t1 - t0;
        let h_floor = 16.0 * f64::EPSILON * t0.abs().max(1.0);
        let mut h = (span / 100.0).max(h_floor).min(span);
        let mut steps = 0usize;
        self.advance(&f, y0, t0, t1, &mut h, &mut steps)
    }

    /// Integrate densely onto an ascending `grid`, returning one state row
    /// per grid point; row 0 is exactly `y0`. Steps are capped at the next
    /// grid point, so every output row is an integration endpoint rather
    /// than an interpolant.
    ///
    /// # Errors
    /// As for [`DormandPrince54::integrate`]; the step budget applies per
    /// grid cell.
    pub fn integrate_dense<F>(
        &self, f: F, y0: Array1<f64>, grid: &Array1<f64>,
    ) -> OdeResult<Array2<f64>>
    where
        F: Fn(&Array1<f64>, f64) -> Array1<f64>,
    {
        let dim = y0.len();
        let n = grid.len();
        let mut out = Array2::zeros((n, dim));
        out.row_mut(0).assign(&y0);
        let mut y = y0;
        // Carry the accepted step size across cells so the controller does
        // not restart cold a million times.
        let mut h = if n > 1 { (grid[n - 1] - grid[0]) / (n - 1) as f64 } else { 0.0 };
        for cell in 1..n {
            let (ta, tb) = (grid[cell - 1], grid[cell]);
            if tb < ta || !ta.is_finite() || !tb.is_finite() {
                return Err(OdeError::InvalidInterval { t0: ta, t1: tb });
            }
            if tb > ta {
                let mut steps = 0usize;
                y = self.advance(&f, y, ta, tb, &mut h, &mut steps)?;
            }
            out.row_mut(cell).assign(&y);
        }
        Ok(out)
    }

    // Advance y from ta to tb with adaptive steps, mutating the step-size
    // guess for the next call.
    fn advance<F>(
        &self, f: &F, mut y: Array1<f64>, ta: f64, tb: f64, h: &mut f64, steps: &mut usize,
    ) -> OdeResult<Array1<f64>>
    where
        F: Fn(&Array1<f64>, f64) -> Array1<f64>,
    {
        let mut t = ta;
        while t < tb {
            if *steps >= self.opts.max_steps {
                return Err(OdeError::MaxStepsExceeded { t, max_steps: self.opts.max_steps });
            }
            *steps += 1;
            let h_min = 16.0 * f64::EPSILON * t.abs().max(1.0);
            let remaining = tb - t;
            let h_step = h.min(remaining);
            // A step clipped to a sub-floor remainder is legitimate: the
            // interval is simply that short. Underflow means the error
            // controller itself demanded a step below the floor.
            if !h_step.is_finite() || (h_step < h_min && h_step < remaining) {
                return Err(OdeError::StepSizeUnderflow { t, h: *h });
            }
            let (y_new, err) = self.try_step(f, &y, t, h_step)?;
            if err <= 1.0 {
                y = y_new;
                if h_step >= remaining {
                    // Land exactly on tb, so the loop cannot stall on a
                    // sub-ulp residual. The step was clipped to the
                    // remainder; the carried guess stays as it is rather
                    // than collapsing to the clip width.
                    t = tb;
                } else {
                    t += h_step;
                    *h = h_step * (SAFETY * err.powf(-0.2)).clamp(SHRINK_LIMIT, GROW_LIMIT);
                }
            } else {
                *h = h_step * (SAFETY * err.powf(-0.2)).max(SHRINK_LIMIT);
            }
        }
        Ok(y)
    }

    // One trial step of size h. Returns the fifth-order solution and the
    // weighted RMS of the embedded error estimate.
    fn try_step<F>(&self, f: &F, y: &Array1<f64>, t: f64, h: f64) -> OdeResult<(Array1<f64>, f64)>
    where
        F: Fn(&Array1<f64>, f64) -> Array1<f64>,
    {
        let k1 = f(y, t);
        let k2 = f(&(y + &(&k1 * (A2[0] * h))), t + C[0] * h);
        let k3 = f(&(y + &(&k1 * (A3[0] * h)) + &(&k2 * (A3[1] * h))), t + C[1] * h);
        let k4 = f(
            &(y + &(&k1 * (A4[0] * h)) + &(&k2 * (A4[1] * h)) + &(&k3 * (A4[2] * h))),
            t + C[2] * h,
        );
        let k5 = f(
            &(y + &(&k1 * (A5[0] * h))
                + &(&k2 * (A5[1] * h))
                + &(&k3 * (A5[2] * h))
                + &(&k4 * (A5[3] * h))),
            t + C[3] * h,
        );
        let k6 = f(
            &(y + &(&k1 * (A6[0] * h))
                + &(&k2 * (A6[1] * h))
                + &(&k3 * (A6[2] * h))
                + &(&k4 * (A6[3] * h))
                + &(&k5 * (A6[4] * h))),
            t + C[4] * h,
        );

        let y5 = y
            + &(&k1 * (B5[0] * h))
            + &(&k3 * (B5[2] * h))
            + &(&k4 * (B5[3] * h))
            + &(&k5 * (B5[4] * h))
            + &(&k6 * (B5[5] * h));
        let k7 = f(&y5, t + C[5] * h);
        let y4 = y
            + &(&k1 * (B4[0] * h))
            + &(&k3 * (B4[2] * h))
            + &(&k4 * (B4[3] * h))
            + &(&k5 * (B4[4] * h))
            + &(&k6 * (B4[5] * h))
            + &(&k7 * (B4[6] * h));

        let mut sum_sq = 0.0;
        for i in 0..y.len() {
            if !y5[i].is_finite() {
                return Err(OdeError::NonFiniteDerivative { t });
            }
            let scale = self.opts.atol + self.opts.rtol * y[i].abs().max(y5[i].abs());
            let e = (y5[i] - y4[i]) / scale;
            sum_sq += e * e;
        }
        let err = (sum_sq / y.len() as f64).sqrt();
        if !err.is_finite() {
            return Err(OdeError::NonFiniteDerivative { t });
        }
        Ok((y5, err.max(1e-10)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // The stepper reproduces exponential decay to well within tolerance.
    //
    // Given
    // -----
    // - dy/dt = -0.5 y, y(0) = 1, integrated over [0, 10].
    //
    // Expect
    // ------
    // - |y(10) - exp(-5)| < 1e-8.
    fn exponential_decay_matches_closed_form() {
        let solver = DormandPrince54::new(StepperOptions::default());
        let y = solver
            .integrate(|y, _t| y * -0.5, array![1.0], 0.0, 10.0)
            .expect("integration should succeed");
        assert!((y[0] - (-5.0f64).exp()).abs() < 1e-8);
    }

    #[test]
    // Purpose
    // -------
    // Logistic growth (a nonlinear RHS of the same Bernoulli family as the
    // unsampled-probability ODE) matches its closed form.
    //
    // Given
    // -----
    // - dy/dt = y (1 - y), y(0) = 0.1, over [0, 5].
    //
    // Expect
    // ------
    // - y(5) = 1 / (1 + 9 e^{-5}) to 1e-8.
    fn logistic_growth_matches_closed_form() {
        let solver = DormandPrince54::new(StepperOptions::default());
        let y = solver
            .integrate(|y, _t| array![y[0] * (1.0 - y[0])], array![0.1], 0.0, 5.0)
            .expect("integration should succeed");
        let expected = 1.0 / (1.0 + 9.0 * (-5.0f64).exp());
        assert!((y[0] - expected).abs() < 1e-8);
    }

    #[test]
    // Purpose
    // -------
    // Dense output writes row 0 exactly and hits every grid point as an
    // integration endpoint.
    fn dense_grid_starts_exact_and_tracks_solution() {
        let solver = DormandPrince54::new(StepperOptions::default());
        let grid = Array1::linspace(0.0, 2.0, 201);
        let out = solver
            .integrate_dense(|y, _t| y * -1.0, array![1.0], &grid)
            .expect("dense integration should succeed");
        assert_eq!(out[(0, 0)], 1.0);
        for (i, &tau) in grid.iter().enumerate() {
            assert!((out[(i, 0)] - (-tau).exp()).abs() < 1e-7);
        }
    }

    #[test]
    // Purpose
    // -------
    // Descending intervals are rejected; degenerate intervals are no-ops.
    fn interval_edge_cases() {
        let solver = DormandPrince54::new(StepperOptions::default());
        let bad = solver.integrate(|y, _t| y.clone(), array![1.0], 1.0, 0.0);
        assert!(matches!(bad, Err(OdeError::InvalidInterval { .. })));
        let same = solver.integrate(|y, _t| y.clone(), array![3.0], 1.0, 1.0).unwrap();
        assert_eq!(same[0], 3.0);
    }

    #[test]
    // Purpose
    // -------
    // An interval a few ulps wide integrates successfully instead of
    // underflowing: the step is clipped to the remainder, which is a
    // legitimate short step, not a controller failure.
    //
    // Given
    // -----
    // - dy/dt = -0.5 y over [2.0, 2.0 + 4e-16].
    //
    // Expect
    // ------
    // - Ok, with the state essentially unchanged.
    fn near_epsilon_interval_integrates() {
        let solver = DormandPrince54::new(StepperOptions::default());
        let t0 = 2.0;
        let t1 = 2.0 + 4.0e-16;
        let y = solver
            .integrate(|y, _t| y * -0.5, array![1.0], t0, t1)
            .expect("a few-ulp interval should integrate");
        assert!((y[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // A grid cell far narrower than the carried step does not collapse
    // the step-size guess for the cells after it: the controller update
    // after a remainder-clipped step keeps the carried size, so the cost
    // of the narrow cell is one extra step, not a slow regrow.
    //
    // Given
    // -----
    // - dy/dt = -0.5 y densely over [0, 1, 1 + 1e-9, 2] versus the same
    //   system over [0, 1, 2], counting RHS evaluations.
    //
    // Expect
    // ------
    // - Both runs match exp(-0.5 t) at the endpoint.
    // - The narrow cell costs at most a handful of extra evaluations.
    fn narrow_dense_cell_does_not_collapse_step_size() {
        use std::cell::Cell;

        let solver = DormandPrince54::new(StepperOptions::default());
        let count = |grid: &Array1<f64>| -> (usize, f64) {
            let evals = Cell::new(0usize);
            let out = solver
                .integrate_dense(
                    |y: &Array1<f64>, _t| {
                        evals.set(evals.get() + 1);
                        y * -0.5
                    },
                    array![1.0],
                    grid,
                )
                .expect("dense integration should succeed");
            (evals.get(), out[(grid.len() - 1, 0)])
        };

        let (evals_narrow, y_narrow) = count(&array![0.0, 1.0, 1.0 + 1e-9, 2.0]);
        let (evals_plain, y_plain) = count(&array![0.0, 1.0, 2.0]);
        assert!((y_narrow - (-1.0f64).exp()).abs() < 1e-7);
        assert!((y_plain - (-1.0f64).exp()).abs() < 1e-7);
        assert!(
            evals_narrow <= evals_plain + 30,
            "narrow cell cost {} evals versus {}",
            evals_narrow,
            evals_plain
        );
    }

    #[test]
    // Purpose
    // -------
    // Invalid options are rejected with descriptive errors.
    fn options_are_validated() {
        assert!(matches!(
            StepperOptions::new(0.0, 1e-12, 10),
            Err(OdeError::InvalidTolerance { name: "rtol", .. })
        ));
        assert!(matches!(
            StepperOptions::new(1e-8, f64::NAN, 10),
            Err(OdeError::InvalidTolerance { name: "atol", .. })
        ));
        assert!(matches!(StepperOptions::new(1e-8, 1e-12, 0), Err(OdeError::InvalidMaxSteps { .. })));
    }
}
