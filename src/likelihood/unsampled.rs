//! Unsampled-lineage probability table (the U-engine).
//!
//! Purpose
//! -------
//! Integrate, once per parameter bundle, the probability `U_k(τ)` that a
//! lineage in state `k` with `τ` time units left before the end of the
//! sampling window produces **no sampled descendant**:
//!
//! `dU_k/dτ = −(SIGMA_k − (LA·U)_k)·U_k + (MU·U)_k + PSI_k·(1 − RHO_k)`
//!
//! with `U(0) = (1, …, 1)`, over a fixed ascending dense grid on
//! `[0, T]`. The table is immutable once built and shared read-only by
//! every branch integration for that bundle.
//!
//! Key behaviors
//! -------------
//! - Dense adaptive integration with exact values at every grid point.
//! - Post-integration clamp of all values into `[0, 1]`; row 0 is the
//!   exact 1-vector.
//! - `query(τ)`: binary search for the bracketing samples and linear
//!   interpolation; exact table values at both grid endpoints.
//!
//! Invariants & assumptions
//! ------------------------
//! - `0 ≤ U_k(τ) ≤ 1` for all stored values.
//! - The grid is strictly ascending with `taus[0] = 0` and
//!   `taus[n−1] = T`.
//! - Grid resolution is a configuration concern (`EngineConfig`); the
//!   default keeps interpolation error far below the ~1e-4 relative
//!   precision the likelihood needs.
use crate::likelihood::config::EngineConfig;
use crate::likelihood::errors::{LikError, LikResult};
use crate::model::params::MTBDParams;
use crate::ode::solver::DormandPrince54;
use ndarray::{Array1, Array2};

/// Dense table of unsampled-lineage probabilities over reverse time.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsampledProbability {
    /// Ascending reverse-time grid over `[0, T]`.
    taus: Array1<f64>,
    /// One m-vector per grid point, `n × m`, every entry in `[0, 1]`.
    values: Array2<f64>,
}

impl UnsampledProbability {
    /// Build the table for one parameter bundle.
    ///
    /// # Errors
    /// [`LikError::UnsampledTableFailed`] if the dense integration fails;
    /// there is no bisection fallback at this level.
    pub fn build(params: &MTBDParams, cfg: &EngineConfig) -> LikResult<Self> {
        let sigma = params.sigma();
        let removal_floor = &params.psi * &(1.0 - &params.rho);
        let rhs = |u: &Array1<f64>, _tau: f64| -> Array1<f64> {
            let la_u = params.la.dot(u);
            let mu_u = params.mu.dot(u);
            -(&sigma - &la_u) * u + mu_u + &removal_floor
        };

        let taus = Array1::linspace(0.0, params.t, cfg.grid_points);
        let solver = DormandPrince54::new(cfg.stepper);
        let mut values = solver
            .integrate_dense(rhs, Array1::ones(params.m), &taus)
            .map_err(|source| LikError::UnsampledTableFailed { source })?;
        values.mapv_inplace(|v| v.clamp(0.0, 1.0));
        Ok(Self { taus, values })
    }

    /// Probability vector at reverse time `tau`, linearly interpolated
    /// between the bracketing grid samples. Queries are clamped to the
    /// grid range, so the endpoints return exact table rows.
    pub fn query(&self, tau: f64) -> Array1<f64> {
        let n = self.taus.len();
        if tau <= self.taus[0] {
            return self.values.row(0).to_owned();
        }
        if tau >= self.taus[n - 1] {
            return self.values.row(n - 1).to_owned();
        }
        // Index of the first grid point > tau; its predecessor brackets
        // from below.
        let upper = self
            .taus
            .as_slice()
            .expect("grid is contiguous")
            .partition_point(|&t| t <= tau);
        let lower = upper - 1;
        let (t0, t1) = (self.taus[lower], self.taus[upper]);
        let w = (tau - t0) / (t1 - t0);
        let row0 = self.values.row(lower);
        let row1 = self.values.row(upper);
        (1.0 - w) * &row0 + w * &row1
    }

    /// The `τ = T` row, used for the hidden-tree correction.
    pub fn at_horizon(&self) -> Array1<f64> {
        self.values.row(self.values.nrows() - 1).to_owned()
    }

    /// End of the reverse-time grid (the sampling window length).
    pub fn horizon(&self) -> f64 {
        self.taus[self.taus.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::likelihood::config::DEFAULT_SEED_SCALE;
    use crate::ode::solver::StepperOptions;
    use ndarray::{array, Array2};

    fn small_config(grid_points: usize) -> EngineConfig {
        EngineConfig::new(grid_points, DEFAULT_SEED_SCALE, 30, StepperOptions::default())
            .unwrap()
    }

    fn single_state(la: f64, psi: f64, rho: f64, t: f64) -> MTBDParams {
        MTBDParams::new(
            Array2::zeros((1, 1)),
            array![[la]],
            array![psi],
            array![rho],
            t,
        )
        .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // U(0) is exactly the 1-vector and every stored value stays in [0, 1].
    fn table_starts_at_one_and_stays_in_unit_interval() {
        let params = MTBDParams::new(
            array![[0.0, 0.2], [0.3, 0.0]],
            array![[0.8, 0.1], [0.0, 1.2]],
            array![0.4, 0.6],
            array![0.5, 0.9],
            5.0,
        )
        .unwrap();
        let table = UnsampledProbability::build(&params, &small_config(2_001)).unwrap();
        let at_zero = table.query(0.0);
        assert_eq!(at_zero, array![1.0, 1.0]);
        for tau in [0.0, 0.37, 1.0, 2.5, 4.99, 5.0] {
            let u = table.query(tau);
            assert!(u.iter().all(|&v| (0.0..=1.0).contains(&v)), "U({tau}) out of range");
        }
    }

    #[test]
    // Purpose
    // -------
    // With rho = 1 the single-state U has the closed form
    // U(tau) = (la + psi) / (la + psi * exp((la + psi) * tau)).
    //
    // Given
    // -----
    // - la = 2, psi = 1, rho = 1, T = 3.
    //
    // Expect
    // ------
    // - Table queries match the closed form to 1e-6 at interior points.
    fn single_state_full_sampling_matches_closed_form() {
        let (la, psi) = (2.0, 1.0);
        let params = single_state(la, psi, 1.0, 3.0);
        let table = UnsampledProbability::build(&params, &small_config(3_001)).unwrap();
        let a = la + psi;
        for tau in [0.1, 0.5, 1.0, 2.0, 2.9] {
            let expected = a / (la + psi * (a * tau).exp());
            let got = table.query(tau)[0];
            assert!(
                (got - expected).abs() < 1e-6,
                "tau = {tau}: got {got}, expected {expected}"
            );
        }
    }

    #[test]
    // Purpose
    // -------
    // Interpolated values lie componentwise between the bracketing grid
    // rows (the linear-interpolation bound of the numerical contract).
    fn interpolation_stays_between_bracketing_samples() {
        let params = single_state(1.5, 0.7, 0.8, 2.0);
        let cfg = small_config(101);
        let table = UnsampledProbability::build(&params, &cfg).unwrap();
        let step = 2.0 / 100.0;
        for cell in [3usize, 40, 77] {
            let (t0, t1) = (cell as f64 * step, (cell + 1) as f64 * step);
            let (u0, u1) = (table.query(t0)[0], table.query(t1)[0]);
            let mid = table.query(0.5 * (t0 + t1))[0];
            let (lo, hi) = if u0 <= u1 { (u0, u1) } else { (u1, u0) };
            assert!(mid >= lo - 1e-15 && mid <= hi + 1e-15);
        }
    }

    #[test]
    // Purpose
    // -------
    // Steady state (Scenario D): with MU = LA = 0 the closed form is
    // U(tau) = (1 - rho) + rho * exp(-psi * tau), so U(T) converges to
    // 1 - rho and stops moving as T grows.
    //
    // Given
    // -----
    // - psi = 1, rho = 0.6, horizons T = 40 and T = 80.
    //
    // Expect
    // ------
    // - Both horizon values equal 1 - rho = 0.4 to 1e-9.
    fn steady_state_is_reached_and_horizon_independent() {
        let mut horizon_values = Vec::new();
        for t in [40.0, 80.0] {
            let params = single_state(0.0, 1.0, 0.6, t);
            let table = UnsampledProbability::build(&params, &small_config(4_001)).unwrap();
            horizon_values.push(table.at_horizon()[0]);
        }
        assert!((horizon_values[0] - 0.4).abs() < 1e-9);
        assert!((horizon_values[1] - 0.4).abs() < 1e-9);
        assert!((horizon_values[0] - horizon_values[1]).abs() < 1e-9);
    }
}
