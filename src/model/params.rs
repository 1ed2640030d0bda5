//! MTBD parameter bundle.
//!
//! Purpose
//! -------
//! Provide the validated **model-space** parameter container [`MTBDParams`]
//! holding the rate matrices and sampling parameters of a multi-type
//! birth-death-sampling process, plus derived quantities used by the
//! likelihood engine.
//!
//! Key behaviors
//! -------------
//! - Validate all structural and numeric invariants at construction time
//!   (shapes, finiteness, non-negativity, probability ranges).
//! - Compute the total per-state event rate `SIGMA` on demand.
//!
//! Invariants & assumptions
//! ------------------------
//! - `mu` and `la` are `m × m`; `psi` and `rho` have length `m`.
//! - All rates are finite and non-negative; `mu` has a zero diagonal
//!   (state transitions are off-diagonal only).
//! - Each `rho[i]` lies in `[0, 1]`; `t` is finite and strictly positive.
//! - A bundle is created fresh for every likelihood evaluation and is
//!   immutable for its lifetime; derived tables borrow it read-only.
//!
//! Conventions
//! -----------
//! - `mu[i][j]`: transition rate from state `i` to state `j` (`i ≠ j`).
//! - `la[i][j]`: transmission rate of an `i`-lineage producing a `j`-lineage.
//! - `psi[i]`: removal rate of state `i`; `rho[i]`: probability a removal
//!   of state `i` is sampled.
//! - `t`: end of the sampling window; node times live in `[0, t]` and the
//!   engine works in reverse time `τ = t − time`.
use crate::model::errors::{ModelError, ModelResult};
use ndarray::{Array1, Array2};

/// Validated parameter bundle for an m-type birth-death-sampling process.
///
/// Construct through [`MTBDParams::new`]; on success every invariant listed
/// in the module documentation holds and downstream code relies on it
/// without re-checking.
#[derive(Debug, Clone, PartialEq)]
pub struct MTBDParams {
    /// Number of lineage types (states).
    pub m: usize,
    /// Off-diagonal state-transition rates, `m × m`, zero diagonal.
    pub mu: Array2<f64>,
    /// Transmission rates, `m × m`.
    pub la: Array2<f64>,
    /// Removal rates, length `m`.
    pub psi: Array1<f64>,
    /// Sampling-given-removal probabilities, length `m`, each in [0, 1].
    pub rho: Array1<f64>,
    /// End of the sampling window.
    pub t: f64,
}

impl MTBDParams {
    /// Create a validated parameter bundle.
    ///
    /// Validates:
    /// - `m >= 1` and all container shapes agree with `m`,
    /// - every entry of `mu`, `la`, `psi` is finite and `>= 0`,
    /// - `mu` has a zero diagonal,
    /// - every `rho[i]` is finite and in `[0, 1]`,
    /// - `t` is finite and `> 0`.
    ///
    /// # Errors
    /// Returns the first violated constraint as a [`ModelError`].
    pub fn new(
        mu: Array2<f64>, la: Array2<f64>, psi: Array1<f64>, rho: Array1<f64>, t: f64,
    ) -> ModelResult<Self> {
        let m = psi.len();
        if m == 0 {
            return Err(ModelError::EmptyStateSpace);
        }
        if mu.dim() != (m, m) {
            return Err(ModelError::MuShapeMismatch { expected: m, found: mu.dim() });
        }
        if la.dim() != (m, m) {
            return Err(ModelError::LaShapeMismatch { expected: m, found: la.dim() });
        }
        if rho.len() != m {
            return Err(ModelError::RhoLengthMismatch { expected: m, actual: rho.len() });
        }
        validate_rate_matrix("MU", &mu)?;
        validate_rate_matrix("LA", &la)?;
        for i in 0..m {
            if mu[(i, i)] != 0.0 {
                return Err(ModelError::NonZeroMuDiagonal { index: i, value: mu[(i, i)] });
            }
        }
        for (i, &v) in psi.iter().enumerate() {
            if !v.is_finite() || v < 0.0 {
                return Err(ModelError::InvalidRate { matrix: "PSI", row: i, col: 0, value: v });
            }
        }
        for (i, &v) in rho.iter().enumerate() {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(ModelError::InvalidSamplingProbability { index: i, value: v });
            }
        }
        if !t.is_finite() || t <= 0.0 {
            return Err(ModelError::InvalidHorizon { value: t });
        }
        Ok(Self { m, mu, la, psi, rho, t })
    }

    /// Total event rate out of each state:
    /// `SIGMA[i] = Σ_j MU[i, j] + Σ_j LA[i, j] + PSI[i]`.
    pub fn sigma(&self) -> Array1<f64> {
        let mut sigma = self.psi.clone();
        for i in 0..self.m {
            sigma[i] += self.mu.row(i).sum() + self.la.row(i).sum();
        }
        sigma
    }

    /// The uniform type distribution `1/m`, used as the equilibrium
    /// fallback and the Newton seed.
    pub fn uniform_frequencies(&self) -> Array1<f64> {
        Array1::from_elem(self.m, 1.0 / self.m as f64)
    }
}

fn validate_rate_matrix(name: &'static str, rates: &Array2<f64>) -> ModelResult<()> {
    for ((row, col), &value) in rates.indexed_iter() {
        if !value.is_finite() || value < 0.0 {
            return Err(ModelError::InvalidRate { matrix: name, row, col, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_state_bundle() -> MTBDParams {
        MTBDParams::new(
            array![[0.0, 0.3], [0.2, 0.0]],
            array![[1.0, 0.1], [0.0, 0.8]],
            array![0.5, 0.4],
            array![0.6, 0.7],
            10.0,
        )
        .expect("bundle should validate")
    }

    #[test]
    // Purpose
    // -------
    // Verify that sigma() sums transition, transmission, and removal rates
    // row-wise.
    //
    // Given
    // -----
    // - The two-state bundle above.
    //
    // Expect
    // ------
    // - sigma[0] = 0.3 + 1.0 + 0.1 + 0.5 = 1.9
    // - sigma[1] = 0.2 + 0.8 + 0.4 = 1.4
    fn sigma_sums_all_event_rates() {
        let params = two_state_bundle();
        let sigma = params.sigma();
        assert!((sigma[0] - 1.9).abs() < 1e-12);
        assert!((sigma[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Reject a MU matrix with a non-zero diagonal: transition rates are
    // off-diagonal only.
    fn nonzero_mu_diagonal_is_rejected() {
        let result = MTBDParams::new(
            array![[0.1, 0.3], [0.2, 0.0]],
            Array2::zeros((2, 2)),
            array![0.5, 0.4],
            array![0.6, 0.7],
            10.0,
        );
        assert_eq!(result, Err(ModelError::NonZeroMuDiagonal { index: 0, value: 0.1 }));
    }

    #[test]
    // Purpose
    // -------
    // Reject sampling probabilities outside [0, 1] and negative rates.
    fn out_of_range_inputs_are_rejected() {
        let bad_rho = MTBDParams::new(
            Array2::zeros((1, 1)),
            array![[1.0]],
            array![0.5],
            array![1.5],
            10.0,
        );
        assert!(matches!(bad_rho, Err(ModelError::InvalidSamplingProbability { .. })));

        let bad_rate = MTBDParams::new(
            Array2::zeros((1, 1)),
            array![[-1.0]],
            array![0.5],
            array![0.5],
            10.0,
        );
        assert!(matches!(bad_rate, Err(ModelError::InvalidRate { matrix: "LA", .. })));

        let bad_horizon = MTBDParams::new(
            Array2::zeros((1, 1)),
            array![[1.0]],
            array![0.5],
            array![0.5],
            0.0,
        );
        assert!(matches!(bad_horizon, Err(ModelError::InvalidHorizon { .. })));
    }

    #[test]
    // Purpose
    // -------
    // The uniform fallback distribution has equal entries summing to one.
    fn uniform_frequencies_sum_to_one() {
        let params = two_state_bundle();
        let pi = params.uniform_frequencies();
        assert_eq!(pi.len(), 2);
        assert!((pi.sum() - 1.0).abs() < 1e-12);
        assert!((pi[0] - 0.5).abs() < 1e-12);
    }
}
