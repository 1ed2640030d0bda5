//! Equilibrium type-frequency solver.
//!
//! Purpose
//! -------
//! Compute the stationary type distribution π of the multi-type process
//! from its rate matrices: one normalization constraint plus `m − 1`
//! balance equations `π_k · Σ_out(k) = Σ_j π_j · (MU[j,k] + LA[j,k])`,
//! where `Σ_out(k) = Σ_j MU[k,j] + Σ_j LA[k,j]`.
//!
//! Key behaviors
//! -------------
//! - Newton iteration seeded at the uniform distribution; the Jacobian is
//!   taken by central finite differences and each step is solved with a
//!   dense LU factorization.
//! - Silent degradation: any failure — singular Jacobian, non-convergence,
//!   an entry outside `[0, 1]`, a sum away from 1 — discards the solution
//!   and returns the uniform distribution `1/m`. An invalid π is never
//!   propagated downstream.
//!
//! Conventions
//! -----------
//! - `m == 1` short-circuits to `[1.0]`.
//! - This module is the only consumer of `nalgebra`; the bridge copies an
//!   `ndarray` Jacobian into a `DMatrix` for the solve and copies the
//!   step back.
use crate::model::params::MTBDParams;
use finitediff::FiniteDiff;
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;

const MAX_NEWTON_ITERS: usize = 50;
const RESIDUAL_TOL: f64 = 1e-12;
// Entries this far outside [0, 1] are treated as rounding, not degeneracy.
const RANGE_SLACK: f64 = 1e-9;

/// Equilibrium type distribution π for a parameter bundle.
///
/// Always returns a valid distribution: each entry in `[0, 1]`, summing
/// to 1. Degenerate solves fall back to the uniform distribution.
pub fn equilibrium_frequencies(params: &MTBDParams) -> Array1<f64> {
    if params.m == 1 {
        return Array1::ones(1);
    }
    match newton_solve(params) {
        Some(pi) if is_valid_distribution(&pi) => clamp_distribution(pi),
        _ => params.uniform_frequencies(),
    }
}

// Residual of the balance system at pi. Row 0 is the normalization
// constraint; rows 1..m are the balance equations.
fn balance_residual(params: &MTBDParams, pi: &Array1<f64>) -> Array1<f64> {
    let m = params.m;
    let mut res = Array1::zeros(m);
    res[0] = pi.sum() - 1.0;
    for k in 1..m {
        let out_rate: f64 = params.mu.row(k).sum() + params.la.row(k).sum();
        let inflow: f64 =
            (0..m).map(|j| pi[j] * (params.mu[(j, k)] + params.la[(j, k)])).sum();
        res[k] = pi[k] * out_rate - inflow;
    }
    res
}

fn newton_solve(params: &MTBDParams) -> Option<Array1<f64>> {
    let m = params.m;
    let residual = |pi: &Array1<f64>| balance_residual(params, pi);
    let mut pi = params.uniform_frequencies();
    for _ in 0..MAX_NEWTON_ITERS {
        let res = residual(&pi);
        if res.iter().all(|v| v.abs() < RESIDUAL_TOL) {
            return Some(pi);
        }
        if res.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let jac = pi.central_jacobian(&residual);
        let lhs = DMatrix::from_fn(m, m, |i, j| jac[(i, j)]);
        let rhs = DVector::from_iterator(m, res.iter().map(|v| -v));
        let step = lhs.lu().solve(&rhs)?;
        for (i, s) in step.iter().enumerate() {
            if !s.is_finite() {
                return None;
            }
            pi[i] += s;
        }
    }
    // One last residual check in case the final step converged exactly.
    let res = residual(&pi);
    if res.iter().all(|v| v.abs() < RESIDUAL_TOL) { Some(pi) } else { None }
}

fn is_valid_distribution(pi: &Array1<f64>) -> bool {
    pi.iter().all(|&v| v.is_finite() && v >= -RANGE_SLACK && v <= 1.0 + RANGE_SLACK)
        && (pi.sum() - 1.0).abs() < 1e-6
}

fn clamp_distribution(mut pi: Array1<f64>) -> Array1<f64> {
    pi.mapv_inplace(|v| v.clamp(0.0, 1.0));
    pi
}
