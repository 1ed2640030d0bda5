//! Branch transition integrator (the P-engine).
//!
//! Purpose
//! -------
//! For one tree node whose branch spans absolute times `[t0, ti]` and ends
//! in state `l`, compute the transition vector `P(t0)` given
//! `P(ti) = one-hot(l)` by integrating, in ascending reverse time
//! `τ = T − t`,
//!
//! `dP_k/dτ = −(SIGMA_k − (LA·U(τ))_k)·P_k + (MU·P)_k + U_k(τ)·(LA·P)_k`
//!
//! where `U(τ)` comes from the shared [`UnsampledProbability`] table.
//!
//! Key behaviors
//! -------------
//! - Rescale discipline: the one-hot seed is scaled by
//!   `EngineConfig::seed_scale` and the cumulative factor is tracked in
//!   log-space, so callers combine values without premature
//!   renormalization. The true vector is `p · exp(−log_scale)`.
//! - Stability discipline: a sub-integration whose result is non-finite,
//!   carries no positive mass, or grows past the seed scale is retried by
//!   bisecting the τ-interval at its midpoint, renormalizing the midpoint
//!   solution back to the seed scale, and integrating the halves — with an
//!   explicit depth bound, after which
//!   [`LikError::NonconvergentIntegration`] is raised.
//! - Zero-length branches, and branches whose τ-span is within a few ulps
//!   of zero, return the exact one-hot vector, no integration.
//! - Batch entry point: an embarrassingly parallel fan-out over
//!   independent nodes sharing the read-only U-table; batch results carry
//!   the same tracked log-scale as the single-node path.
//!
//! Invariants & assumptions
//! ------------------------
//! - The U-table and parameter bundle outlive the integrator and are never
//!   mutated while it is alive.
//! - The max-norm of the true solution is non-increasing in τ (the
//!   generator is sub-conservative), so a result above the seed scale
//!   signals numerical trouble rather than genuine growth.
use crate::likelihood::config::EngineConfig;
use crate::likelihood::errors::{LikError, LikResult};
use crate::likelihood::unsampled::UnsampledProbability;
use crate::model::params::MTBDParams;
use crate::ode::solver::DormandPrince54;
use ndarray::Array1;
use rayon::prelude::*;

// Tolerated relative overshoot above the seed scale before a result is
// declared unstable.
const SCALE_SLACK: f64 = 1e-6;

// A sub-integration that decays more than this many orders below the seed
// scale has outrun the stepper's absolute error floor; bisecting keeps each
// segment within a well-conditioned dynamic range.
const DECAY_FLOOR: f64 = 1e-8;

// A tau-span at most this many ulps of its endpoint is treated as
// zero-length: no step-size controller can resolve it, and bisection only
// shrinks it further. The transition over such a span is the identity to
// working precision.
const SPAN_FLOOR_ULPS: f64 = 32.0;

/// A branch-integration job: `(ti, l, t0)` in the notation above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchJob {
    /// Absolute time at the end of the branch.
    pub time: f64,
    /// State label at the end of the branch.
    pub state: usize,
    /// Absolute time at the start of the branch.
    pub branch_start: f64,
}

/// A P-vector with its accumulated log-scale; the true value is
/// `p · exp(−log_scale)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledVector {
    pub p: Array1<f64>,
    pub log_scale: f64,
}

impl ScaledVector {
    /// Natural log of the true entry `k`, i.e. `ln p[k] − log_scale`.
    /// `−inf` for a zero entry, NaN for a negative one (the assembler's
    /// NaN policy handles the latter).
    pub fn log_entry(&self, k: usize) -> f64 {
        self.p[k].ln() - self.log_scale
    }

    /// Natural log of the true dot product with `weights`.
    pub fn log_dot(&self, weights: &Array1<f64>) -> f64 {
        weights.dot(&self.p).ln() - self.log_scale
    }
}

/// Per-bundle branch integrator sharing one read-only U-table.
#[derive(Debug, Clone)]
pub struct BranchIntegrator<'a> {
    params: &'a MTBDParams,
    table: &'a UnsampledProbability,
    cfg: EngineConfig,
    sigma: Array1<f64>,
    solver: DormandPrince54,
}

impl<'a> BranchIntegrator<'a> {
    pub fn new(
        params: &'a MTBDParams, table: &'a UnsampledProbability, cfg: EngineConfig,
    ) -> Self {
        let sigma = params.sigma();
        let solver = DormandPrince54::new(cfg.stepper);
        Self { params, table, cfg, sigma, solver }
    }

    /// Compute the scaled P-vector for one node.
    ///
    /// `P(ti) = one-hot(state)` exactly when `t0 == ti` (no integration,
    /// zero log-scale).
    ///
    /// # Errors
    /// [`LikError::NonconvergentIntegration`] when the bisection depth
    /// bound is exhausted.
    pub fn compute(&self, job: BranchJob) -> LikResult<ScaledVector> {
        let mut p = Array1::zeros(self.params.m);
        p[job.state] = 1.0;
        if job.branch_start >= job.time {
            return Ok(ScaledVector { p, log_scale: 0.0 });
        }
        let tau0 = self.params.t - job.time;
        let tau1 = self.params.t - job.branch_start;
        if tau1 - tau0 <= SPAN_FLOOR_ULPS * f64::EPSILON * tau1.abs().max(1.0) {
            return Ok(ScaledVector { p, log_scale: 0.0 });
        }
        let scale = self.cfg.seed_scale;
        let seed = p * scale;
        let (p, log_scale) =
            self.integrate_stable(tau0, tau1, seed, scale.ln(), job.state, 0)?;
        Ok(ScaledVector { p, log_scale })
    }

    /// Compute scaled P-vectors for a whole forest's nodes in one parallel
    /// fan-out. Each job is independent; the only shared data — the
    /// U-table and the parameter bundle — is read-only.
    pub fn compute_batch(&self, jobs: &[BranchJob]) -> LikResult<Vec<ScaledVector>> {
        jobs.par_iter().map(|&job| self.compute(job)).collect()
    }

    // Right-hand side of the branch ODE at reverse time tau.
    fn rhs(&self, p: &Array1<f64>, tau: f64) -> Array1<f64> {
        let u = self.table.query(tau);
        let la_u = self.params.la.dot(&u);
        let la_p = self.params.la.dot(p);
        let mu_p = self.params.mu.dot(p);
        -(&self.sigma - &la_u) * p + mu_p + u * la_p
    }

    // Integrate [tau0, tau1] from `seed`, bisecting on instability. The
    // seed's max-norm equals the configured scale (up to the first call's
    // exact one-hot·scale); each midpoint handoff renormalizes back to it
    // and folds the ratio into `log_scale`.
    fn integrate_stable(
        &self, tau0: f64, tau1: f64, seed: Array1<f64>, log_scale: f64, state: usize,
        depth: usize,
    ) -> LikResult<(Array1<f64>, f64)> {
        let attempt =
            self.solver.integrate(|p, tau| self.rhs(p, tau), seed.clone(), tau0, tau1);
        if let Ok(mut y) = attempt {
            if self.is_stable(&y) {
                y.mapv_inplace(|v| v.max(0.0));
                return Ok((y, log_scale));
            }
        }
        if depth >= self.cfg.max_bisections {
            return Err(LikError::NonconvergentIntegration {
                tau0,
                tau1,
                state,
                max_bisections: self.cfg.max_bisections,
            });
        }
        let mid = 0.5 * (tau0 + tau1);
        let (y_mid, ls_mid) =
            self.integrate_stable(tau0, mid, seed, log_scale, state, depth + 1)?;
        let (reseeded, ls) = self.renormalize(y_mid, ls_mid);
        self.integrate_stable(mid, tau1, reseeded, ls, state, depth + 1)
    }

    fn is_stable(&self, y: &Array1<f64>) -> bool {
        let mut max = f64::NEG_INFINITY;
        for &v in y {
            if !v.is_finite() {
                return false;
            }
            max = max.max(v);
        }
        max >= self.cfg.seed_scale * DECAY_FLOOR
            && max <= self.cfg.seed_scale * (1.0 + SCALE_SLACK)
    }

    // Rescale an intermediate solution so its max equals the seed scale,
    // accounting for the factor in log-space.
    fn renormalize(&self, mut y: Array1<f64>, log_scale: f64) -> (Array1<f64>, f64) {
        let max = y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let factor = self.cfg.seed_scale / max;
        y *= factor;
        (y, log_scale + factor.ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::likelihood::config::DEFAULT_SEED_SCALE;
    use crate::ode::solver::StepperOptions;
    use ndarray::{array, Array2};

    fn config(grid_points: usize) -> EngineConfig {
        EngineConfig::new(grid_points, DEFAULT_SEED_SCALE, 30, StepperOptions::default())
            .unwrap()
    }

    fn engine(params: &MTBDParams, cfg: &EngineConfig) -> UnsampledProbability {
        UnsampledProbability::build(params, cfg).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // A zero-length branch returns the exact one-hot vector with zero
    // log-scale and performs no integration.
    fn zero_length_branch_is_one_hot() {
        let params = MTBDParams::new(
            array![[0.0, 0.2], [0.1, 0.0]],
            array![[1.0, 0.0], [0.0, 0.9]],
            array![0.5, 0.5],
            array![0.5, 0.5],
            4.0,
        )
        .unwrap();
        let cfg = config(501);
        let table = engine(&params, &cfg);
        let integrator = BranchIntegrator::new(&params, &table, cfg);
        let out = integrator
            .compute(BranchJob { time: 2.0, state: 1, branch_start: 2.0 })
            .unwrap();
        assert_eq!(out.p, array![0.0, 1.0]);
        assert_eq!(out.log_scale, 0.0);
    }

    #[test]
    // Purpose
    // -------
    // With LA = MU = 0 the branch ODE collapses to dP/dtau = -psi P, so
    // the true P after a branch of length d is exp(-psi d) at the seeded
    // state and 0 elsewhere.
    //
    // Given
    // -----
    // - psi = 0.8, branch from t0 = 1 to ti = 3 (d = 2), T = 5.
    //
    // Expect
    // ------
    // - log_entry(state) = -psi * d to 1e-8; the other entry stays 0.
    fn pure_removal_branch_matches_closed_form() {
        let params = MTBDParams::new(
            Array2::zeros((2, 2)),
            Array2::zeros((2, 2)),
            array![0.8, 0.8],
            array![0.5, 0.5],
            5.0,
        )
        .unwrap();
        let cfg = config(501);
        let table = engine(&params, &cfg);
        let integrator = BranchIntegrator::new(&params, &table, cfg);
        let out = integrator
            .compute(BranchJob { time: 3.0, state: 0, branch_start: 1.0 })
            .unwrap();
        assert!((out.log_entry(0) - (-0.8 * 2.0)).abs() < 1e-8);
        assert_eq!(out.p[1], 0.0);
    }

    #[test]
    // Purpose
    // -------
    // The batch fan-out agrees exactly with the single-node path on every
    // job (same rescaling discipline on both).
    fn batch_matches_single_path() {
        let params = MTBDParams::new(
            array![[0.0, 0.3], [0.2, 0.0]],
            array![[0.9, 0.1], [0.0, 0.7]],
            array![0.4, 0.6],
            array![0.7, 0.5],
            6.0,
        )
        .unwrap();
        let cfg = config(2_001);
        let table = engine(&params, &cfg);
        let integrator = BranchIntegrator::new(&params, &table, cfg);
        let jobs = vec![
            BranchJob { time: 5.5, state: 0, branch_start: 3.0 },
            BranchJob { time: 4.0, state: 1, branch_start: 0.5 },
            BranchJob { time: 3.0, state: 1, branch_start: 3.0 },
            BranchJob { time: 2.0, state: 0, branch_start: 0.0 },
        ];
        let batch = integrator.compute_batch(&jobs).unwrap();
        for (job, from_batch) in jobs.iter().zip(&batch) {
            let single = integrator.compute(*job).unwrap();
            assert_eq!(single, *from_batch);
        }
    }

    #[test]
    // Purpose
    // -------
    // The scaled representation recovers a value whose raw magnitude
    // underflows f64: with LA = 0 the branch decays as exp(-psi * d), and
    // for psi = 30, d = 38 that is exp(-1140), representable only through
    // the tracked log-scale (the bisection discipline splits the branch
    // into well-conditioned segments).
    fn long_branch_stays_finite_in_log_space() {
        let params = MTBDParams::new(
            Array2::zeros((1, 1)),
            Array2::zeros((1, 1)),
            array![30.0],
            array![0.9],
            40.0,
        )
        .unwrap();
        let cfg = config(4_001);
        let table = engine(&params, &cfg);
        let integrator = BranchIntegrator::new(&params, &table, cfg);
        let out = integrator
            .compute(BranchJob { time: 39.0, state: 0, branch_start: 1.0 })
            .unwrap();
        let log_p = out.log_entry(0);
        assert!(log_p.is_finite());
        assert!((log_p - (-30.0 * 38.0)).abs() < 1e-4);
    }

    #[test]
    // Purpose
    // -------
    // A branch a few ulps long is treated as zero-length: the one-hot
    // vector comes back unchanged instead of the stepper underflowing and
    // the bisection bound exhausting on an interval it can never resolve.
    //
    // Given
    // -----
    // - branch_start = 2.0 - 1e-13, time = 2.0, T = 4.
    //
    // Expect
    // ------
    // - Ok with the exact one-hot vector and zero log-scale.
    fn near_epsilon_branch_is_one_hot() {
        let params = MTBDParams::new(
            array![[0.0, 0.2], [0.1, 0.0]],
            array![[1.0, 0.0], [0.0, 0.9]],
            array![0.5, 0.5],
            array![0.5, 0.5],
            4.0,
        )
        .unwrap();
        let cfg = config(501);
        let table = engine(&params, &cfg);
        let integrator = BranchIntegrator::new(&params, &table, cfg);
        let out = integrator
            .compute(BranchJob { time: 2.0, state: 0, branch_start: 2.0 - 1e-13 })
            .unwrap();
        assert_eq!(out.p, array![1.0, 0.0]);
        assert_eq!(out.log_scale, 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Exhausting the bisection depth bound raises NonconvergentIntegration
    // carrying the configured bound, rather than panicking or returning a
    // garbage vector.
    //
    // Given
    // -----
    // - The long-branch parameters (psi = 30, d = 38, decay exp(-1140))
    //   with max_bisections = 1, far too shallow to keep each segment in a
    //   well-conditioned dynamic range.
    //
    // Expect
    // ------
    // - Err(NonconvergentIntegration { max_bisections: 1, .. }).
    fn bisection_exhaustion_reports_nonconvergence() {
        let params = MTBDParams::new(
            Array2::zeros((1, 1)),
            Array2::zeros((1, 1)),
            array![30.0],
            array![0.9],
            40.0,
        )
        .unwrap();
        let cfg = EngineConfig::new(4_001, DEFAULT_SEED_SCALE, 1, StepperOptions::default())
            .unwrap();
        let table = engine(&params, &cfg);
        let integrator = BranchIntegrator::new(&params, &table, cfg);
        let out = integrator.compute(BranchJob { time: 39.0, state: 0, branch_start: 1.0 });
        assert!(matches!(
            out,
            Err(LikError::NonconvergentIntegration { max_bisections: 1, .. })
        ));
    }
}
