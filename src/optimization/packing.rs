//! Flat-vector codec between `MTBDParams` and optimizer space.
//!
//! Purpose:
//! Nelder-Mead walks a flat `Array1<f64>`; the likelihood engine wants a
//! structured rate bundle. `ParamCodec` is the explicit bijection between
//! the two, restricted to a caller-chosen set of free entries, with
//! per-entry box bounds used both for clipping candidates and for drawing
//! random restart points.
//!
//! Key behaviors:
//! - Packing order is fixed: free MU entries, then LA, then PSI, then RHO,
//!   each in the order the caller listed them.
//! - `unpack` never fails on a clipped vector: bounds keep every entry
//!   inside the range `MTBDParams::new` accepts.
//! - `clip` projects a candidate onto the box coordinate-wise.
//!
//! Invariants & assumptions:
//! - Rate bounds apply to MU, LA and PSI entries; probability bounds to RHO.
//! - MU free entries must be off-diagonal.
//! - `pack(unpack(theta)) == theta` for any in-bounds theta.
//!
//! Downstream usage:
//! - `crate::optimization::adapter` unpacks candidates per cost call.
//! - `crate::optimization::optimizer` uses the bounds for restart sampling
//!   and simplex construction.

use ndarray::Array1;

use crate::model::params::MTBDParams;
use crate::optimization::errors::{OptError, OptResult};

/// Default box for rate-type entries (MU, LA, PSI).
pub const RATE_BOUNDS: (f64, f64) = (1e-3, 1e2);

/// Default box for probability-type entries (RHO).
pub const PROB_BOUNDS: (f64, f64) = (1e-3, 1.0 - 1e-3);

/// Which entries of the bundle the optimizer may move.
///
/// Entries not listed stay frozen at the template's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeParams {
    /// Off-diagonal (row, col) entries of MU.
    pub mu: Vec<(usize, usize)>,
    /// (row, col) entries of LA.
    pub la: Vec<(usize, usize)>,
    /// Indices into PSI.
    pub psi: Vec<usize>,
    /// Indices into RHO.
    pub rho: Vec<usize>,
}

impl FreeParams {
    /// Frees every legal entry: all off-diagonal MU, all LA, all PSI, all RHO.
    pub fn all(m: usize) -> Self {
        let mut mu = Vec::with_capacity(m * m.saturating_sub(1));
        let mut la = Vec::with_capacity(m * m);
        for i in 0..m {
            for j in 0..m {
                if i != j {
                    mu.push((i, j));
                }
                la.push((i, j));
            }
        }
        FreeParams {
            mu,
            la,
            psi: (0..m).collect(),
            rho: (0..m).collect(),
        }
    }

    /// Total number of free coordinates.
    pub fn len(&self) -> usize {
        self.mu.len() + self.la.len() + self.psi.len() + self.rho.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-family box bounds applied to free coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// (lower, upper) for MU, LA and PSI entries.
    pub rate: (f64, f64),
    /// (lower, upper) for RHO entries.
    pub probability: (f64, f64),
}

impl Bounds {
    pub fn new(rate: (f64, f64), probability: (f64, f64)) -> OptResult<Self> {
        validate_pair("rate", rate)?;
        validate_pair("probability", probability)?;
        if probability.0 <= 0.0 || probability.1 >= 1.0 {
            return Err(OptError::InvalidBounds {
                family: "probability",
                lower: probability.0,
                upper: probability.1,
            });
        }
        if rate.0 < 0.0 {
            return Err(OptError::InvalidBounds {
                family: "rate",
                lower: rate.0,
                upper: rate.1,
            });
        }
        Ok(Bounds { rate, probability })
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            rate: RATE_BOUNDS,
            probability: PROB_BOUNDS,
        }
    }
}

fn validate_pair(family: &'static str, (lower, upper): (f64, f64)) -> OptResult<()> {
    if !lower.is_finite() || !upper.is_finite() || lower >= upper {
        return Err(OptError::InvalidBounds { family, lower, upper });
    }
    Ok(())
}

/// Bijection between a structured rate bundle and a flat optimizer vector.
#[derive(Debug, Clone)]
pub struct ParamCodec {
    template: MTBDParams,
    free: FreeParams,
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl ParamCodec {
    /// Builds a codec over `template` with the given free entries and bounds.
    ///
    /// Validates that every free index is in range and that no MU diagonal
    /// entry is freed.
    pub fn new(template: MTBDParams, free: FreeParams, bounds: Bounds) -> OptResult<Self> {
        if free.is_empty() {
            return Err(OptError::EmptyFreeSelection);
        }
        let m = template.m;
        for &(i, j) in &free.mu {
            if i >= m || j >= m {
                return Err(OptError::FreeIndexOutOfRange { family: "MU", row: i, col: j, m });
            }
            if i == j {
                return Err(OptError::DiagonalMuEntry { index: i });
            }
        }
        for &(i, j) in &free.la {
            if i >= m || j >= m {
                return Err(OptError::FreeIndexOutOfRange { family: "LA", row: i, col: j, m });
            }
        }
        for &k in &free.psi {
            if k >= m {
                return Err(OptError::FreeIndexOutOfRange { family: "PSI", row: k, col: 0, m });
            }
        }
        for &k in &free.rho {
            if k >= m {
                return Err(OptError::FreeIndexOutOfRange { family: "RHO", row: k, col: 0, m });
            }
        }

        let dim = free.len();
        let n_rates = free.mu.len() + free.la.len() + free.psi.len();
        let mut lower = Array1::zeros(dim);
        let mut upper = Array1::zeros(dim);
        for idx in 0..dim {
            let (lo, hi) = if idx < n_rates { bounds.rate } else { bounds.probability };
            lower[idx] = lo;
            upper[idx] = hi;
        }

        Ok(ParamCodec { template, free, lower, upper })
    }

    /// Number of free coordinates.
    pub fn dim(&self) -> usize {
        self.free.len()
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    pub fn template(&self) -> &MTBDParams {
        &self.template
    }

    /// Extracts the free entries of `params` into a flat vector.
    pub fn pack(&self, params: &MTBDParams) -> Array1<f64> {
        let mut theta = Array1::zeros(self.dim());
        let mut idx = 0;
        for &(i, j) in &self.free.mu {
            theta[idx] = params.mu[[i, j]];
            idx += 1;
        }
        for &(i, j) in &self.free.la {
            theta[idx] = params.la[[i, j]];
            idx += 1;
        }
        for &k in &self.free.psi {
            theta[idx] = params.psi[k];
            idx += 1;
        }
        for &k in &self.free.rho {
            theta[idx] = params.rho[k];
            idx += 1;
        }
        theta
    }

    /// Writes the free entries of `theta` over a copy of the template.
    ///
    /// `theta` must have been clipped first: out-of-range or non-finite
    /// entries would produce an invalid bundle.
    pub fn unpack(&self, theta: &Array1<f64>) -> OptResult<MTBDParams> {
        if theta.len() != self.dim() {
            return Err(OptError::ThetaLengthMismatch {
                expected: self.dim(),
                actual: theta.len(),
            });
        }
        let mut mu = self.template.mu.clone();
        let mut la = self.template.la.clone();
        let mut psi = self.template.psi.clone();
        let mut rho = self.template.rho.clone();
        let mut idx = 0;
        for &(i, j) in &self.free.mu {
            mu[[i, j]] = theta[idx];
            idx += 1;
        }
        for &(i, j) in &self.free.la {
            la[[i, j]] = theta[idx];
            idx += 1;
        }
        for &k in &self.free.psi {
            psi[k] = theta[idx];
            idx += 1;
        }
        for &k in &self.free.rho {
            rho[k] = theta[idx];
            idx += 1;
        }
        Ok(MTBDParams::new(mu, la, psi, rho, self.template.t)?)
    }

    /// Projects `theta` onto the box, coordinate-wise.
    pub fn clip(&self, theta: &Array1<f64>) -> Array1<f64> {
        let mut clipped = theta.clone();
        for idx in 0..clipped.len().min(self.dim()) {
            clipped[idx] = clipped[idx].clamp(self.lower[idx], self.upper[idx]);
        }
        clipped
    }
}
