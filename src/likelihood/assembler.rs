//! Forest log-likelihood assembly.
//!
//! Purpose
//! -------
//! Combine per-node branch transition vectors into one scalar
//! log-likelihood for a forest under a parameter bundle: validate inputs,
//! build the shared U-table, fan out the branch integrations, walk each
//! tree post-order summing node contributions, and apply the hidden-tree
//! correction.
//!
//! Key behaviors
//! -------------
//! - Leaf in state `k` contributes `ln PSI_k + ln RHO_k`.
//! - Internal node in state `k` combines its children's scaled P-vectors
//!   through the symmetric transmission term, evaluated with a shared
//!   rescale exponent so neither side overflows
//!   (`ln(exp(a+s) + exp(b+s)) − s`).
//! - A root with a nonzero branch contributes `ln(π · P_root)`.
//! - Hidden-tree correction: with `hp = π · U(T)`, an unknown hidden-tree
//!   count is estimated as `n · hp / (1 − hp)` and contributes
//!   `u · ln(hp)` (zero when `u = 0`).
//! - NaN policy: any NaN arising from a degenerate log argument forces
//!   the total to exactly `−∞`; the assembler never returns NaN.
//!
//! Invariants & assumptions
//! ------------------------
//! - The returned value is always finite or exactly `−∞`.
//! - A fresh U-table and fresh P-vectors are built per call and dropped
//!   at its end; nothing is cached across evaluations.
use crate::likelihood::branch::{BranchIntegrator, BranchJob, ScaledVector};
use crate::likelihood::config::EngineConfig;
use crate::likelihood::errors::LikResult;
use crate::likelihood::frequencies::equilibrium_frequencies;
use crate::likelihood::unsampled::UnsampledProbability;
use crate::model::forest::Forest;
use crate::model::params::MTBDParams;
use ndarray::Array1;

/// Number of unobserved trees (process realizations with zero sampled
/// tips) to correct for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HiddenTrees {
    /// The hidden-tree count is known. Negative values are clamped to
    /// zero; a count cannot subtract probability mass.
    Known(f64),
    /// Estimate the count from the forest size and the hidden-tree
    /// probability.
    Estimate,
}

/// Log-likelihood of observing `forest` under `params`.
///
/// Returns a finite value or exactly `−∞`; the only `Err` paths are input
/// validation and a branch integration that fails to stabilize within the
/// configured bisection bound.
pub fn forest_loglikelihood(
    forest: &Forest, params: &MTBDParams, hidden: HiddenTrees, cfg: &EngineConfig,
) -> LikResult<f64> {
    forest.validate(params.m, params.t)?;

    let pi = equilibrium_frequencies(params);
    let table = UnsampledProbability::build(params, cfg)?;
    let integrator = BranchIntegrator::new(params, &table, *cfg);

    // One flat job list across the whole forest; tree t's nodes start at
    // offsets[t]. Each node is an independent branch integration.
    let mut jobs = Vec::with_capacity(forest.n_nodes());
    let mut offsets = Vec::with_capacity(forest.size());
    for tree in &forest.trees {
        offsets.push(jobs.len());
        for node in &tree.nodes {
            jobs.push(BranchJob {
                time: node.time,
                state: node.state,
                branch_start: node.branch_start(),
            });
        }
    }
    let vectors = integrator.compute_batch(&jobs)?;

    let mut total = 0.0;
    for (tree, &offset) in forest.trees.iter().zip(&offsets) {
        let tree_vectors = &vectors[offset..offset + tree.nodes.len()];
        for index in tree.post_order() {
            let node = &tree.nodes[index];
            total += match node.children {
                None => params.psi[node.state].ln() + params.rho[node.state].ln(),
                Some((left, right)) => transmission_term(
                    params,
                    node.state,
                    &tree_vectors[left],
                    &tree_vectors[right],
                ),
            };
            if tree.is_root(index) && node.branch_length > 0.0 {
                total += tree_vectors[index].log_dot(&pi);
            }
        }
    }

    total += hidden_tree_term(forest.size(), &pi, &table, hidden);

    // Degenerate log arguments surface as NaN; rank them as the worst
    // possible outcome rather than letting NaN escape.
    if total.is_nan() { Ok(f64::NEG_INFINITY) } else { Ok(total) }
}

// log( P_lc[k] * (LA_k · P_rc) + P_rc[k] * (LA_k · P_lc) ) for an internal
// node in state k, in log-space with a shared rescale exponent.
fn transmission_term(
    params: &MTBDParams, k: usize, left: &ScaledVector, right: &ScaledVector,
) -> f64 {
    let la_row = params.la.row(k).to_owned();
    let a = left.log_entry(k) + right.log_dot(&la_row);
    let b = right.log_entry(k) + left.log_dot(&la_row);
    log_add_exp(a, b)
}

// log(exp(a) + exp(b)) computed as log(exp(a+s) + exp(b+s)) − s with the
// rescale exponent s = −max(a, b), so the dominant term is exactly 1.
fn log_add_exp(a: f64, b: f64) -> f64 {
    let s = -a.max(b);
    if s == f64::INFINITY {
        // Both terms are zero probability.
        return f64::NEG_INFINITY;
    }
    ((a + s).exp() + (b + s).exp()).ln() - s
}

fn hidden_tree_term(
    forest_size: usize, pi: &Array1<f64>, table: &UnsampledProbability, hidden: HiddenTrees,
) -> f64 {
    let hp = pi.dot(&table.at_horizon());
    if hp >= 1.0 {
        // Every realization is hidden; the observed forest is impossible.
        return f64::NEG_INFINITY;
    }
    let hp = hp.max(0.0);
    let u = match hidden {
        HiddenTrees::Known(u) => u.max(0.0),
        HiddenTrees::Estimate => forest_size as f64 * hp / (1.0 - hp),
    };
    if u == 0.0 { 0.0 } else { u * hp.ln() }
}
