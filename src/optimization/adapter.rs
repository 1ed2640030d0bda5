//! Adapter that exposes a forest likelihood as an `argmin` problem.
//!
//! We convert a *maximization* of the forest log-likelihood `ℓ(θ)` into a
//! *minimization* problem by defining the cost as `c(θ) = -ℓ(θ)`. Candidate
//! vectors are clipped onto the codec's box before evaluation, so the
//! simplex may wander outside the bounds without ever reaching the
//! likelihood engine with an illegal bundle.
//!
//! A failed candidate is not an error: a non-finite theta, a `-inf`
//! log-likelihood or an engine failure (say, a branch that refuses to
//! stabilize at that rate combination) all map to the flat `PENALTY_COST`
//! plateau, which Nelder-Mead backs away from on its own.

use argmin::core::{CostFunction, Error};
use ndarray::Array1;

use crate::likelihood::assembler::{forest_loglikelihood, HiddenTrees};
use crate::likelihood::config::EngineConfig;
use crate::model::forest::Forest;
use crate::optimization::packing::ParamCodec;

/// Cost assigned to candidates the likelihood engine rejects.
pub const PENALTY_COST: f64 = 1e10;

/// Bridges the forest likelihood to `argmin`'s `CostFunction`.
///
/// `CostFunction::cost` returns `-ℓ(clip(θ))`, or `PENALTY_COST` when the
/// evaluation fails.
#[derive(Debug, Clone)]
pub struct ForestCostAdapter<'a> {
    pub codec: &'a ParamCodec,
    pub forest: &'a Forest,
    pub hidden: HiddenTrees,
    pub cfg: &'a EngineConfig,
}

impl<'a> ForestCostAdapter<'a> {
    pub fn new(
        codec: &'a ParamCodec, forest: &'a Forest, hidden: HiddenTrees, cfg: &'a EngineConfig,
    ) -> Self {
        Self { codec, forest, hidden, cfg }
    }
}

impl<'a> CostFunction for ForestCostAdapter<'a> {
    type Param = Array1<f64>;
    type Output = f64;

    /// Evaluate the cost `c(θ) = -ℓ(clip(θ))`.
    ///
    /// Never returns `Err` for a bad candidate; the penalty plateau keeps
    /// the solver running.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        if theta.iter().any(|v| !v.is_finite()) {
            return Ok(PENALTY_COST);
        }
        let clipped = self.codec.clip(theta);
        let params = match self.codec.unpack(&clipped) {
            Ok(params) => params,
            Err(_) => return Ok(PENALTY_COST),
        };
        match forest_loglikelihood(self.forest, &params, self.hidden, self.cfg) {
            Ok(loglik) if loglik.is_finite() => Ok(-loglik),
            _ => Ok(PENALTY_COST),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::forest::{Node, Tree};
    use crate::model::params::MTBDParams;
    use crate::optimization::packing::{Bounds, FreeParams};
    use ndarray::{arr1, arr2};

    fn single_tip_forest() -> Forest {
        // One tree: a root branch of length 2 ending in a sampled tip.
        let tip = Node::leaf(0, 2.0, 2.0);
        Forest { trees: vec![Tree::new(vec![tip], 0)] }
    }

    fn one_state_template() -> MTBDParams {
        MTBDParams::new(
            arr2(&[[0.0]]),
            arr2(&[[1.0]]),
            arr1(&[0.5]),
            arr1(&[0.9]),
            4.0,
        )
        .unwrap()
    }

    fn small_cfg() -> EngineConfig {
        EngineConfig::new(2_000, 1_048_576.0, 30, Default::default()).unwrap()
    }

    // Purpose: a finite in-bounds candidate yields the negated
    //          log-likelihood, not the penalty.
    // Given: a one-tip forest and the packed template vector.
    // Expect: cost is finite, below the penalty, and equals -ℓ(θ).
    #[test]
    fn cost_is_negated_loglikelihood() {
        let template = one_state_template();
        let codec =
            ParamCodec::new(template.clone(), FreeParams::all(1), Bounds::default()).unwrap();
        let forest = single_tip_forest();
        let cfg = small_cfg();
        let adapter = ForestCostAdapter::new(&codec, &forest, HiddenTrees::Known(0.0), &cfg);

        let theta = codec.pack(&template);
        let cost = adapter.cost(&theta).unwrap();
        assert!(cost.is_finite());
        assert!(cost < PENALTY_COST);

        let loglik =
            forest_loglikelihood(&forest, &template, HiddenTrees::Known(0.0), &cfg).unwrap();
        assert!((cost + loglik).abs() < 1e-12);
    }

    // Purpose: non-finite candidates hit the penalty plateau instead of
    //          erroring out of the solver.
    #[test]
    fn non_finite_theta_is_penalized() {
        let template = one_state_template();
        let codec = ParamCodec::new(template, FreeParams::all(1), Bounds::default()).unwrap();
        let forest = single_tip_forest();
        let cfg = small_cfg();
        let adapter = ForestCostAdapter::new(&codec, &forest, HiddenTrees::Known(0.0), &cfg);

        let theta = arr1(&[f64::NAN, 0.5, 0.9]);
        assert_eq!(adapter.cost(&theta).unwrap(), PENALTY_COST);
    }

    // Purpose: out-of-bounds candidates are clipped, not penalized.
    // Given: a theta with one rate far above the box.
    // Expect: the cost equals the cost at the clipped vector.
    #[test]
    fn out_of_bounds_theta_is_clipped() {
        let template = one_state_template();
        let codec = ParamCodec::new(template, FreeParams::all(1), Bounds::default()).unwrap();
        let forest = single_tip_forest();
        let cfg = small_cfg();
        let adapter = ForestCostAdapter::new(&codec, &forest, HiddenTrees::Known(0.0), &cfg);

        let wild = arr1(&[1e6, 0.5, 0.9]);
        let clipped = codec.clip(&wild);
        let cost_wild = adapter.cost(&wild).unwrap();
        let cost_clipped = adapter.cost(&clipped).unwrap();
        assert!((cost_wild - cost_clipped).abs() < 1e-12);
    }
}
