//! likelihood — the MTBD likelihood engine.
//!
//! Purpose
//! -------
//! Compute the exact log-likelihood of a forest of time-stamped,
//! state-labeled binary trees under a multi-type birth-death-sampling
//! process. The engine is assembled from four leaves-first components:
//!
//! - [`frequencies`]: equilibrium type distribution π.
//! - [`unsampled`]: the dense U-table of unsampled-lineage probabilities.
//! - [`branch`]: per-node branch transition vectors with rescale/bisect
//!   stability safeguards and a parallel batch path.
//! - [`assembler`]: post-order combination into one scalar, with the
//!   hidden-tree correction and the NaN → −∞ policy.
//!
//! Conventions
//! -----------
//! - The engine works in reverse time `τ = T − t`, ascending from the end
//!   of the sampling window.
//! - Every evaluation owns its U-table and P-vectors; nothing is shared
//!   across evaluations, so concurrent evaluations need no locks.
//! - Numeric knobs live in [`config::EngineConfig`], not in globals.
//!
//! Downstream usage
//! ----------------
//! - Call [`assembler::forest_loglikelihood`] directly for one
//!   evaluation, or let `optimization` drive it across a parameter
//!   search.

pub mod assembler;
pub mod branch;
pub mod config;
pub mod errors;
pub mod frequencies;
pub mod unsampled;

pub use assembler::{forest_loglikelihood, HiddenTrees};
pub use branch::{BranchIntegrator, BranchJob, ScaledVector};
pub use config::EngineConfig;
pub use errors::{LikError, LikResult};
pub use frequencies::equilibrium_frequencies;
pub use unsampled::UnsampledProbability;
