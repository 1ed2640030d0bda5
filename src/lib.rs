//! rust_mtbd — multi-type birth-death-sampling likelihoods for phylogenies.
//!
//! Purpose
//! -------
//! Serve as the crate root for the MTBD (multi-type birth-death-sampling)
//! likelihood engine: exact log-likelihoods of forests of time-stamped,
//! state-labeled binary trees, and bounded maximum-likelihood estimation of
//! the underlying rate parameters.
//!
//! Key behaviors
//! -------------
//! - Re-export the core modules (`model`, `ode`, `likelihood`,
//!   `optimization`) as the public crate surface.
//! - `model` holds the validated parameter bundle and the arena-backed
//!   forest; `ode` is the adaptive Dormand-Prince integrator underneath;
//!   `likelihood` assembles the per-forest log-likelihood; `optimization`
//!   fits parameters by seeded multi-start Nelder-Mead.
//!
//! Conventions
//! -----------
//! - Time runs forward from the start of the process; the engine works
//!   internally in reverse time `τ = T − t` from the end of the sampling
//!   window `T`.
//! - Public entrypoints that can fail return module-specific `Result`
//!   aliases (`ModelResult`, `OdeResult`, `LikResult`, `OptResult`);
//!   callers never see raw backend errors.
//! - Likelihood evaluations are self-contained and lock-free, so callers
//!   may evaluate different parameter bundles concurrently.
//!
//! Downstream usage
//! ----------------
//! - One-off evaluation: build an [`model::MTBDParams`] and a
//!   [`model::Forest`], then call [`likelihood::forest_loglikelihood`].
//! - Fitting: wrap the free parameters in an
//!   [`optimization::ParamCodec`] and call
//!   [`optimization::maximize_likelihood`].
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules
//!   (closed-form single-type cases, stability safeguards, codec
//!   round-trips) and by the end-to-end pipeline integration tests.

pub mod likelihood;
pub mod model;
pub mod ode;
pub mod optimization;
