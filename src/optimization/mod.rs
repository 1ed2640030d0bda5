//! optimization — bounded multi-start maximum-likelihood fitting.
//!
//! Purpose
//! -------
//! Turn the likelihood engine into an estimator. The layer has three
//! pieces:
//!
//! - [`packing`]: the explicit codec between a structured
//!   [`crate::model::MTBDParams`] bundle and the flat vector a solver
//!   walks, with per-family box bounds.
//! - [`adapter`]: the `argmin` cost bridge, `c(θ) = -ℓ(clip(θ))`, with
//!   failed candidates mapped to a finite penalty plateau.
//! - [`optimizer`]: seeded multi-start Nelder-Mead over the box, one
//!   search from the caller's start plus random in-bounds restarts.
//!
//! Conventions
//! -----------
//! - Solvers minimize the cost internally; every user-facing value is the
//!   log-likelihood `ℓ`.
//! - A candidate whose evaluation fails is penalized, never raised; only
//!   setup mistakes and backend failures surface as
//!   [`errors::OptError`].
//! - Fixed `MultiStartOptions::seed` means bit-reproducible searches.
//!
//! Testing notes
//! -------------
//! - Submodule tests cover codec round-trips, clipping, penalty mapping,
//!   and simplex/restart construction; the end-to-end fit lives in the
//!   integration tests.

pub mod adapter;
pub mod errors;
pub mod optimizer;
pub mod packing;

pub use adapter::{ForestCostAdapter, PENALTY_COST};
pub use errors::{OptError, OptResult};
pub use optimizer::{maximize_likelihood, FitOutcome, MultiStartOptions};
pub use packing::{Bounds, FreeParams, ParamCodec, PROB_BOUNDS, RATE_BOUNDS};
