//! model — parameter bundles, trees, and their validation surface.
//!
//! Purpose
//! -------
//! Hold the input data model of the likelihood engine: the validated
//! [`params::MTBDParams`] rate bundle and the arena-backed
//! [`forest::Forest`] of state-labeled, time-stamped binary trees.
//! Everything here is immutable once constructed; the likelihood and
//! optimization layers borrow it read-only.
//!
//! Downstream usage
//! ----------------
//! - `likelihood` consumes `MTBDParams` and `Forest` per evaluation.
//! - `optimization` rebuilds fresh `MTBDParams` bundles from flat
//!   parameter vectors on every objective call.

pub mod errors;
pub mod forest;
pub mod params;

pub use errors::{ModelError, ModelResult};
pub use forest::{Forest, Node, Tree};
pub use params::MTBDParams;
