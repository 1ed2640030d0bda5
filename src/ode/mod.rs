//! ode — the adaptive integrator backing both likelihood ODE families.
//!
//! Purpose
//! -------
//! House the embedded Dormand–Prince 5(4) stepper used to build the
//! unsampled-probability table (dense-grid entry point) and to integrate
//! per-branch transition systems (endpoint entry point). This is not a
//! general ODE toolbox; only the two entry points the engine needs exist.

pub mod errors;
pub mod solver;

pub use errors::{OdeError, OdeResult};
pub use solver::{DormandPrince54, StepperOptions};
