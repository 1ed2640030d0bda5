use crate::model::errors::ModelError;
use crate::ode::errors::OdeError;

/// Result alias for likelihood-engine operations.
pub type LikResult<T> = Result<T, LikError>;

/// Failure modes of the likelihood engine.
///
/// Two degeneracies are deliberately not errors: a NaN reaching the
/// log-likelihood sum degrades to `-inf` at the assembler boundary, and an
/// out-of-range equilibrium solve falls back to the uniform distribution.
/// Both are value-level policies, handled where the value arises.
#[derive(Debug, Clone, PartialEq)]
pub enum LikError {
    // ---- Branch integration ----
    /// A branch ODE failed to produce a finite, non-negative, in-bound
    /// solution even after the bounded bisection retries.
    NonconvergentIntegration {
        tau0: f64,
        tau1: f64,
        state: usize,
        max_bisections: usize,
    },

    /// The unsampled-probability table failed to integrate. Unlike branch
    /// integration there is no bisection fallback here; this is fatal for
    /// the evaluation.
    UnsampledTableFailed {
        source: OdeError,
    },

    // ---- Inputs ----
    /// Forest or bundle validation failed before any numeric work.
    Model {
        source: ModelError,
    },

    // ---- EngineConfig ----
    /// The dense grid needs at least two points.
    InvalidGridPoints {
        grid_points: usize,
    },

    /// The rescale seed must be finite and > 1.
    InvalidSeedScale {
        value: f64,
    },

    /// The bisection retry bound must be positive.
    InvalidMaxBisections {
        max_bisections: usize,
    },

    /// Stepper tolerances are validated by the ode layer; its rejection is
    /// carried through here.
    InvalidStepper {
        source: OdeError,
    },
}

impl std::error::Error for LikError {}

impl std::fmt::Display for LikError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LikError::NonconvergentIntegration { tau0, tau1, state, max_bisections } => {
                write!(
                    f,
                    "Branch integration over tau in [{tau0}, {tau1}] (end state {state}) did \
                     not stabilize within {max_bisections} bisections"
                )
            }
            LikError::UnsampledTableFailed { source } => {
                write!(f, "Unsampled-probability table integration failed: {source}")
            }
            LikError::Model { source } => {
                write!(f, "Invalid input: {source}")
            }
            LikError::InvalidGridPoints { grid_points } => {
                write!(f, "Invalid grid_points = {grid_points}, need at least 2")
            }
            LikError::InvalidSeedScale { value } => {
                write!(f, "Invalid seed_scale = {value}, must be finite and > 1")
            }
            LikError::InvalidMaxBisections { max_bisections } => {
                write!(f, "Invalid max_bisections = {max_bisections}, must be > 0")
            }
            LikError::InvalidStepper { source } => {
                write!(f, "Invalid stepper options: {source}")
            }
        }
    }
}

impl From<ModelError> for LikError {
    fn from(source: ModelError) -> Self {
        LikError::Model { source }
    }
}
