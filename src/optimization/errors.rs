use argmin::core::{ArgminError, Error};

use crate::likelihood::errors::LikError;
use crate::model::errors::ModelError;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Codec ----
    /// At least one parameter entry must be free.
    EmptyFreeSelection,

    /// A free-entry index points outside the parameter bundle.
    FreeIndexOutOfRange {
        family: &'static str,
        row: usize,
        col: usize,
        m: usize,
    },

    /// MU carries transition rates off-diagonal only; a diagonal entry
    /// cannot be freed.
    DiagonalMuEntry {
        index: usize,
    },

    /// Flat vector length does not match the codec dimension.
    ThetaLengthMismatch {
        expected: usize,
        actual: usize,
    },

    /// Bounds must be finite with lower < upper.
    InvalidBounds {
        family: &'static str,
        lower: f64,
        upper: f64,
    },

    // ---- MultiStartOptions ----
    /// At least one local search must run.
    InvalidRestarts {
        restarts: usize,
    },

    /// Maximum iterations needs to be positive.
    InvalidMaxIter {
        max_iter: u64,
    },

    /// Simplex standard-deviation tolerance needs to be positive and finite.
    InvalidSdTolerance {
        tol: f64,
    },

    // ---- Likelihood / model ----
    // The multi-start loop always holds a best candidate (it starts from
    // the caller's evaluated start point), so "no result" has no variant.
    /// The likelihood engine rejected the inputs outright (as opposed to a
    /// failed candidate evaluation, which is penalized, not raised).
    LikelihoodFailed {
        text: String,
    },

    /// Input validation failed before any search started.
    InvalidModel {
        text: String,
    },

    // ---- Argmin ----
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter {
        text: String,
    },
    /// Wrapper for argmin::NotInitialized
    NotInitialized {
        text: String,
    },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated {
        text: String,
    },
    /// Wrapper for argmin::PotentialBug
    PotentialBug {
        text: String,
    },
    /// Wrapper for other argmin::Error types
    BackendError {
        text: String,
    },

    // ---- Fallback ----
    UnknownError,
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptError::EmptyFreeSelection => {
                write!(f, "No free parameter entries selected")
            }
            OptError::FreeIndexOutOfRange { family, row, col, m } => {
                write!(f, "Free {family} entry ({row}, {col}) out of range for m = {m}")
            }
            OptError::DiagonalMuEntry { index } => {
                write!(f, "MU diagonal entry ({index}, {index}) cannot be freed")
            }
            OptError::ThetaLengthMismatch { expected, actual } => {
                write!(f, "Theta length mismatch: expected {expected}, actual {actual}")
            }
            OptError::InvalidBounds { family, lower, upper } => {
                write!(
                    f,
                    "Invalid {family} bounds [{lower}, {upper}]: must be finite with lower < upper"
                )
            }
            OptError::InvalidRestarts { restarts } => {
                write!(f, "Invalid restarts {restarts}: must be at least 1")
            }
            OptError::InvalidMaxIter { max_iter } => {
                write!(f, "Invalid maximum iterations {max_iter}: must be positive")
            }
            OptError::InvalidSdTolerance { tol } => {
                write!(f, "Invalid simplex tolerance {tol}: must be finite and positive")
            }
            OptError::LikelihoodFailed { text } => {
                write!(f, "Likelihood evaluation failed: {text}")
            }
            OptError::InvalidModel { text } => {
                write!(f, "Invalid model input: {text}")
            }
            OptError::InvalidParameter { text } => {
                write!(f, "Invalid parameter: {text}")
            }
            OptError::NotInitialized { text } => {
                write!(f, "Not initialized: {text}")
            }
            OptError::ConditionViolated { text } => {
                write!(f, "Condition violated: {text}")
            }
            OptError::PotentialBug { text } => {
                write!(f, "Potential bug: {text}")
            }
            OptError::BackendError { text } => {
                write!(f, "Backend error: {text}")
            }
            OptError::UnknownError => {
                write!(f, "Unknown error")
            }
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        match original_err.downcast() {
            Ok(arg_err) => match arg_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

impl From<LikError> for OptError {
    fn from(err: LikError) -> Self {
        OptError::LikelihoodFailed { text: err.to_string() }
    }
}

impl From<ModelError> for OptError {
    fn from(err: ModelError) -> Self {
        OptError::InvalidModel { text: err.to_string() }
    }
}
