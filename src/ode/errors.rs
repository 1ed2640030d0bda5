/// Result alias for ODE stepper operations.
pub type OdeResult<T> = Result<T, OdeError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OdeError {
    // ---- Options ----
    /// Tolerances need to be positive and finite.
    InvalidTolerance {
        name: &'static str,
        value: f64,
    },

    /// Step budget must be positive.
    InvalidMaxSteps {
        max_steps: usize,
    },

    // ---- Integration ----
    /// Error control drove the step size below the representable minimum.
    StepSizeUnderflow {
        t: f64,
        h: f64,
    },

    /// The step budget was exhausted before reaching the interval end.
    MaxStepsExceeded {
        t: f64,
        max_steps: usize,
    },

    /// The right-hand side produced a non-finite derivative.
    NonFiniteDerivative {
        t: f64,
    },

    /// Integration intervals must be ascending with finite endpoints.
    InvalidInterval {
        t0: f64,
        t1: f64,
    },
}

impl std::error::Error for OdeError {}

impl std::fmt::Display for OdeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OdeError::InvalidTolerance { name, value } => {
                write!(f, "Invalid {name} = {value}, must be finite and > 0")
            }
            OdeError::InvalidMaxSteps { max_steps } => {
                write!(f, "Invalid max_steps = {max_steps}, must be > 0")
            }
            OdeError::StepSizeUnderflow { t, h } => {
                write!(f, "Step size underflow at t = {t}: h = {h}")
            }
            OdeError::MaxStepsExceeded { t, max_steps } => {
                write!(f, "Exceeded {max_steps} steps at t = {t}")
            }
            OdeError::NonFiniteDerivative { t } => {
                write!(f, "Right-hand side returned a non-finite derivative at t = {t}")
            }
            OdeError::InvalidInterval { t0, t1 } => {
                write!(f, "Invalid integration interval [{t0}, {t1}]")
            }
        }
    }
}
