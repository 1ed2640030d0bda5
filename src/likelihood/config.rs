//! Engine-level numeric configuration.
//!
//! The reference implementation kept its grid resolution, rescale seed,
//! and tolerance constants as module globals; here they are immutable,
//! validated configuration passed into every engine entry point.
use crate::likelihood::errors::{LikError, LikResult};
use crate::ode::solver::StepperOptions;

/// Default number of points in the dense unsampled-probability grid.
pub const DEFAULT_GRID_POINTS: usize = 1_000_000;

/// Default branch-integration seed scale (2^20).
pub const DEFAULT_SEED_SCALE: f64 = 1_048_576.0;

/// Default bound on the branch-integration bisection retry depth.
pub const DEFAULT_MAX_BISECTIONS: usize = 30;

/// Immutable numeric configuration for one likelihood engine.
///
/// Fields:
/// - `grid_points`: size of the dense U-table grid over `[0, T]`. The
///   default keeps linear-interpolation error negligible against the
///   ~1e-4 relative precision the likelihood needs; tests shrink it.
/// - `seed_scale`: magnitude at which branch integrations are seeded and
///   re-normalized; the cumulative factor is tracked in log-space.
/// - `max_bisections`: hard bound on the bisection retry depth, after
///   which [`LikError::NonconvergentIntegration`] is raised.
/// - `stepper`: validated Dormand–Prince tolerances shared by the U- and
///   P-integrations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub grid_points: usize,
    pub seed_scale: f64,
    pub max_bisections: usize,
    pub stepper: StepperOptions,
}

impl EngineConfig {
    /// Construct a validated configuration.
    ///
    /// # Rules
    /// - `grid_points >= 2` (the grid must bracket every query).
    /// - `seed_scale` finite and `> 1`.
    /// - `max_bisections > 0`.
    ///
    /// # Errors
    /// The first violated rule as a [`LikError`].
    pub fn new(
        grid_points: usize, seed_scale: f64, max_bisections: usize, stepper: StepperOptions,
    ) -> LikResult<Self> {
        if grid_points < 2 {
            return Err(LikError::InvalidGridPoints { grid_points });
        }
        if !seed_scale.is_finite() || seed_scale <= 1.0 {
            return Err(LikError::InvalidSeedScale { value: seed_scale });
        }
        if max_bisections == 0 {
            return Err(LikError::InvalidMaxBisections { max_bisections });
        }
        Ok(Self { grid_points, seed_scale, max_bisections, stepper })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_points: DEFAULT_GRID_POINTS,
            seed_scale: DEFAULT_SEED_SCALE,
            max_bisections: DEFAULT_MAX_BISECTIONS,
            stepper: StepperOptions::default(),
        }
    }
}
