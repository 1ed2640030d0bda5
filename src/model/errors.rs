/// Crate-wide result alias for model construction and validation.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    // ---- Parameter bundle ----
    /// MU must be a square m×m matrix.
    MuShapeMismatch {
        expected: usize,
        found: (usize, usize),
    },

    /// LA must be a square m×m matrix.
    LaShapeMismatch {
        expected: usize,
        found: (usize, usize),
    },

    /// RHO length must equal the state count. PSI needs no counterpart:
    /// the state count is defined as PSI's length.
    RhoLengthMismatch {
        expected: usize,
        actual: usize,
    },

    /// Rates need to be finite and non-negative.
    InvalidRate {
        matrix: &'static str,
        row: usize,
        col: usize,
        value: f64,
    },

    /// MU carries transition rates off-diagonal only.
    NonZeroMuDiagonal {
        index: usize,
        value: f64,
    },

    /// Sampling probabilities must lie in [0, 1].
    InvalidSamplingProbability {
        index: usize,
        value: f64,
    },

    /// The sampling window end T must be finite and positive.
    InvalidHorizon {
        value: f64,
    },

    /// The state count must be at least 1.
    EmptyStateSpace,

    // ---- Forest ----
    // Arity needs no check: a node's children are Option<(usize, usize)>,
    // so 0 or 2 holds by construction.
    /// A node's state label must lie in {0, …, m-1}.
    StateOutOfRange {
        tree: usize,
        node: usize,
        state: usize,
        m: usize,
    },

    /// Node times must be finite with non-negative branch lengths.
    InvalidNodeTime {
        tree: usize,
        node: usize,
        time: f64,
        branch_length: f64,
    },

    /// A child's time must not precede its parent's.
    ChildBeforeParent {
        tree: usize,
        parent: usize,
        child: usize,
    },

    /// A child index points outside the node arena.
    ChildIndexOutOfBounds {
        tree: usize,
        node: usize,
        child: usize,
        n_nodes: usize,
    },

    /// Node times must lie inside the sampling window [0, T].
    NodeOutsideWindow {
        tree: usize,
        node: usize,
        time: f64,
        horizon: f64,
    },

    /// A tree must contain at least one node.
    EmptyTree {
        tree: usize,
    },
}

impl std::error::Error for ModelError {}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::MuShapeMismatch { expected, found } => {
                write!(f, "MU shape mismatch: expected ({expected}, {expected}), found {found:?}")
            }
            ModelError::LaShapeMismatch { expected, found } => {
                write!(f, "LA shape mismatch: expected ({expected}, {expected}), found {found:?}")
            }
            ModelError::RhoLengthMismatch { expected, actual } => {
                write!(f, "RHO length mismatch: expected {expected}, actual {actual}")
            }
            ModelError::InvalidRate { matrix, row, col, value } => {
                write!(
                    f,
                    "Invalid {matrix} rate at ({row}, {col}): {value}, must be finite and >= 0"
                )
            }
            ModelError::NonZeroMuDiagonal { index, value } => {
                write!(f, "MU diagonal entry {index} is {value}, must be zero")
            }
            ModelError::InvalidSamplingProbability { index, value } => {
                write!(f, "Invalid RHO at index {index}: {value}, must lie in [0, 1]")
            }
            ModelError::InvalidHorizon { value } => {
                write!(f, "Invalid sampling window end T = {value}, must be finite and > 0")
            }
            ModelError::EmptyStateSpace => {
                write!(f, "State count m must be at least 1")
            }
            ModelError::StateOutOfRange { tree, node, state, m } => {
                write!(f, "Node {node} of tree {tree} has state {state}, must be < {m}")
            }
            ModelError::InvalidNodeTime { tree, node, time, branch_length } => {
                write!(
                    f,
                    "Node {node} of tree {tree} has time {time} and branch length \
                     {branch_length}, both must be finite with branch length >= 0"
                )
            }
            ModelError::ChildBeforeParent { tree, parent, child } => {
                write!(f, "Child {child} of node {parent} in tree {tree} precedes its parent")
            }
            ModelError::ChildIndexOutOfBounds { tree, node, child, n_nodes } => {
                write!(
                    f,
                    "Node {node} of tree {tree} references child {child}, arena has {n_nodes} nodes"
                )
            }
            ModelError::NodeOutsideWindow { tree, node, time, horizon } => {
                write!(
                    f,
                    "Node {node} of tree {tree} has time {time} outside the window [0, {horizon}]"
                )
            }
            ModelError::EmptyTree { tree } => {
                write!(f, "Tree {tree} has no nodes")
            }
        }
    }
}
