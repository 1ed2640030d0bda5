//! Arena-backed phylogenetic trees and forests.
//!
//! Purpose
//! -------
//! Represent the time-stamped, state-labeled rooted binary trees the
//! likelihood engine consumes. Nodes live in a flat arena with index-based
//! child references, which keeps traversal cache-friendly and lets the
//! parallel branch integrator treat every node as an independent job
//! without aliasing concerns.
//!
//! Key behaviors
//! -------------
//! - Expose an explicit node interface: state, absolute time, branch
//!   length, children, leaf/root predicates.
//! - Provide an iterative post-order traversal (children before parents).
//! - Validate a forest against a parameter bundle's state count and
//!   sampling window before any likelihood work starts.
//!
//! Conventions
//! -----------
//! - Times are absolute and increase toward the present; a node's branch
//!   starts at `t0 = time − branch_length` and ends at `time`.
//! - External collaborators (tree parsers, simulators) construct these
//!   arenas; nothing in this crate reads tree files.
use crate::model::errors::{ModelError, ModelResult};

/// One node of a rooted binary tree.
///
/// `children` is `None` for a leaf and `Some((left, right))` for an
/// internal node; indices refer to the owning [`Tree`]'s arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Type label in `{0, …, m-1}`.
    pub state: usize,
    /// Absolute time at the end of this node's branch.
    pub time: f64,
    /// Length of the branch leading into this node; 0 is allowed.
    pub branch_length: f64,
    /// Arena indices of the two children, if any.
    pub children: Option<(usize, usize)>,
}

impl Node {
    /// Create a leaf node.
    pub fn leaf(state: usize, time: f64, branch_length: f64) -> Self {
        Self { state, time, branch_length, children: None }
    }

    /// Create an internal node with two children.
    pub fn internal(
        state: usize, time: f64, branch_length: f64, left: usize, right: usize,
    ) -> Self {
        Self { state, time, branch_length, children: Some((left, right)) }
    }

    /// Whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Absolute time at which this node's branch starts.
    pub fn branch_start(&self) -> f64 {
        self.time - self.branch_length
    }
}

/// A rooted binary tree over an arena of [`Node`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    /// Node arena; `children` indices point into this vector.
    pub nodes: Vec<Node>,
    /// Arena index of the root.
    pub root: usize,
}

impl Tree {
    /// Build a tree from an arena and a root index.
    pub fn new(nodes: Vec<Node>, root: usize) -> Self {
        Self { nodes, root }
    }

    /// Whether `index` is the root of this tree.
    pub fn is_root(&self, index: usize) -> bool {
        index == self.root
    }

    /// Post-order traversal: children are visited before their parent and
    /// the root comes last. Iterative, so arbitrarily deep trees do not
    /// overflow the stack.
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
                continue;
            }
            stack.push((index, true));
            if let Some((left, right)) = self.nodes[index].children {
                stack.push((right, false));
                stack.push((left, false));
            }
        }
        order
    }
}

/// A set of trees analyzed jointly under one shared parameter bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    pub trees: Vec<Tree>,
}

impl Forest {
    pub fn new(trees: Vec<Tree>) -> Self {
        Self { trees }
    }

    /// Number of trees in the forest.
    pub fn size(&self) -> usize {
        self.trees.len()
    }

    /// Total number of nodes across all trees.
    pub fn n_nodes(&self) -> usize {
        self.trees.iter().map(|t| t.nodes.len()).sum()
    }

    /// Validate the forest against a state count `m` and sampling window
    /// end `horizon`.
    ///
    /// Checks, per node:
    /// - the arity is 0 or 2 and child indices are in bounds,
    /// - the state label is `< m`,
    /// - the time and branch length are finite with `branch_length >= 0`,
    /// - the time lies inside `[0, horizon]`,
    /// - children do not precede their parent in time.
    ///
    /// # Errors
    /// The first violated constraint as a [`ModelError`].
    pub fn validate(&self, m: usize, horizon: f64) -> ModelResult<()> {
        for (t_idx, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::EmptyTree { tree: t_idx });
            }
            let n_nodes = tree.nodes.len();
            for (n_idx, node) in tree.nodes.iter().enumerate() {
                if node.state >= m {
                    return Err(ModelError::StateOutOfRange {
                        tree: t_idx,
                        node: n_idx,
                        state: node.state,
                        m,
                    });
                }
                if !node.time.is_finite()
                    || !node.branch_length.is_finite()
                    || node.branch_length < 0.0
                {
                    return Err(ModelError::InvalidNodeTime {
                        tree: t_idx,
                        node: n_idx,
                        time: node.time,
                        branch_length: node.branch_length,
                    });
                }
                if node.time < 0.0 || node.time > horizon {
                    return Err(ModelError::NodeOutsideWindow {
                        tree: t_idx,
                        node: n_idx,
                        time: node.time,
                        horizon,
                    });
                }
                if let Some((left, right)) = node.children {
                    for child in [left, right] {
                        if child >= n_nodes {
                            return Err(ModelError::ChildIndexOutOfBounds {
                                tree: t_idx,
                                node: n_idx,
                                child,
                                n_nodes,
                            });
                        }
                        if tree.nodes[child].branch_start() < node.time - 1e-9 {
                            return Err(ModelError::ChildBeforeParent {
                                tree: t_idx,
                                parent: n_idx,
                                child,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
