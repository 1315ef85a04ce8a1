//! Search node representation.

use crate::model::ProblemModel;

/// Status of a search node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Node is waiting in the frontier.
    Active,

    /// Node was discarded (infeasible, dominated or failed).
    Pruned,

    /// Node was branched (children created).
    Branched,

    /// Node produced an integer-feasible solution.
    AcceptedSolution,
}

/// A bound tightening on one variable.
///
/// The node box is the model box intersected with every tightening of the
/// node, so a node is never looser than the model it is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundChange {
    /// Variable index.
    pub var: usize,

    /// New lower bound.
    pub lower: f64,

    /// New upper bound.
    pub upper: f64,
}

impl BoundChange {
    /// Create a "down" branch: x <= floor(value).
    pub fn down_branch(var: usize, lb: f64, value: f64) -> Self {
        Self {
            var,
            lower: lb,
            upper: value.floor(),
        }
    }

    /// Create an "up" branch: x >= ceil(value).
    pub fn up_branch(var: usize, ub: f64, value: f64) -> Self {
        Self {
            var,
            lower: value.ceil(),
            upper: ub,
        }
    }

    /// Fix a variable to zero.
    pub fn zero(var: usize) -> Self {
        Self {
            var,
            lower: 0.0,
            upper: 0.0,
        }
    }

    /// Check if the bound change creates an empty domain.
    pub fn is_infeasible(&self) -> bool {
        self.lower > self.upper + 1e-9
    }
}

/// Where a child came from, for the pseudocost update once it is relaxed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchInfo {
    /// Branching variable.
    pub var: usize,

    /// True for the up child.
    pub up: bool,

    /// Distance the parent value had to move (`frac` down, `1 - frac` up).
    pub distance: f64,

    /// Parent relaxation objective.
    pub parent_objective: f64,
}

/// Solved relaxation cached on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRelaxation {
    /// Relaxation objective.
    pub objective: f64,

    /// Relaxation primal point.
    pub primal: Vec<f64>,
}

/// A node in the B&B search tree.
#[derive(Debug, Clone)]
pub struct SearchNode {
    /// Unique node identifier.
    pub id: u64,

    /// Parent node ID (None for root).
    pub parent_id: Option<u64>,

    /// Depth in the tree (0 for root).
    pub depth: usize,

    /// Tightenings accumulated from the root, at most one per variable.
    pub tightenings: Vec<BoundChange>,

    /// Lower bound on the optimal objective in this subtree.
    pub dual_bound: f64,

    /// Cached relaxation (None until evaluated or after invalidation).
    pub relaxation: Option<NodeRelaxation>,

    /// Starting point handed to the subsolver.
    pub warm_start: Option<Vec<f64>>,

    /// Branching that created this node.
    pub branch_info: Option<BranchInfo>,

    /// Node processing status.
    pub status: NodeStatus,
}

impl SearchNode {
    /// Create the root node.
    pub fn root(id: u64) -> Self {
        Self {
            id,
            parent_id: None,
            depth: 0,
            tightenings: Vec::new(),
            dual_bound: f64::NEG_INFINITY,
            relaxation: None,
            warm_start: None,
            branch_info: None,
            status: NodeStatus::Active,
        }
    }

    /// Create a child node applying the given tightenings.
    ///
    /// The child starts with the parent's relaxation objective as bound and
    /// the parent's point as warm start.
    pub fn child(&self, id: u64, changes: &[BoundChange], branch_info: Option<BranchInfo>) -> Self {
        let mut tightenings = self.tightenings.clone();
        for change in changes {
            match tightenings.iter_mut().find(|t| t.var == change.var) {
                Some(t) => {
                    t.lower = t.lower.max(change.lower);
                    t.upper = t.upper.min(change.upper);
                }
                None => tightenings.push(*change),
            }
        }

        let (dual_bound, warm_start) = match self.relaxation {
            Some(ref r) => (r.objective.max(self.dual_bound), Some(r.primal.clone())),
            None => (self.dual_bound, self.warm_start.clone()),
        };

        Self {
            id,
            parent_id: Some(self.id),
            depth: self.depth + 1,
            tightenings,
            dual_bound,
            relaxation: None,
            warm_start,
            branch_info,
            status: NodeStatus::Active,
        }
    }

    /// Node box: the model bounds intersected with the node tightenings.
    pub fn bounds(&self, model: &ProblemModel) -> (Vec<f64>, Vec<f64>) {
        let mut lower = model.var_lower().to_vec();
        let mut upper = model.var_upper().to_vec();
        for t in &self.tightenings {
            if t.var < lower.len() {
                lower[t.var] = lower[t.var].max(t.lower);
                upper[t.var] = upper[t.var].min(t.upper);
            }
        }
        (lower, upper)
    }

    /// Check if this node can be pruned by the cutoff.
    ///
    /// A node can be pruned if its dual bound >= cutoff - tolerance.
    pub fn can_prune(&self, cutoff: f64, tolerance: f64) -> bool {
        self.dual_bound >= cutoff - tolerance
    }

    /// Drop the cached relaxation; the dual bound stays valid for tightenings.
    pub fn invalidate(&mut self) {
        self.relaxation = None;
    }
}
