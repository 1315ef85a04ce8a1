//! Relaxation solver trait and result types.

use crate::error::BnbResult;
use crate::model::ProblemModel;

/// Status of a relaxation solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxationStatus {
    /// Optimal solution found.
    Optimal,

    /// Relaxation is infeasible (node can be pruned).
    Infeasible,

    /// Relaxation is unbounded below.
    Unbounded,

    /// Iteration or time limit of the subsolver reached.
    IterationLimit,

    /// Numerical difficulties.
    NumericalError,
}

/// Result of solving one node relaxation.
#[derive(Debug, Clone)]
pub struct RelaxationResult {
    /// Solve status.
    pub status: RelaxationStatus,

    /// Primal point (empty unless optimal).
    pub primal: Vec<f64>,

    /// Constraint multipliers, positive when the upper bound is active.
    pub dual: Vec<f64>,

    /// Variable-bound multipliers, positive when the upper bound is active.
    pub reduced_costs: Vec<f64>,

    /// Objective value at `primal` (`+inf` unless optimal).
    pub objective: f64,
}

impl RelaxationResult {
    /// Result for an infeasible relaxation.
    pub fn infeasible() -> Self {
        Self::failed(RelaxationStatus::Infeasible)
    }

    /// Result without a usable point.
    pub fn failed(status: RelaxationStatus) -> Self {
        Self {
            status,
            primal: Vec::new(),
            dual: Vec::new(),
            reduced_costs: Vec::new(),
            objective: f64::INFINITY,
        }
    }

    /// True if the relaxation was solved to optimality.
    pub fn is_optimal(&self) -> bool {
        self.status == RelaxationStatus::Optimal
    }
}

/// A convex QP solver able to bound one branch-and-bound node.
///
/// The relaxation is the model with integrality and SOS1 dropped and the
/// variable bounds replaced by the node's bounds. Implementations may cache
/// data between calls; they key such caches on [`ProblemModel::revision`].
pub trait RelaxationSolver {
    /// Backend name as used in option maps.
    fn name(&self) -> &'static str;

    /// Solve the relaxation over `var_lower <= x <= var_upper`.
    ///
    /// `warm_start` is a primal point (usually the parent's solution) the
    /// backend may start from. OSQP uses it; Clarabel has no primal warm
    /// start and solves every node from its default initialization.
    fn solve_relaxation(
        &mut self,
        model: &ProblemModel,
        var_lower: &[f64],
        var_upper: &[f64],
        warm_start: Option<&[f64]>,
    ) -> BnbResult<RelaxationResult>;
}

/// Check the node box before calling a backend.
pub(crate) fn box_is_empty(var_lower: &[f64], var_upper: &[f64]) -> bool {
    var_lower.iter().zip(var_upper).any(|(lo, up)| lo > up)
}
