//! Solution records and search status.

use serde::{Deserialize, Serialize};

/// An accepted integer-feasible point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Primal point.
    pub point: Vec<f64>,

    /// Objective value at `point`.
    pub objective: f64,

    /// Id of the node whose relaxation produced the point.
    pub node_id: u64,

    /// Worker that found it (0 = local or leading worker).
    pub worker: usize,
}

/// Terminal description of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusDescription {
    /// The frontier is exhausted (or the gap closed) and a solution exists.
    OptimalSolutionFound,

    /// The frontier is exhausted and no solution exists.
    Infeasible,

    /// A solution exists but the search was stopped before proving optimality.
    SuboptimalSolutionFound,

    /// No solution yet and the search is not finished.
    Unknown,
}

impl StatusDescription {
    /// Returns true if a feasible solution was found.
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            StatusDescription::OptimalSolutionFound | StatusDescription::SuboptimalSolutionFound
        )
    }
}

/// Why the last `solve()` returned with a non-empty frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// `timeLimit` elapsed.
    TimeLimit,

    /// `iterationsLimit` nodes processed.
    IterationsLimit,

    /// `numSolutionsLimit` solutions accepted.
    SolutionsLimit,

    /// Returned after a new solution in interactive mode.
    Interactive,
}

/// Snapshot of the search state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStatus {
    /// Terminal description.
    pub description: StatusDescription,

    /// Best known objective (`+inf` without a solution).
    pub obj_up_b: f64,

    /// Lower bound on the optimal objective.
    pub obj_lo_b: f64,

    /// Absolute gap `obj_up_b - obj_lo_b`.
    pub abs_gap: f64,

    /// Relative gap.
    pub rel_gap: f64,

    /// Nodes processed since the last reset.
    pub explored_nodes: u64,

    /// Wall-clock time of the last `solve()` in seconds.
    pub solve_time: f64,

    /// Set when the last `solve()` stopped on a limit.
    pub stop_reason: Option<StopReason>,
}

impl SearchStatus {
    /// Compute relative gap.
    pub fn compute_gap(primal: f64, dual: f64) -> f64 {
        if primal.is_infinite() || dual.is_infinite() {
            return f64::INFINITY;
        }
        let denom = primal.abs().max(1e-10);
        ((primal - dual) / denom).max(0.0)
    }

    /// Absolute gap, `+inf` when either bound is infinite.
    pub fn compute_abs_gap(primal: f64, dual: f64) -> f64 {
        if primal.is_infinite() || dual.is_infinite() {
            return f64::INFINITY;
        }
        (primal - dual).max(0.0)
    }
}
