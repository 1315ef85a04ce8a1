//! Branching: SOS1 groups first, then pseudocost variable selection.

use super::{BoundChange, BranchInfo};
use crate::model::ProblemModel;

/// A branching decision: the tightenings of each child, in push order.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchDecision {
    /// Split on a violated SOS1 group.
    Sos1 {
        /// Group id.
        group: usize,

        /// Per child, the variables fixed to zero.
        children: Vec<Vec<BoundChange>>,
    },

    /// Floor/ceil split on a fractional discrete variable.
    Variable {
        /// Variable to branch on.
        var: usize,

        /// Current (fractional) value.
        value: f64,

        /// Bound change for "down" branch (x <= floor(value)).
        down_branch: BoundChange,

        /// Bound change for "up" branch (x >= ceil(value)).
        up_branch: BoundChange,

        /// Score of this decision (for logging/debugging).
        score: f64,
    },
}

/// Distance to the floor, in `[0, 1)`.
fn frac_part(value: f64) -> f64 {
    value - value.floor()
}

/// Branching engine with online pseudocosts.
pub struct BranchingEngine {
    /// pseudocosts_down[i] = average objective change per unit decrease
    /// pseudocosts_up[i] = average objective change per unit increase
    pseudocosts_down: Vec<f64>,
    pseudocosts_up: Vec<f64>,

    /// Number of observations behind each average.
    branch_count_down: Vec<u64>,
    branch_count_up: Vec<u64>,
}

impl BranchingEngine {
    /// Create an engine seeded with the model's pseudocost estimates.
    pub fn new(model: &ProblemModel) -> Self {
        let mut engine = Self {
            pseudocosts_down: Vec::new(),
            pseudocosts_up: Vec::new(),
            branch_count_down: Vec::new(),
            branch_count_up: Vec::new(),
        };
        engine.resize(model);
        engine
    }

    /// Follow a change in the number of variables; new variables are seeded
    /// from the model.
    pub fn resize(&mut self, model: &ProblemModel) {
        let n = model.num_vars();
        let old = self.pseudocosts_down.len().min(n);
        self.pseudocosts_down.truncate(old);
        self.pseudocosts_up.truncate(old);
        self.branch_count_down.resize(old, 0);
        self.branch_count_up.resize(old, 0);
        for i in old..n {
            let (down, up) = model.pseudo_cost(i);
            self.pseudocosts_down.push(down);
            self.pseudocosts_up.push(up);
        }
        self.branch_count_down.resize(n, 0);
        self.branch_count_up.resize(n, 0);
    }

    /// Current `(down, up)` pseudocosts of a variable.
    pub fn pseudocosts(&self, var: usize) -> (f64, f64) {
        (self.pseudocosts_down[var], self.pseudocosts_up[var])
    }

    /// Select a branching decision for a relaxation point.
    ///
    /// Returns None if the point is integer feasible. `lower`/`upper` is the
    /// node box.
    pub fn select(
        &self,
        x: &[f64],
        model: &ProblemModel,
        lower: &[f64],
        upper: &[f64],
        tol: f64,
    ) -> Option<BranchDecision> {
        if let Some((group, members)) = model.violated_sos1_groups(x, tol).into_iter().next() {
            return Some(self.sos1_decision(group, &members, x, lower, upper, tol));
        }

        let fractional = model.fractional_vars(x, tol);
        self.select_pseudocost(&fractional, lower, upper)
    }

    /// Children of a violated SOS1 group.
    ///
    /// One child per nonzero member, zeroing every other member; plus, when
    /// some members are already zero, one child zeroing all nonzero members.
    /// Children whose box would be empty are left out.
    fn sos1_decision(
        &self,
        group: usize,
        members: &[usize],
        x: &[f64],
        lower: &[f64],
        upper: &[f64],
        tol: f64,
    ) -> BranchDecision {
        let (nonzero, zero): (Vec<usize>, Vec<usize>) =
            members.iter().partition(|&&i| x[i].abs() > tol);
        let can_zero = |i: usize| lower[i] <= 0.0 && upper[i] >= 0.0;

        let mut children = Vec::new();
        for &keep in &nonzero {
            let fixed: Vec<usize> = members.iter().copied().filter(|&i| i != keep).collect();
            if fixed.iter().all(|&i| can_zero(i)) {
                children.push(fixed.into_iter().map(BoundChange::zero).collect());
            }
        }
        if !zero.is_empty() && nonzero.iter().all(|&i| can_zero(i)) {
            children.push(nonzero.iter().map(|&i| BoundChange::zero(i)).collect());
        }

        BranchDecision::Sos1 { group, children }
    }

    /// Select variable with best pseudocost score (lowest index on ties).
    fn select_pseudocost(
        &self,
        fractional: &[(usize, f64, f64)],
        lower: &[f64],
        upper: &[f64],
    ) -> Option<BranchDecision> {
        let mut best: Option<(usize, f64, f64)> = None;
        for &(var, value, _) in fractional {
            let score = self.pseudocost_score(var, value);
            // Fractional variables come sorted by index
            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((var, value, score));
            }
        }
        let (var, value, score) = best?;

        Some(BranchDecision::Variable {
            var,
            value,
            down_branch: BoundChange::down_branch(var, lower[var], value),
            up_branch: BoundChange::up_branch(var, upper[var], value),
            score,
        })
    }

    /// Compute pseudocost score for a variable.
    fn pseudocost_score(&self, var: usize, value: f64) -> f64 {
        let frac = frac_part(value);
        let down_frac = frac;
        let up_frac = 1.0 - frac;

        let down_cost = down_frac * self.pseudocosts_down[var];
        let up_cost = up_frac * self.pseudocosts_up[var];

        // Product score prefers balanced improvements in both directions
        (down_cost * up_cost).max(1e-10)
    }

    /// Branch info for the two children of a variable decision.
    pub fn child_infos(var: usize, value: f64, parent_objective: f64) -> (BranchInfo, BranchInfo) {
        let frac = frac_part(value);
        (
            BranchInfo {
                var,
                up: false,
                distance: frac,
                parent_objective,
            },
            BranchInfo {
                var,
                up: true,
                distance: 1.0 - frac,
                parent_objective,
            },
        )
    }

    /// Update pseudocosts once a child relaxation is known.
    ///
    /// The observation is the objective gain per unit of distance, folded in
    /// as a running average.
    pub fn update_pseudocosts(&mut self, info: &BranchInfo, child_objective: f64) {
        if info.var >= self.pseudocosts_down.len() || info.distance <= 1e-6 {
            return;
        }
        if !child_objective.is_finite() || !info.parent_objective.is_finite() {
            return;
        }
        let pc = (child_objective - info.parent_objective).max(0.0) / info.distance;

        let (costs, counts) = if info.up {
            (&mut self.pseudocosts_up, &mut self.branch_count_up)
        } else {
            (&mut self.pseudocosts_down, &mut self.branch_count_down)
        };
        let count = counts[info.var] as f64;
        costs[info.var] = (costs[info.var] * count + pc) / (count + 1.0);
        counts[info.var] += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstraintBlock, ObjectiveBlock, ProblemDefinition, VariableBlock};

    fn model(groups: Vec<usize>) -> ProblemModel {
        ProblemModel::new(ProblemDefinition {
            objective: ObjectiveBlock::linear(vec![0.0; 4]),
            constraints: ConstraintBlock::empty(4),
            variables: VariableBlock::continuous(vec![0.0; 4], vec![3.0; 4])
                .with_discrete(vec![0, 1, 2, 3])
                .with_sos1_groups(groups),
        })
        .unwrap()
    }

    #[test]
    fn test_sos1_takes_precedence() {
        let m = model(vec![0, 2, 2, 2]);
        let engine = BranchingEngine::new(&m);
        let x = [0.5, 1.0, 1.0, 0.0];

        match engine.select(&x, &m, m.var_lower(), m.var_upper(), 1e-6) {
            Some(BranchDecision::Sos1 { group, children }) => {
                assert_eq!(group, 2);
                // Keep 1, keep 2, and zero both
                assert_eq!(children.len(), 3);
                assert_eq!(children[0], vec![BoundChange::zero(2), BoundChange::zero(3)]);
                assert_eq!(children[1], vec![BoundChange::zero(1), BoundChange::zero(3)]);
                assert_eq!(children[2], vec![BoundChange::zero(1), BoundChange::zero(2)]);
            }
            other => panic!("expected SOS1 branching, got {:?}", other),
        }
    }

    #[test]
    fn test_sos1_without_zero_members() {
        let m = model(vec![1, 1, 0, 0]);
        let engine = BranchingEngine::new(&m);
        match engine.select(&[1.0, 2.0, 0.0, 0.0], &m, m.var_lower(), m.var_upper(), 1e-6) {
            Some(BranchDecision::Sos1 { children, .. }) => assert_eq!(children.len(), 2),
            other => panic!("expected SOS1 branching, got {:?}", other),
        }
    }

    #[test]
    fn test_pseudocost_selection_and_ties() {
        let m = model(vec![0; 4]);
        let engine = BranchingEngine::new(&m);

        // Equal pseudocosts: 0.5 beats 0.2, and index 1 wins the tie with 3
        let x = [1.2, 0.5, 2.0, 1.5];
        match engine.select(&x, &m, m.var_lower(), m.var_upper(), 1e-6) {
            Some(BranchDecision::Variable {
                var,
                down_branch,
                up_branch,
                ..
            }) => {
                assert_eq!(var, 1);
                assert_eq!(down_branch.upper, 0.0);
                assert_eq!(up_branch.lower, 1.0);
            }
            other => panic!("expected variable branching, got {:?}", other),
        }

        assert!(engine
            .select(&[1.0, 0.0, 2.0, 3.0], &m, m.var_lower(), m.var_upper(), 1e-6)
            .is_none());
    }

    #[test]
    fn test_pseudocost_running_average() {
        let m = model(vec![0; 4]);
        let mut engine = BranchingEngine::new(&m);
        let (down, up) = BranchingEngine::child_infos(0, 2.25, 1.0);
        assert!((down.distance - 0.25).abs() < 1e-12);
        assert!((up.distance - 0.75).abs() < 1e-12);

        // Gain 0.5 over 0.25 => 2.0; first observation replaces the seed
        engine.update_pseudocosts(&down, 1.5);
        assert!((engine.pseudocosts(0).0 - 2.0).abs() < 1e-12);

        // Gain 1.0 over 0.25 => 4.0; average (2 + 4) / 2
        engine.update_pseudocosts(&down, 2.0);
        assert!((engine.pseudocosts(0).0 - 3.0).abs() < 1e-12);

        // Up side untouched
        assert_eq!(engine.pseudocosts(0).1, 1.0);
    }

    #[test]
    fn test_negative_values_split_correctly() {
        let m = ProblemModel::new(ProblemDefinition {
            objective: ObjectiveBlock::linear(vec![0.0]),
            constraints: ConstraintBlock::empty(1),
            variables: VariableBlock::continuous(vec![-5.0], vec![5.0]).with_discrete(vec![0]),
        })
        .unwrap();
        let engine = BranchingEngine::new(&m);
        match engine.select(&[-1.3], &m, m.var_lower(), m.var_upper(), 1e-6) {
            Some(BranchDecision::Variable {
                down_branch,
                up_branch,
                ..
            }) => {
                assert_eq!(down_branch.upper, -2.0);
                assert_eq!(up_branch.lower, -1.0);
            }
            other => panic!("expected variable branching, got {:?}", other),
        }
    }
}
