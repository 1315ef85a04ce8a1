//! Mutable MIQP problem model.

use std::collections::BTreeMap;

use super::blocks::{
    check_index_list, check_interval, BoundsUpdate, ConstraintBlock, ObjectiveBlock,
    ProblemDefinition, VariableBlock,
};
use super::sparse::{self, SparseMatrix, SparseRow};
use crate::error::{BnbError, BnbResult};

/// How an edit affects the feasible region and the objective.
///
/// Ordered from mildest to most disruptive, so the combined impact of
/// several edits is their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditImpact {
    /// Nothing that relaxations depend on changed (e.g. row order).
    Neutral,

    /// The feasible region can only have shrunk.
    Tightening,

    /// The feasible region may have grown or the objective changed.
    Loosening,

    /// The variable space changed; existing points are meaningless.
    Reshaped,
}

impl EditImpact {
    /// Combined impact of two edits.
    pub fn combine(self, other: EditImpact) -> EditImpact {
        self.max(other)
    }
}

/// Mixed-integer quadratic program with structural edits.
///
/// ```text
/// minimize    ½ xᵀQx + Lᵀx
/// subject to  cns_lower <= A x <= cns_upper
///             var_lower <=  x  <= var_upper
///             x[i] integer          for i in discrete
///             at most one nonzero   per SOS1 group
/// ```
///
/// Every edit validates its arguments completely before touching the
/// model, so a failed edit leaves it unmodified.
#[derive(Debug, Clone)]
pub struct ProblemModel {
    quadratic: Option<SparseMatrix>,
    linear: Vec<f64>,

    cns_matrix: SparseMatrix,
    cns_lower: Vec<f64>,
    cns_upper: Vec<f64>,

    var_lower: Vec<f64>,
    var_upper: Vec<f64>,
    values: Option<Vec<f64>>,

    /// Sorted, distinct.
    discrete: Vec<usize>,
    /// Per variable, 0 = no group.
    sos1_group: Vec<usize>,
    /// Per variable `(down, up)` initial estimates.
    pseudo_costs: Vec<(f64, f64)>,

    revision: u64,
}

impl ProblemModel {
    /// Build a model from a complete problem definition.
    pub fn new(def: ProblemDefinition) -> BnbResult<Self> {
        let ProblemDefinition {
            objective,
            constraints,
            variables,
        } = def;

        variables.validate()?;
        let n = variables.num_vars();
        objective.validate(n)?;
        constraints.validate(n)?;

        let mut model = Self {
            quadratic: None,
            linear: Vec::new(),
            cns_matrix: sparse::from_rows(0, &[]),
            cns_lower: Vec::new(),
            cns_upper: Vec::new(),
            var_lower: Vec::new(),
            var_upper: Vec::new(),
            values: None,
            discrete: Vec::new(),
            sos1_group: Vec::new(),
            pseudo_costs: Vec::new(),
            revision: 0,
        };
        model.commit_variables(variables);
        model.linear = objective.linear;
        model.quadratic = objective.quadratic.map(|q| normalize(n, &q));
        model.cns_matrix = normalize(n, &constraints.matrix);
        model.cns_lower = constraints.lower;
        model.cns_upper = constraints.upper;

        Ok(model)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.var_lower.len()
    }

    /// Number of constraints.
    pub fn num_constraints(&self) -> usize {
        self.cns_lower.len()
    }

    /// Number of discrete variables.
    pub fn num_discrete(&self) -> usize {
        self.discrete.len()
    }

    /// Sorted indices of the discrete variables.
    pub fn discrete(&self) -> &[usize] {
        &self.discrete
    }

    /// Whether variable `i` is discrete.
    pub fn is_discrete(&self, i: usize) -> bool {
        self.discrete.binary_search(&i).is_ok()
    }

    /// SOS1 group id of variable `i` (0 = none).
    pub fn sos1_group(&self, i: usize) -> usize {
        self.sos1_group.get(i).copied().unwrap_or(0)
    }

    /// Members of every SOS1 group, keyed by group id.
    pub fn sos1_members(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &g) in self.sos1_group.iter().enumerate() {
            if g != 0 {
                groups.entry(g).or_default().push(i);
            }
        }
        groups
    }

    /// Initial `(down, up)` pseudocost estimate of variable `i`.
    pub fn pseudo_cost(&self, i: usize) -> (f64, f64) {
        self.pseudo_costs.get(i).copied().unwrap_or((1.0, 1.0))
    }

    /// Quadratic term (None = purely linear).
    pub fn quadratic(&self) -> Option<&SparseMatrix> {
        self.quadratic.as_ref()
    }

    /// Linear objective term.
    pub fn linear(&self) -> &[f64] {
        &self.linear
    }

    /// Constraint matrix (CSR, `num_constraints x num_vars`).
    pub fn constraint_matrix(&self) -> &SparseMatrix {
        &self.cns_matrix
    }

    /// Variable lower bounds.
    pub fn var_lower(&self) -> &[f64] {
        &self.var_lower
    }

    /// Variable upper bounds.
    pub fn var_upper(&self) -> &[f64] {
        &self.var_upper
    }

    /// Constraint lower bounds.
    pub fn cns_lower(&self) -> &[f64] {
        &self.cns_lower
    }

    /// Constraint upper bounds.
    pub fn cns_upper(&self) -> &[f64] {
        &self.cns_upper
    }

    /// Initial values, if any were supplied.
    pub fn initial_values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    /// Counter bumped by every committed edit.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Nonzero columns of every constraint row.
    pub fn constraints_sparsity(&self) -> Vec<Vec<usize>> {
        sparse::sparsity(&self.cns_matrix)
    }

    /// Nonzero columns of one constraint row.
    pub fn constraint_sparsity(&self, index: usize) -> BnbResult<Vec<usize>> {
        let m = self.num_constraints();
        if index >= m {
            return Err(BnbError::Index(format!(
                "constraint {} out of range ({} constraints)",
                index, m
            )));
        }
        Ok(self
            .cns_matrix
            .outer_view(index)
            .map(|row| row.indices().to_vec())
            .unwrap_or_default())
    }

    /// Nonzero pattern of the quadratic term, one row per variable.
    pub fn objective_sparsity(&self) -> Vec<Vec<usize>> {
        match self.quadratic {
            Some(ref q) => sparse::sparsity(q),
            None => vec![Vec::new(); self.num_vars()],
        }
    }

    /// Row list view of the constraint matrix.
    pub fn constraint_rows(&self) -> Vec<SparseRow> {
        sparse::to_rows(&self.cns_matrix)
    }

    // ---------------------------------------------------------------------
    // Evaluation
    // ---------------------------------------------------------------------

    /// Objective value `½ xᵀQx + Lᵀx`.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        let mut obj: f64 = self.linear.iter().zip(x).map(|(c, v)| c * v).sum();
        if let Some(ref q) = self.quadratic {
            let mut quad = 0.0;
            for (i, row) in q.outer_iterator().enumerate() {
                for (j, &v) in row.iter() {
                    quad += x[i] * v * x[j];
                }
            }
            obj += 0.5 * quad;
        }
        obj
    }

    /// Constraint activities `A x`.
    pub fn constraint_activity(&self, x: &[f64]) -> Vec<f64> {
        self.cns_matrix
            .outer_iterator()
            .map(|row| row.iter().map(|(j, &v)| v * x[j]).sum())
            .collect()
    }

    /// Get the fractionality of a value (distance to nearest integer).
    pub fn fractionality(val: f64) -> f64 {
        let frac = val.fract().abs();
        frac.min(1.0 - frac)
    }

    /// Fractional discrete variables: `(index, value, fractionality)`.
    pub fn fractional_vars(&self, x: &[f64], tol: f64) -> Vec<(usize, f64, f64)> {
        self.discrete
            .iter()
            .filter_map(|&i| {
                let frac = Self::fractionality(x[i]);
                (frac > tol).then_some((i, x[i], frac))
            })
            .collect()
    }

    /// SOS1 groups with more than one nonzero member, by increasing group id.
    pub fn violated_sos1_groups(&self, x: &[f64], tol: f64) -> Vec<(usize, Vec<usize>)> {
        self.sos1_members()
            .into_iter()
            .filter(|(_, members)| members.iter().filter(|&&i| x[i].abs() > tol).count() > 1)
            .collect()
    }

    /// Check that all discrete variables are integral and all SOS1 groups hold.
    pub fn is_integer_feasible(&self, x: &[f64], tol: f64) -> bool {
        self.fractional_vars(x, tol).is_empty() && self.violated_sos1_groups(x, tol).is_empty()
    }

    /// Full feasibility check of a point against the current model.
    pub fn is_feasible(&self, x: &[f64], primal_tol: f64, int_tol: f64) -> bool {
        if x.len() != self.num_vars() {
            return false;
        }
        let bounds_ok = x
            .iter()
            .zip(self.var_lower.iter().zip(&self.var_upper))
            .all(|(&v, (&lo, &up))| v >= lo - primal_tol && v <= up + primal_tol);
        if !bounds_ok {
            return false;
        }
        let rows_ok = self
            .constraint_activity(x)
            .iter()
            .zip(self.cns_lower.iter().zip(&self.cns_upper))
            .all(|(&ax, (&lo, &up))| ax >= lo - primal_tol && ax <= up + primal_tol);
        rows_ok && self.is_integer_feasible(x, int_tol)
    }

    // ---------------------------------------------------------------------
    // Structural edits
    // ---------------------------------------------------------------------

    /// Append constraint rows at the end.
    pub fn append_constraints(&mut self, block: ConstraintBlock) -> BnbResult<EditImpact> {
        let m = self.num_constraints();
        self.insert_constraints_at(m, block)
    }

    /// Insert constraint rows before row `index` (`index == num_constraints` appends).
    pub fn insert_constraints_at(
        &mut self,
        index: usize,
        block: ConstraintBlock,
    ) -> BnbResult<EditImpact> {
        let m = self.num_constraints();
        if index > m {
            return Err(BnbError::Index(format!(
                "insertion point {} out of range ({} constraints)",
                index, m
            )));
        }
        block.validate(self.num_vars())?;
        if block.num_rows() == 0 {
            return Ok(EditImpact::Neutral);
        }

        let mut rows = self.constraint_rows();
        let new_rows = sparse::to_rows(&block.matrix);
        rows.splice(index..index, new_rows);
        self.cns_lower.splice(index..index, block.lower);
        self.cns_upper.splice(index..index, block.upper);
        self.cns_matrix = sparse::from_rows(self.num_vars(), &rows);
        self.bump();

        Ok(EditImpact::Tightening)
    }

    /// Remove the listed constraint rows.
    pub fn remove_constraints(&mut self, indices: &[usize]) -> BnbResult<EditImpact> {
        let m = self.num_constraints();
        check_index_list(indices, m, "constraint index")?;
        if indices.is_empty() {
            return Ok(EditImpact::Neutral);
        }

        let mut keep = vec![true; m];
        for &i in indices {
            keep[i] = false;
        }
        let rows: Vec<SparseRow> = self
            .constraint_rows()
            .into_iter()
            .zip(&keep)
            .filter_map(|(row, &k)| k.then_some(row))
            .collect();
        self.cns_lower = retain_flagged(&self.cns_lower, &keep);
        self.cns_upper = retain_flagged(&self.cns_upper, &keep);
        self.cns_matrix = sparse::from_rows(self.num_vars(), &rows);
        self.bump();

        Ok(EditImpact::Loosening)
    }

    /// Reorder constraint rows: new row `k` is old row `permutation[k]`.
    pub fn permute_constraints(&mut self, permutation: &[usize]) -> BnbResult<EditImpact> {
        let m = self.num_constraints();
        if permutation.len() != m {
            return Err(BnbError::Validation(format!(
                "permutation has {} entries for {} constraints",
                permutation.len(),
                m
            )));
        }
        check_index_list(permutation, m, "permutation entry").map_err(|e| match e {
            BnbError::Index(msg) => BnbError::Validation(msg),
            other => other,
        })?;

        let rows = self.constraint_rows();
        let permuted: Vec<SparseRow> = permutation.iter().map(|&p| rows[p].clone()).collect();
        self.cns_lower = permutation.iter().map(|&p| self.cns_lower[p]).collect();
        self.cns_upper = permutation.iter().map(|&p| self.cns_upper[p]).collect();
        self.cns_matrix = sparse::from_rows(self.num_vars(), &permuted);
        self.bump();

        Ok(EditImpact::Neutral)
    }

    /// Replace any subset of the four bound vectors.
    pub fn update_bounds(&mut self, update: &BoundsUpdate) -> BnbResult<EditImpact> {
        let n = self.num_vars();
        let m = self.num_constraints();
        for (vec, len, what) in [
            (&update.var_lower, n, "variable lower bounds"),
            (&update.var_upper, n, "variable upper bounds"),
            (&update.cns_lower, m, "constraint lower bounds"),
            (&update.cns_upper, m, "constraint upper bounds"),
        ] {
            if let Some(v) = vec {
                if v.len() != len {
                    return Err(BnbError::Shape(format!(
                        "{} {} given, expected {}",
                        v.len(),
                        what,
                        len
                    )));
                }
            }
        }

        let var_lower = update.var_lower.as_ref().unwrap_or(&self.var_lower);
        let var_upper = update.var_upper.as_ref().unwrap_or(&self.var_upper);
        let cns_lower = update.cns_lower.as_ref().unwrap_or(&self.cns_lower);
        let cns_upper = update.cns_upper.as_ref().unwrap_or(&self.cns_upper);
        check_interval("variable", var_lower, var_upper)?;
        check_interval("constraint", cns_lower, cns_upper)?;

        let impact = bound_impact(&self.var_lower, &self.var_upper, var_lower, var_upper)
            .combine(bound_impact(&self.cns_lower, &self.cns_upper, cns_lower, cns_upper));

        let (var_lower, var_upper) = (var_lower.clone(), var_upper.clone());
        let (cns_lower, cns_upper) = (cns_lower.clone(), cns_upper.clone());
        self.var_lower = var_lower;
        self.var_upper = var_upper;
        self.cns_lower = cns_lower;
        self.cns_upper = cns_upper;
        if impact != EditImpact::Neutral {
            self.bump();
        }

        Ok(impact)
    }

    /// Replace the objective.
    pub fn set_objective(&mut self, block: ObjectiveBlock) -> BnbResult<EditImpact> {
        let n = self.num_vars();
        block.validate(n)?;
        self.linear = block.linear;
        self.quadratic = block.quadratic.map(|q| normalize(n, &q));
        self.bump();
        Ok(EditImpact::Loosening)
    }

    /// Replace the whole constraint set.
    pub fn set_constraint_set(&mut self, block: ConstraintBlock) -> BnbResult<EditImpact> {
        let n = self.num_vars();
        block.validate(n)?;
        self.cns_matrix = normalize(n, &block.matrix);
        self.cns_lower = block.lower;
        self.cns_upper = block.upper;
        self.bump();
        Ok(EditImpact::Loosening)
    }

    /// Extend the problem with new variables, constraints and objective terms.
    ///
    /// Discrete indices in `variables` are relative to the new block. The
    /// constraint and objective blocks are defined over the extended space
    /// (old variables first); the objective block is added to the current
    /// objective.
    pub fn append_problem(
        &mut self,
        variables: VariableBlock,
        constraints: ConstraintBlock,
        objective: ObjectiveBlock,
    ) -> BnbResult<EditImpact> {
        variables.validate().map_err(|e| e.in_block("variables"))?;
        let n_old = self.num_vars();
        let n_new = n_old + variables.num_vars();
        constraints
            .validate(n_new)
            .map_err(|e| e.in_block("constraints"))?;
        objective
            .validate(n_new)
            .map_err(|e| e.in_block("objective"))?;

        // Widen the existing rows, then append the new ones
        let mut rows = self.constraint_rows();
        rows.extend(sparse::to_rows(&constraints.matrix));
        self.cns_matrix = sparse::from_rows(n_new, &rows);
        self.cns_lower.extend(constraints.lower);
        self.cns_upper.extend(constraints.upper);

        let mut linear = std::mem::take(&mut self.linear);
        linear.resize(n_new, 0.0);
        for (l, add) in linear.iter_mut().zip(&objective.linear) {
            *l += add;
        }
        self.linear = linear;

        let mut q_rows = match self.quadratic {
            Some(ref q) => sparse::to_rows(q),
            None => Vec::new(),
        };
        q_rows.resize(n_new, Vec::new());
        if let Some(ref q) = objective.quadratic {
            for (row, add) in q_rows.iter_mut().zip(sparse::to_rows(q)) {
                row.extend(add);
            }
        }
        self.quadratic = if q_rows.iter().all(|r| r.is_empty()) {
            None
        } else {
            Some(sparse::from_rows(n_new, &q_rows))
        };

        self.commit_variables(variables);
        self.bump();

        Ok(EditImpact::Reshaped)
    }

    /// Mark variables as discrete, optionally assigning SOS1 groups.
    ///
    /// Idempotent; discreteness is never removed. A group id of 0 leaves the
    /// variable's current group untouched.
    pub fn integralize_variables(
        &mut self,
        indices: &[usize],
        sos1_groups: Option<&[usize]>,
    ) -> BnbResult<EditImpact> {
        check_index_list(indices, self.num_vars(), "variable index")?;
        if let Some(groups) = sos1_groups {
            if groups.len() != indices.len() {
                return Err(BnbError::Shape(format!(
                    "{} SOS1 group ids for {} variables",
                    groups.len(),
                    indices.len()
                )));
            }
        }

        let mut changed = false;
        for (k, &i) in indices.iter().enumerate() {
            if let Err(pos) = self.discrete.binary_search(&i) {
                self.discrete.insert(pos, i);
                changed = true;
            }
            if let Some(groups) = sos1_groups {
                if groups[k] != 0 && self.sos1_group[i] != groups[k] {
                    self.sos1_group[i] = groups[k];
                    changed = true;
                }
            }
        }

        if changed {
            self.bump();
            Ok(EditImpact::Tightening)
        } else {
            Ok(EditImpact::Neutral)
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn bump(&mut self) {
        self.revision += 1;
    }

    /// Append a validated variable block.
    fn commit_variables(&mut self, block: VariableBlock) {
        let offset = self.num_vars();
        let added = block.num_vars();

        self.values = match (self.values.take(), block.values) {
            (None, None) => None,
            (old, new) => {
                let mut vals = old.unwrap_or_else(|| {
                    project_zero(&self.var_lower[..offset], &self.var_upper[..offset])
                });
                vals.extend(new.unwrap_or_else(|| project_zero(&block.lower, &block.upper)));
                Some(vals)
            }
        };

        self.var_lower.extend(block.lower);
        self.var_upper.extend(block.upper);
        self.sos1_group.resize(offset + added, 0);
        self.pseudo_costs.resize(offset + added, (1.0, 1.0));

        for (k, &i) in block.discrete.iter().enumerate() {
            let var = offset + i;
            if let Err(pos) = self.discrete.binary_search(&var) {
                self.discrete.insert(pos, var);
            }
            if let Some(&g) = block.sos1_groups.get(k) {
                self.sos1_group[var] = g;
            }
            if let Some(&pc) = block.pseudo_costs.get(k) {
                self.pseudo_costs[var] = pc;
            }
        }
    }
}

/// Rebuild any storage as CSR with exactly `ncols` columns.
fn normalize(ncols: usize, mat: &SparseMatrix) -> SparseMatrix {
    sparse::from_rows(ncols, &sparse::to_rows(mat))
}

fn retain_flagged(values: &[f64], keep: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(keep)
        .filter_map(|(&v, &k)| k.then_some(v))
        .collect()
}

/// Closest point to the origin inside the box.
fn project_zero(lower: &[f64], upper: &[f64]) -> Vec<f64> {
    lower
        .iter()
        .zip(upper)
        .map(|(&lo, &up)| 0.0_f64.max(lo).min(up))
        .collect()
}

/// Classify a bound replacement.
fn bound_impact(old_lo: &[f64], old_up: &[f64], new_lo: &[f64], new_up: &[f64]) -> EditImpact {
    let mut impact = EditImpact::Neutral;
    for i in 0..old_lo.len() {
        if new_lo[i] < old_lo[i] || new_up[i] > old_up[i] {
            return EditImpact::Loosening;
        }
        if new_lo[i] > old_lo[i] || new_up[i] < old_up[i] {
            impact = EditImpact::Tightening;
        }
    }
    impact
}
