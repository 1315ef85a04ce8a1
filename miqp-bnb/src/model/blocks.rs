//! Problem input blocks.
//!
//! A problem is handed to the workspace as three blocks: the objective
//! (`½ xᵀQx + Lᵀx`), the constraint set (`loBs <= A x <= upBs`) and the
//! variable set (bounds, initial values, discrete indices, SOS1 groups,
//! pseudocosts). The same blocks are used for the structural edits.

use serde::{Deserialize, Serialize};

use super::sparse::{self, SparseMatrix};
use crate::error::{BnbError, BnbResult};

/// Quadratic objective block: `½ xᵀQx + Lᵀx`.
#[derive(Debug, Clone)]
pub struct ObjectiveBlock {
    /// Symmetric quadratic term (None = purely linear).
    pub quadratic: Option<SparseMatrix>,

    /// Linear term; its length defines the number of variables.
    pub linear: Vec<f64>,
}

impl ObjectiveBlock {
    /// Purely linear objective.
    pub fn linear(linear: Vec<f64>) -> Self {
        Self {
            quadratic: None,
            linear,
        }
    }

    /// Objective with a dense quadratic term.
    pub fn from_dense(quadratic: &[Vec<f64>], linear: Vec<f64>) -> BnbResult<Self> {
        Ok(Self {
            quadratic: Some(sparse::from_dense(quadratic)?),
            linear,
        })
    }

    /// Number of variables the block is defined over.
    pub fn num_vars(&self) -> usize {
        self.linear.len()
    }

    /// Check the block against a variable count.
    pub fn validate(&self, num_vars: usize) -> BnbResult<()> {
        if self.linear.len() != num_vars {
            return Err(BnbError::Shape(format!(
                "linear objective has {} entries, expected {}",
                self.linear.len(),
                num_vars
            )));
        }
        if self.linear.iter().any(|v| !v.is_finite()) {
            return Err(BnbError::Validation(
                "linear objective must be finite".to_string(),
            ));
        }
        if let Some(ref q) = self.quadratic {
            if q.rows() != num_vars || q.cols() != num_vars {
                return Err(BnbError::Shape(format!(
                    "quadratic objective is {} x {}, expected {} x {}",
                    q.rows(),
                    q.cols(),
                    num_vars,
                    num_vars
                )));
            }
            if !sparse::is_symmetric(q, 1e-10) {
                return Err(BnbError::Validation(
                    "quadratic objective must be symmetric".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Linear constraint block: `lower <= matrix * x <= upper`.
#[derive(Debug, Clone)]
pub struct ConstraintBlock {
    /// Constraint matrix (one row per constraint).
    pub matrix: SparseMatrix,

    /// Row lower bounds (`-inf` for none).
    pub lower: Vec<f64>,

    /// Row upper bounds (`+inf` for none).
    pub upper: Vec<f64>,
}

impl ConstraintBlock {
    /// Block with no rows over `num_vars` columns.
    pub fn empty(num_vars: usize) -> Self {
        Self {
            matrix: sparse::from_rows(num_vars, &[]),
            lower: Vec::new(),
            upper: Vec::new(),
        }
    }

    /// Block from dense rows.
    pub fn from_dense(rows: &[Vec<f64>], lower: Vec<f64>, upper: Vec<f64>) -> BnbResult<Self> {
        Ok(Self {
            matrix: sparse::from_dense(rows)?,
            lower,
            upper,
        })
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.matrix.rows()
    }

    /// Check the block against a variable count.
    ///
    /// A block without rows is accepted for any column count.
    pub fn validate(&self, num_vars: usize) -> BnbResult<()> {
        let m = self.matrix.rows();
        if self.lower.len() != m || self.upper.len() != m {
            return Err(BnbError::Shape(format!(
                "constraint matrix has {} rows but {} lower and {} upper bounds",
                m,
                self.lower.len(),
                self.upper.len()
            )));
        }
        if m > 0 && self.matrix.cols() != num_vars {
            return Err(BnbError::Shape(format!(
                "constraint matrix has {} columns, expected {}",
                self.matrix.cols(),
                num_vars
            )));
        }
        check_interval("constraint", &self.lower, &self.upper)
    }
}

/// Variable block: bounds, initial values and discreteness information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableBlock {
    /// Lower bounds.
    pub lower: Vec<f64>,

    /// Upper bounds.
    pub upper: Vec<f64>,

    /// Optional initial values (used as the root warm start).
    pub values: Option<Vec<f64>>,

    /// Indices of discrete variables.
    pub discrete: Vec<usize>,

    /// SOS1 group id of each discrete variable (empty, or aligned with
    /// `discrete`; 0 = no group).
    pub sos1_groups: Vec<usize>,

    /// `(down, up)` pseudocost of each discrete variable (empty, or aligned
    /// with `discrete`).
    pub pseudo_costs: Vec<(f64, f64)>,
}

impl VariableBlock {
    /// Continuous variables with the given bounds.
    pub fn continuous(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self {
            lower,
            upper,
            ..Default::default()
        }
    }

    /// Set the initial values.
    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = Some(values);
        self
    }

    /// Mark variables as discrete.
    pub fn with_discrete(mut self, discrete: Vec<usize>) -> Self {
        self.discrete = discrete;
        self
    }

    /// Assign SOS1 groups (aligned with the discrete indices).
    pub fn with_sos1_groups(mut self, groups: Vec<usize>) -> Self {
        self.sos1_groups = groups;
        self
    }

    /// Supply pseudocosts (aligned with the discrete indices).
    pub fn with_pseudo_costs(mut self, costs: Vec<(f64, f64)>) -> Self {
        self.pseudo_costs = costs;
        self
    }

    /// Number of variables in the block.
    pub fn num_vars(&self) -> usize {
        self.lower.len()
    }

    /// Validate the block on its own (indices relative to the block).
    pub fn validate(&self) -> BnbResult<()> {
        let n = self.lower.len();
        if self.upper.len() != n {
            return Err(BnbError::Shape(format!(
                "{} lower bounds but {} upper bounds",
                n,
                self.upper.len()
            )));
        }
        if let Some(ref vals) = self.values {
            if vals.len() != n {
                return Err(BnbError::Shape(format!(
                    "{} initial values for {} variables",
                    vals.len(),
                    n
                )));
            }
        }
        check_interval("variable", &self.lower, &self.upper)?;
        check_index_list(&self.discrete, n, "discrete index")?;

        if !self.sos1_groups.is_empty() && self.sos1_groups.len() != self.discrete.len() {
            return Err(BnbError::Shape(format!(
                "{} SOS1 group ids for {} discrete variables",
                self.sos1_groups.len(),
                self.discrete.len()
            )));
        }
        if !self.pseudo_costs.is_empty() {
            if self.pseudo_costs.len() != self.discrete.len() {
                return Err(BnbError::Shape(format!(
                    "{} pseudocost pairs for {} discrete variables",
                    self.pseudo_costs.len(),
                    self.discrete.len()
                )));
            }
            if self
                .pseudo_costs
                .iter()
                .any(|&(d, u)| !(d.is_finite() && u.is_finite() && d >= 0.0 && u >= 0.0))
            {
                return Err(BnbError::Validation(
                    "pseudocosts must be finite and non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A complete problem: objective, constraints and variables.
#[derive(Debug, Clone)]
pub struct ProblemDefinition {
    /// Objective block.
    pub objective: ObjectiveBlock,

    /// Constraint block.
    pub constraints: ConstraintBlock,

    /// Variable block.
    pub variables: VariableBlock,
}

impl ProblemDefinition {
    /// A problem without variables or constraints, to be grown with
    /// `append_problem`.
    pub fn empty() -> Self {
        Self {
            objective: ObjectiveBlock::linear(Vec::new()),
            constraints: ConstraintBlock::empty(0),
            variables: VariableBlock::default(),
        }
    }
}

/// Partial bound update. Each present vector replaces the whole
/// corresponding bound vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundsUpdate {
    /// New variable lower bounds.
    pub var_lower: Option<Vec<f64>>,

    /// New variable upper bounds.
    pub var_upper: Option<Vec<f64>>,

    /// New constraint lower bounds.
    pub cns_lower: Option<Vec<f64>>,

    /// New constraint upper bounds.
    pub cns_upper: Option<Vec<f64>>,
}

impl BoundsUpdate {
    /// Replace the variable lower bounds.
    pub fn var_lower(mut self, lower: Vec<f64>) -> Self {
        self.var_lower = Some(lower);
        self
    }

    /// Replace the variable upper bounds.
    pub fn var_upper(mut self, upper: Vec<f64>) -> Self {
        self.var_upper = Some(upper);
        self
    }

    /// Replace the constraint lower bounds.
    pub fn cns_lower(mut self, lower: Vec<f64>) -> Self {
        self.cns_lower = Some(lower);
        self
    }

    /// Replace the constraint upper bounds.
    pub fn cns_upper(mut self, upper: Vec<f64>) -> Self {
        self.cns_upper = Some(upper);
        self
    }

    /// True if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.var_lower.is_none()
            && self.var_upper.is_none()
            && self.cns_lower.is_none()
            && self.cns_upper.is_none()
    }
}

/// Reject NaNs and inverted intervals.
pub(crate) fn check_interval(what: &str, lower: &[f64], upper: &[f64]) -> BnbResult<()> {
    for (i, (&lo, &up)) in lower.iter().zip(upper).enumerate() {
        if lo.is_nan() || up.is_nan() {
            return Err(BnbError::Validation(format!("{} {} has a NaN bound", what, i)));
        }
        if lo > up {
            return Err(BnbError::Validation(format!(
                "{} {} has lower bound {} above upper bound {}",
                what, i, lo, up
            )));
        }
    }
    Ok(())
}

/// Indices must be `< len` (IndexError) and pairwise distinct (ValidationError).
pub(crate) fn check_index_list(indices: &[usize], len: usize, what: &str) -> BnbResult<()> {
    let mut seen = vec![false; len];
    for &i in indices {
        if i >= len {
            return Err(BnbError::Index(format!(
                "{} {} out of range (size {})",
                what, i, len
            )));
        }
        if seen[i] {
            return Err(BnbError::Validation(format!("duplicate {} {}", what, i)));
        }
        seen[i] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_block_shapes() {
        let block = ConstraintBlock::from_dense(&[vec![1.0, 1.0]], vec![0.0], vec![1.0]).unwrap();
        assert!(block.validate(2).is_ok());
        assert!(matches!(block.validate(3), Err(BnbError::Shape(_))));

        let short = ConstraintBlock::from_dense(&[vec![1.0, 1.0]], vec![], vec![1.0]).unwrap();
        assert!(matches!(short.validate(2), Err(BnbError::Shape(_))));

        // Rowless blocks fit any column count
        assert!(ConstraintBlock::empty(0).validate(7).is_ok());
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let block = ConstraintBlock::from_dense(&[vec![1.0]], vec![2.0], vec![1.0]).unwrap();
        assert!(matches!(block.validate(1), Err(BnbError::Validation(_))));
    }

    #[test]
    fn test_variable_block_listings() {
        let ok = VariableBlock::continuous(vec![0.0; 3], vec![1.0; 3])
            .with_discrete(vec![0, 2])
            .with_sos1_groups(vec![1, 1]);
        assert!(ok.validate().is_ok());

        let dup = VariableBlock::continuous(vec![0.0; 3], vec![1.0; 3]).with_discrete(vec![1, 1]);
        assert!(matches!(dup.validate(), Err(BnbError::Validation(_))));

        let out = VariableBlock::continuous(vec![0.0; 3], vec![1.0; 3]).with_discrete(vec![3]);
        assert!(matches!(out.validate(), Err(BnbError::Index(_))));

        let groups = VariableBlock::continuous(vec![0.0; 3], vec![1.0; 3])
            .with_discrete(vec![0, 1])
            .with_sos1_groups(vec![1]);
        assert!(matches!(groups.validate(), Err(BnbError::Shape(_))));
    }

    #[test]
    fn test_objective_symmetry_required() {
        let asym = ObjectiveBlock::from_dense(&[vec![1.0, 1.0], vec![0.0, 1.0]], vec![0.0; 2]).unwrap();
        assert!(matches!(asym.validate(2), Err(BnbError::Validation(_))));

        let sym = ObjectiveBlock::from_dense(&[vec![1.0, 0.5], vec![0.5, 1.0]], vec![0.0; 2]).unwrap();
        assert!(sym.validate(2).is_ok());
        assert!(matches!(sym.validate(3), Err(BnbError::Shape(_))));
    }
}
