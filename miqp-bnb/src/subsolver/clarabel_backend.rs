//! Relaxation backend using the Clarabel interior-point solver.
//!
//! The node relaxation is stacked into Clarabel's standard form
//! `min ½ xᵀPx + qᵀx  s.t.  Ax + s = b, s ∈ K`:
//!
//! ```text
//! Zero cone:     a_i x = u_i          (equality rows, lo == up)
//!                x_j   = u_j          (fixed variables)
//! NonNeg cone:   a_i x <= u_i         (finite upper bounds)
//!               -a_i x <= -l_i        (finite lower bounds)
//!                x_j   <= u_j
//!               -x_j   <= -l_j
//! ```
//!
//! Clarabel has no primal warm start, so the warm-start point is ignored.

use clarabel::algebra::CscMatrix;
use clarabel::solver::implementations::default::{DefaultSettings, DefaultSettingsBuilder};
use clarabel::solver::SupportedConeT::{self, NonnegativeConeT, ZeroConeT};
use clarabel::solver::{DefaultSolver, IPSolver, SolverStatus};

use super::backend::{box_is_empty, RelaxationResult, RelaxationSolver, RelaxationStatus};
use crate::error::{BnbError, BnbResult};
use crate::model::sparse::{self, SparseRow};
use crate::model::ProblemModel;
use crate::settings::ClarabelSettings;

/// Where a stacked row came from, for mapping multipliers back.
#[derive(Debug, Clone, Copy)]
enum RowOrigin {
    Constraint(usize, f64),
    Variable(usize, f64),
}

/// Problem data that only changes when the model is edited.
struct CachedData {
    revision: u64,
    p: CscMatrix<f64>,
    q: Vec<f64>,
    rows: Vec<SparseRow>,
}

/// Clarabel relaxation backend.
pub struct ClarabelBackend {
    settings: ClarabelSettings,
    cache: Option<CachedData>,
}

impl ClarabelBackend {
    /// Create a new Clarabel backend.
    pub fn new(settings: ClarabelSettings) -> Self {
        Self {
            settings,
            cache: None,
        }
    }

    /// Backend settings.
    pub fn settings(&self) -> &ClarabelSettings {
        &self.settings
    }

    fn solver_settings(&self) -> BnbResult<DefaultSettings<f64>> {
        DefaultSettingsBuilder::default()
            .verbose(self.settings.verbose)
            .max_iter(self.settings.max_iter)
            .time_limit(self.settings.time_limit)
            .tol_feas(self.settings.tol_feas)
            .tol_gap_abs(self.settings.tol_gap_abs)
            .tol_gap_rel(self.settings.tol_gap_rel)
            .equilibrate_enable(self.settings.equilibrate_enable)
            .build()
            .map_err(|e| BnbError::Configuration(format!("invalid clarabel settings: {}", e)))
    }

    /// Refresh the cached objective and constraint rows if the model changed.
    fn refresh(&mut self, model: &ProblemModel) -> &CachedData {
        let stale = self
            .cache
            .as_ref()
            .map_or(true, |c| c.revision != model.revision());
        if stale {
            self.cache = None;
        }
        self.cache.get_or_insert_with(|| {
            let n = model.num_vars();
            let p = match model.quadratic() {
                Some(q) => {
                    let (colptr, rowval, nzval) = sparse::csc_parts(n, &sparse::to_rows(q), true);
                    CscMatrix::new(n, n, colptr, rowval, nzval)
                }
                None => CscMatrix::zeros((n, n)),
            };
            CachedData {
                revision: model.revision(),
                p,
                q: model.linear().to_vec(),
                rows: model.constraint_rows(),
            }
        })
    }
}

/// Stacked rows, right-hand sides and cones of one node relaxation.
struct StackedRows {
    rows: Vec<SparseRow>,
    rhs: Vec<f64>,
    origins: Vec<RowOrigin>,
    cones: Vec<SupportedConeT<f64>>,
}

fn stack_rows(
    cns_rows: &[SparseRow],
    cns_lower: &[f64],
    cns_upper: &[f64],
    var_lower: &[f64],
    var_upper: &[f64],
) -> StackedRows {
    let mut eq = StackedRows {
        rows: Vec::new(),
        rhs: Vec::new(),
        origins: Vec::new(),
        cones: Vec::new(),
    };
    let mut ineq_rows = Vec::new();
    let mut ineq_rhs = Vec::new();
    let mut ineq_origins = Vec::new();

    for (i, row) in cns_rows.iter().enumerate() {
        let (lo, up) = (cns_lower[i], cns_upper[i]);
        if lo == up {
            eq.rows.push(row.clone());
            eq.rhs.push(up);
            eq.origins.push(RowOrigin::Constraint(i, 1.0));
            continue;
        }
        if up.is_finite() {
            ineq_rows.push(row.clone());
            ineq_rhs.push(up);
            ineq_origins.push(RowOrigin::Constraint(i, 1.0));
        }
        if lo.is_finite() {
            ineq_rows.push(row.iter().map(|&(j, v)| (j, -v)).collect());
            ineq_rhs.push(-lo);
            ineq_origins.push(RowOrigin::Constraint(i, -1.0));
        }
    }

    for (j, (&lo, &up)) in var_lower.iter().zip(var_upper).enumerate() {
        if lo == up {
            eq.rows.push(vec![(j, 1.0)]);
            eq.rhs.push(up);
            eq.origins.push(RowOrigin::Variable(j, 1.0));
            continue;
        }
        if up.is_finite() {
            ineq_rows.push(vec![(j, 1.0)]);
            ineq_rhs.push(up);
            ineq_origins.push(RowOrigin::Variable(j, 1.0));
        }
        if lo.is_finite() {
            ineq_rows.push(vec![(j, -1.0)]);
            ineq_rhs.push(-lo);
            ineq_origins.push(RowOrigin::Variable(j, -1.0));
        }
    }

    if !eq.rows.is_empty() {
        eq.cones.push(ZeroConeT(eq.rows.len()));
    }
    if !ineq_rows.is_empty() {
        eq.cones.push(NonnegativeConeT(ineq_rows.len()));
    }
    eq.rows.extend(ineq_rows);
    eq.rhs.extend(ineq_rhs);
    eq.origins.extend(ineq_origins);
    eq
}

fn map_status(status: SolverStatus) -> RelaxationStatus {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => RelaxationStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            RelaxationStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            RelaxationStatus::Unbounded
        }
        SolverStatus::MaxIterations | SolverStatus::MaxTime => RelaxationStatus::IterationLimit,
        _ => RelaxationStatus::NumericalError,
    }
}

/// Relaxation of a model without variables: feasible when every constraint
/// interval contains zero.
fn empty_relaxation(model: &ProblemModel) -> RelaxationResult {
    let feasible = model
        .cns_lower()
        .iter()
        .zip(model.cns_upper())
        .all(|(&lo, &up)| lo <= 0.0 && up >= 0.0);
    if !feasible {
        return RelaxationResult::infeasible();
    }
    RelaxationResult {
        status: RelaxationStatus::Optimal,
        primal: Vec::new(),
        dual: vec![0.0; model.num_constraints()],
        reduced_costs: Vec::new(),
        objective: 0.0,
    }
}

impl RelaxationSolver for ClarabelBackend {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve_relaxation(
        &mut self,
        model: &ProblemModel,
        var_lower: &[f64],
        var_upper: &[f64],
        _warm_start: Option<&[f64]>,
    ) -> BnbResult<RelaxationResult> {
        if box_is_empty(var_lower, var_upper) {
            return Ok(RelaxationResult::infeasible());
        }

        let n = model.num_vars();
        let m = model.num_constraints();
        if n == 0 {
            return Ok(empty_relaxation(model));
        }
        let settings = self.solver_settings()?;
        let cache = self.refresh(model);

        let stacked = stack_rows(
            &cache.rows,
            model.cns_lower(),
            model.cns_upper(),
            var_lower,
            var_upper,
        );
        let (colptr, rowval, nzval) = sparse::csc_parts(n, &stacked.rows, false);
        let a = CscMatrix::new(stacked.rows.len(), n, colptr, rowval, nzval);

        let mut solver = DefaultSolver::new(&cache.p, &cache.q, &a, &stacked.rhs, &stacked.cones, settings)
            .map_err(|e| BnbError::Solver(format!("clarabel setup failed: {:?}", e)))?;
        solver.solve();

        let status = map_status(solver.solution.status);
        if status != RelaxationStatus::Optimal {
            return Ok(RelaxationResult::failed(status));
        }

        let mut dual = vec![0.0; m];
        let mut reduced_costs = vec![0.0; n];
        for (k, origin) in stacked.origins.iter().enumerate() {
            let z = solver.solution.z[k];
            match *origin {
                RowOrigin::Constraint(i, sign) => dual[i] += sign * z,
                RowOrigin::Variable(j, sign) => reduced_costs[j] += sign * z,
            }
        }

        let primal = solver.solution.x.clone();
        let objective = model.objective_value(&primal);

        Ok(RelaxationResult {
            status,
            primal,
            dual,
            reduced_costs,
            objective,
        })
    }
}
