//! Relaxation backend using OSQP.
//!
//! OSQP takes two-sided rows directly (`l <= Ax <= u`), so the node
//! relaxation is the model's constraint rows followed by one identity row
//! per variable carrying the node bounds. The parent's primal point is
//! passed as a warm start.

use std::borrow::Cow;

use osqp::{CscMatrix, Problem, Settings, Status};

use super::backend::{box_is_empty, RelaxationResult, RelaxationSolver, RelaxationStatus};
use crate::error::{BnbError, BnbResult};
use crate::model::sparse;
use crate::model::ProblemModel;
use crate::settings::OsqpSettings;

/// OSQP treats magnitudes above this as infinite.
const OSQP_INFTY: f64 = 1e30;

/// OSQP relaxation backend.
pub struct OsqpBackend {
    settings: OsqpSettings,
}

impl OsqpBackend {
    /// Create a new OSQP backend.
    pub fn new(settings: OsqpSettings) -> Self {
        Self { settings }
    }

    /// Backend settings.
    pub fn settings(&self) -> &OsqpSettings {
        &self.settings
    }

    fn solver_settings(&self) -> Settings {
        Settings::default()
            .verbose(self.settings.verbose)
            .max_iter(self.settings.max_iter)
            .eps_abs(self.settings.eps_abs)
            .eps_rel(self.settings.eps_rel)
            .eps_prim_inf(self.settings.eps_prim_inf)
            .eps_dual_inf(self.settings.eps_dual_inf)
            .rho(self.settings.rho)
            .polish(self.settings.polish)
    }
}

fn clamp_inf(v: f64) -> f64 {
    v.clamp(-OSQP_INFTY, OSQP_INFTY)
}

fn csc<'a>(nrows: usize, ncols: usize, parts: (Vec<usize>, Vec<usize>, Vec<f64>)) -> CscMatrix<'a> {
    let (indptr, indices, data) = parts;
    CscMatrix {
        nrows,
        ncols,
        indptr: Cow::Owned(indptr),
        indices: Cow::Owned(indices),
        data: Cow::Owned(data),
    }
}

impl RelaxationSolver for OsqpBackend {
    fn name(&self) -> &'static str {
        "osqp"
    }

    fn solve_relaxation(
        &mut self,
        model: &ProblemModel,
        var_lower: &[f64],
        var_upper: &[f64],
        warm_start: Option<&[f64]>,
    ) -> BnbResult<RelaxationResult> {
        if box_is_empty(var_lower, var_upper) {
            return Ok(RelaxationResult::infeasible());
        }

        let n = model.num_vars();
        let m = model.num_constraints();

        let q_rows = match model.quadratic() {
            Some(q) => sparse::to_rows(q),
            None => vec![Vec::new(); n],
        };
        let p = csc(n, n, sparse::csc_parts(n, &q_rows, true));

        let mut rows = model.constraint_rows();
        rows.extend((0..n).map(|j| vec![(j, 1.0)]));
        let a = csc(m + n, n, sparse::csc_parts(n, &rows, false));

        let l: Vec<f64> = model
            .cns_lower()
            .iter()
            .chain(var_lower)
            .map(|&v| clamp_inf(v))
            .collect();
        let u: Vec<f64> = model
            .cns_upper()
            .iter()
            .chain(var_upper)
            .map(|&v| clamp_inf(v))
            .collect();

        let mut problem = Problem::new(p, model.linear(), a, &l, &u, &self.solver_settings())
            .map_err(|e| BnbError::Solver(format!("osqp setup failed: {:?}", e)))?;
        if let Some(x0) = warm_start {
            if x0.len() == n {
                problem.warm_start_x(x0);
            }
        }

        let (status, solved) = match problem.solve() {
            Status::Solved(s) | Status::SolvedInaccurate(s) => {
                (RelaxationStatus::Optimal, Some((s.x().to_vec(), s.y().to_vec())))
            }
            Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
                (RelaxationStatus::Infeasible, None)
            }
            Status::DualInfeasible(_) | Status::DualInfeasibleInaccurate(_) => {
                (RelaxationStatus::Unbounded, None)
            }
            Status::MaxIterationsReached(_) | Status::TimeLimitReached(_) => {
                (RelaxationStatus::IterationLimit, None)
            }
            _ => (RelaxationStatus::NumericalError, None),
        };

        match solved {
            Some((primal, y)) => {
                let objective = model.objective_value(&primal);
                Ok(RelaxationResult {
                    status,
                    dual: y[..m].to_vec(),
                    reduced_costs: y[m..].to_vec(),
                    primal,
                    objective,
                })
            }
            None => Ok(RelaxationResult::failed(status)),
        }
    }
}
