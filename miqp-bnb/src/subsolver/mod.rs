//! Convex QP subsolvers bounding the node relaxations.
//!
//! The backend is a closed set selected once at setup from the
//! [`SubsolverSettings`] variant.

pub mod backend;
pub mod clarabel_backend;
#[cfg(feature = "osqp")]
pub mod osqp_backend;

pub use backend::{RelaxationResult, RelaxationSolver, RelaxationStatus};
pub use clarabel_backend::ClarabelBackend;
#[cfg(feature = "osqp")]
pub use osqp_backend::OsqpBackend;

use crate::error::{BnbError, BnbResult};
use crate::model::ProblemModel;
use crate::settings::SubsolverSettings;

/// The subsolver instance owned by a worker.
pub enum Subsolver {
    /// Clarabel interior-point method.
    Clarabel(ClarabelBackend),

    /// OSQP operator splitting.
    #[cfg(feature = "osqp")]
    Osqp(OsqpBackend),
}

impl Subsolver {
    /// Instantiate the backend the settings select.
    pub fn new(settings: &SubsolverSettings) -> BnbResult<Self> {
        match settings {
            SubsolverSettings::Clarabel(s) => Ok(Subsolver::Clarabel(ClarabelBackend::new(s.clone()))),
            #[cfg(feature = "osqp")]
            SubsolverSettings::Osqp(s) => Ok(Subsolver::Osqp(OsqpBackend::new(s.clone()))),
            #[cfg(not(feature = "osqp"))]
            SubsolverSettings::Osqp(_) => Err(BnbError::Configuration(
                "subsolver osqp is not available in this build (enable the `osqp` feature)"
                    .to_string(),
            )),
        }
    }
}

impl RelaxationSolver for Subsolver {
    fn name(&self) -> &'static str {
        match self {
            Subsolver::Clarabel(b) => b.name(),
            #[cfg(feature = "osqp")]
            Subsolver::Osqp(b) => b.name(),
        }
    }

    fn solve_relaxation(
        &mut self,
        model: &ProblemModel,
        var_lower: &[f64],
        var_upper: &[f64],
        warm_start: Option<&[f64]>,
    ) -> BnbResult<RelaxationResult> {
        if var_lower.len() != model.num_vars() || var_upper.len() != model.num_vars() {
            return Err(BnbError::Shape(format!(
                "node bounds of length {}/{} for {} variables",
                var_lower.len(),
                var_upper.len(),
                model.num_vars()
            )));
        }
        match self {
            Subsolver::Clarabel(b) => b.solve_relaxation(model, var_lower, var_upper, warm_start),
            #[cfg(feature = "osqp")]
            Subsolver::Osqp(b) => b.solve_relaxation(model, var_lower, var_upper, warm_start),
        }
    }
}
