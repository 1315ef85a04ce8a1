//! miqp-bnb: branch and bound for mixed-integer convex quadratic programs
//!
//! Solves problems of the form
//!
//! ```text
//! minimize    ½ xᵀQx + Lᵀx
//! subject to  loBs <= A x <= upBs
//!             lower <= x <= upper
//!             x_i integer            for i in the discrete set
//!             at most one nonzero    in every SOS1 group
//! ```
//!
//! The search relaxes nodes with a convex QP subsolver (Clarabel, or OSQP
//! behind the `osqp` feature), branches on violated SOS1 groups first and
//! then on fractional variables ranked by pseudocosts, and explores the
//! frontier best-bound-first.
//!
//! The [`Workspace`] keeps the problem mutable between solves: constraints
//! can be added, removed or permuted, bounds tightened and variables made
//! discrete, and the search tree is re-bounded instead of rebuilt whenever
//! the edit allows it. With several workers the frontier is split at the
//! start of a solve and workers exchange cutoffs and solutions over
//! in-process channels.
//!
//! # Example
//!
//! ```ignore
//! use miqp_bnb::{
//!     ConstraintBlock, ObjectiveBlock, ProblemDefinition, Settings, VariableBlock, Workspace,
//! };
//!
//! let problem = ProblemDefinition {
//!     objective: ObjectiveBlock::from_dense(&[vec![2.0, 0.0], vec![0.0, 2.0]], vec![-2.8, -1.2])?,
//!     constraints: ConstraintBlock::from_dense(&[vec![1.0, 1.0]], vec![f64::NEG_INFINITY], vec![2.0])?,
//!     variables: VariableBlock::continuous(vec![0.0; 2], vec![3.0; 2]).with_discrete(vec![0, 1]),
//! };
//!
//! let mut ws = Workspace::setup(Some(problem), Settings::default())?;
//! ws.solve()?;
//!
//! let status = ws.get_status(false);
//! println!("Status: {:?}", status.description);
//! println!("Objective: {}", status.obj_up_b);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod coordination;
pub mod error;
pub mod model;
pub mod search;
pub mod settings;
pub mod subsolver;
pub mod workspace;

pub use boundary::IndexBase;
pub use error::{BnbError, BnbResult};
pub use model::{
    BoundsUpdate, ConstraintBlock, EditImpact, ObjectiveBlock, ProblemDefinition, ProblemModel,
    SearchStatus, Solution, StatusDescription, StopReason, VariableBlock,
};
pub use settings::{BbSettings, ClarabelSettings, OsqpSettings, Settings, SubsolverSettings};
pub use workspace::{EditOptions, Workspace};
