//! Problem model: input blocks, the editable MIQP and solution records.

pub mod blocks;
pub mod problem;
pub mod solution;
pub mod sparse;

pub use blocks::{BoundsUpdate, ConstraintBlock, ObjectiveBlock, ProblemDefinition, VariableBlock};
pub use problem::{EditImpact, ProblemModel};
pub use solution::{SearchStatus, Solution, StatusDescription, StopReason};
pub use sparse::SparseMatrix;
