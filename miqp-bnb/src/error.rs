//! Error types for the branch-and-bound workspace.

use thiserror::Error;

/// Errors that can occur while configuring, editing, or solving a workspace.
///
/// Every structural or configuration error is raised before anything is
/// committed, so the workspace is left exactly as it was.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BnbError {
    /// Missing or invalid setup information (problem blocks, subsolver name).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Dimension mismatch between matrices and vectors.
    #[error("Shape mismatch: {0}")]
    Shape(String),

    /// Index or insertion point out of range.
    #[error("Index out of range: {0}")]
    Index(String),

    /// Duplicate indices, non-bijective permutation, inconsistent listing.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// One block of a multi-block atomic edit was invalid.
    #[error("Composition failed in {block} block: {source}")]
    Composition {
        /// Name of the first invalid block.
        block: &'static str,
        /// Why the block was rejected.
        source: Box<BnbError>,
    },

    /// The subsolver reported a condition branching cannot resolve.
    #[error("Subsolver failed: {0}")]
    Solver(String),
}

impl BnbError {
    /// Wrap an error as the failure of one block of an atomic edit.
    pub fn in_block(self, block: &'static str) -> Self {
        BnbError::Composition {
            block,
            source: Box::new(self),
        }
    }
}

/// Result type for workspace operations.
pub type BnbResult<T> = Result<T, BnbError>;
