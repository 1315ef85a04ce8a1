//! Index-base translation for host layers.
//!
//! The workspace is 0-based throughout. Hosts with 1-based conventions
//! convert their index lists, permutations and sparsity patterns here, and
//! only here, before calling into the workspace and after reading from it.

use crate::error::{BnbError, BnbResult};

/// Index base used by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBase {
    /// Indices start at 0 (no translation).
    #[default]
    Zero,

    /// Indices start at 1.
    One,
}

impl IndexBase {
    fn offset(self) -> usize {
        match self {
            IndexBase::Zero => 0,
            IndexBase::One => 1,
        }
    }

    /// Convert one host index to a 0-based index.
    pub fn to_internal(self, index: usize) -> BnbResult<usize> {
        index.checked_sub(self.offset()).ok_or_else(|| {
            BnbError::Index(format!("index {} below the host index base", index))
        })
    }

    /// Convert one 0-based index to the host base.
    pub fn to_host(self, index: usize) -> usize {
        index + self.offset()
    }

    /// Convert a host index list, checking every entry against `len`.
    pub fn indices_to_internal(self, indices: &[usize], len: usize) -> BnbResult<Vec<usize>> {
        indices
            .iter()
            .map(|&i| {
                let k = self.to_internal(i)?;
                if k >= len {
                    return Err(BnbError::Index(format!(
                        "index {} out of range (size {})",
                        i, len
                    )));
                }
                Ok(k)
            })
            .collect()
    }

    /// Convert a 0-based index list to the host base.
    pub fn indices_to_host(self, indices: &[usize]) -> Vec<usize> {
        indices.iter().map(|&i| self.to_host(i)).collect()
    }

    /// Convert a host permutation of `0..len` (or `1..=len`).
    ///
    /// Any entry outside the host range is a validation error, the same
    /// way a non-bijective permutation is.
    pub fn permutation_to_internal(self, permutation: &[usize]) -> BnbResult<Vec<usize>> {
        let len = permutation.len();
        self.indices_to_internal(permutation, len).map_err(|e| match e {
            BnbError::Index(msg) => BnbError::Validation(msg),
            other => other,
        })
    }

    /// Convert a sparsity pattern (one column list per row) to the host base.
    pub fn sparsity_to_host(self, pattern: &[Vec<usize>]) -> Vec<Vec<usize>> {
        pattern.iter().map(|row| self.indices_to_host(row)).collect()
    }
}
