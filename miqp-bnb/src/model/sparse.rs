//! Sparse matrix helpers.
//!
//! The model keeps its matrices as `sprs` CSR matrices. Structural edits work
//! on a row-list view (`Vec<Vec<(col, value)>>`) and rebuild the CSR storage
//! afterwards, so every helper here goes through that representation.

use sprs::CsMat;

use crate::error::{BnbError, BnbResult};

/// Sparse matrix type used throughout the workspace (CSR storage).
pub type SparseMatrix = CsMat<f64>;

/// One sparse row: `(column, value)` pairs sorted by column.
pub type SparseRow = Vec<(usize, f64)>;

/// Build a CSR matrix from row lists.
///
/// Entries are sorted per row, duplicate columns are summed and explicit
/// zeros are dropped. Column indices must be `< ncols`.
pub fn from_rows(ncols: usize, rows: &[SparseRow]) -> SparseMatrix {
    let mut indptr = Vec::with_capacity(rows.len() + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();
    indptr.push(0);

    for row in rows {
        let mut sorted = row.clone();
        sorted.sort_by_key(|&(col, _)| col);

        let start = indices.len();
        for (col, val) in sorted {
            debug_assert!(col < ncols);
            if indices.len() > start && indices[indices.len() - 1] == col {
                let last = data.len() - 1;
                data[last] += val;
            } else {
                indices.push(col);
                data.push(val);
            }
        }

        // Drop entries that cancelled or were given as explicit zeros
        let mut write = start;
        for read in start..indices.len() {
            if data[read] != 0.0 {
                indices[write] = indices[read];
                data[write] = data[read];
                write += 1;
            }
        }
        indices.truncate(write);
        data.truncate(write);

        indptr.push(indices.len());
    }

    CsMat::new((rows.len(), ncols), indptr, indices, data)
}

/// Row-list view of a matrix (works for CSR and CSC storage).
pub fn to_rows(mat: &SparseMatrix) -> Vec<SparseRow> {
    let mut rows: Vec<SparseRow> = vec![Vec::new(); mat.rows()];

    if mat.is_csr() {
        for (i, row) in mat.outer_iterator().enumerate() {
            rows[i].extend(row.iter().map(|(j, &v)| (j, v)));
        }
    } else {
        for (j, col) in mat.outer_iterator().enumerate() {
            for (i, &v) in col.iter() {
                rows[i].push((j, v));
            }
        }
        for row in &mut rows {
            row.sort_by_key(|&(col, _)| col);
        }
    }

    rows
}

/// Build a CSR matrix from dense rows.
///
/// All rows must have the same length. An empty slice produces a `0 x 0`
/// matrix, which the model accepts as "no rows" for any column count.
pub fn from_dense(dense: &[Vec<f64>]) -> BnbResult<SparseMatrix> {
    let ncols = dense.first().map_or(0, |r| r.len());
    let mut rows = Vec::with_capacity(dense.len());

    for (i, r) in dense.iter().enumerate() {
        if r.len() != ncols {
            return Err(BnbError::Shape(format!(
                "dense row {} has {} entries, expected {}",
                i,
                r.len(),
                ncols
            )));
        }
        rows.push(
            r.iter()
                .enumerate()
                .filter(|(_, &v)| v != 0.0)
                .map(|(j, &v)| (j, v))
                .collect(),
        );
    }

    Ok(from_rows(ncols, &rows))
}

/// Build a CSR matrix from `(row, col, value)` triplets (duplicates summed).
pub fn from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: &[(usize, usize, f64)],
) -> BnbResult<SparseMatrix> {
    let mut rows: Vec<SparseRow> = vec![Vec::new(); nrows];
    for &(i, j, v) in triplets {
        if i >= nrows || j >= ncols {
            return Err(BnbError::Index(format!(
                "triplet ({}, {}) outside a {} x {} matrix",
                i, j, nrows, ncols
            )));
        }
        rows[i].push((j, v));
    }
    Ok(from_rows(ncols, &rows))
}

/// Sorted nonzero column indices of every row.
pub fn sparsity(mat: &SparseMatrix) -> Vec<Vec<usize>> {
    to_rows(mat)
        .into_iter()
        .map(|row| row.into_iter().map(|(j, _)| j).collect())
        .collect()
}

/// Check that a square matrix is symmetric (entrywise, with a relative tolerance).
pub fn is_symmetric(mat: &SparseMatrix, tol: f64) -> bool {
    if mat.rows() != mat.cols() {
        return false;
    }
    let rows = to_rows(mat);
    for (i, row) in rows.iter().enumerate() {
        for &(j, v) in row {
            let mirrored = rows[j]
                .binary_search_by_key(&i, |&(c, _)| c)
                .map(|k| rows[j][k].1)
                .unwrap_or(0.0);
            if (v - mirrored).abs() > tol * v.abs().max(1.0) {
                return false;
            }
        }
    }
    true
}

/// Compressed-column arrays `(colptr, rowval, nzval)` of the given rows.
///
/// With `upper_only`, only entries with `row <= col` are kept (the storage
/// convex QP backends expect for the quadratic term).
pub fn csc_parts(
    ncols: usize,
    rows: &[SparseRow],
    upper_only: bool,
) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
    let mut counts = vec![0usize; ncols];
    for (i, row) in rows.iter().enumerate() {
        for &(j, _) in row {
            if !upper_only || i <= j {
                counts[j] += 1;
            }
        }
    }

    let mut colptr = Vec::with_capacity(ncols + 1);
    colptr.push(0);
    for c in &counts {
        colptr.push(colptr[colptr.len() - 1] + c);
    }

    let nnz = colptr[ncols];
    let mut rowval = vec![0usize; nnz];
    let mut nzval = vec![0.0; nnz];
    let mut next = colptr.clone();

    // Rows are visited in increasing order, so row indices come out sorted
    for (i, row) in rows.iter().enumerate() {
        for &(j, v) in row {
            if !upper_only || i <= j {
                rowval[next[j]] = i;
                nzval[next[j]] = v;
                next[j] += 1;
            }
        }
    }

    (colptr, rowval, nzval)
}

/// Dot product of a sparse row with a dense vector.
pub fn row_dot(row: &[(usize, f64)], x: &[f64]) -> f64 {
    row.iter().map(|&(j, v)| v * x[j]).sum()
}
