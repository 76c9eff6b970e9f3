//! Symmetric eigenproblems.
//!
//! Both the tICA reducer (`C(τ) v = λ C(0) v`) and the MSM spectral analysis
//! (similarity-transformed reversible transition matrix) reduce to a dense
//! symmetric eigenproblem. Results are always sorted by eigenvalue, largest
//! first, so index 0 is the slowest / dominant mode.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::AppError;

/// Eigenvalues (descending) and matching eigenvectors (columns).
#[derive(Debug, Clone)]
pub struct EigenPairs {
    pub values: Vec<f64>,
    pub vectors: DMatrix<f64>,
}

/// Ridge weights tried, in order, when `B` is not positive definite.
const RIDGE_STEPS: [f64; 4] = [1e-12, 1e-9, 1e-6, 1e-3];

/// Smallest accepted squared pivot, relative to the mean diagonal.
const MIN_PIVOT: f64 = 1e-14;

/// Average `m` with its transpose.
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Eigen-decompose a symmetric matrix, sorted by descending eigenvalue.
pub fn symmetric_eigen_sorted(m: DMatrix<f64>) -> EigenPairs {
    let eig = SymmetricEigen::new(m);
    sort_descending(&eig.eigenvalues, &eig.eigenvectors)
}

/// Solve `A v = λ B v` for symmetric `A` and symmetric positive (semi)definite `B`.
///
/// `B` is whitened with its Cholesky factor. If the factorization fails, a
/// growing multiple of `trace(B)/n · I` is added until it succeeds. The
/// returned eigenvectors are `B`-orthonormal.
pub fn generalized_symmetric_eigen(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<EigenPairs, AppError> {
    let n = b.nrows();
    if a.nrows() != n || a.ncols() != n || b.ncols() != n {
        return Err(AppError::contract("Generalized eigenproblem needs square matrices of equal size."));
    }

    let l = cholesky_with_ridge(b)?;

    // M = L⁻¹ A L⁻ᵀ, computed with two triangular solves (A is symmetric).
    let y = l
        .solve_lower_triangular(a)
        .ok_or_else(|| AppError::numerical("Triangular solve failed while whitening."))?;
    let m = l
        .solve_lower_triangular(&y.transpose())
        .ok_or_else(|| AppError::numerical("Triangular solve failed while whitening."))?;

    let whitened = symmetric_eigen_sorted(symmetrize(&m));
    let vectors = l
        .transpose()
        .solve_upper_triangular(&whitened.vectors)
        .ok_or_else(|| AppError::numerical("Back-transformation of eigenvectors failed."))?;

    Ok(EigenPairs {
        values: whitened.values,
        vectors,
    })
}

fn cholesky_with_ridge(b: &DMatrix<f64>) -> Result<DMatrix<f64>, AppError> {
    let n = b.nrows().max(1);
    let scale = b.trace() / n as f64;
    if !(scale.is_finite() && scale > 0.0) {
        return Err(AppError::numerical(
            "Covariance matrix has no variance (constant features?).",
        ));
    }

    if let Some(l) = well_conditioned_factor(b.clone(), scale) {
        return Ok(l);
    }
    for ridge in RIDGE_STEPS {
        let shifted = b + DMatrix::<f64>::identity(b.nrows(), b.ncols()) * (ridge * scale);
        if let Some(l) = well_conditioned_factor(shifted, scale) {
            tracing::debug!(ridge, "covariance regularized to obtain a Cholesky factor");
            return Ok(l);
        }
    }
    Err(AppError::numerical(
        "Covariance matrix is not positive definite (constant or collinear features?).",
    ))
}

/// Cholesky factor whose pivots are all meaningfully positive.
fn well_conditioned_factor(b: DMatrix<f64>, scale: f64) -> Option<DMatrix<f64>> {
    let l = b.cholesky()?.l();
    let floor = scale * MIN_PIVOT;
    l.diagonal()
        .iter()
        .all(|d| d.is_finite() && d * d > floor)
        .then_some(l)
}

fn sort_descending(values: &DVector<f64>, vectors: &DMatrix<f64>) -> EigenPairs {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].total_cmp(&values[i]));

    let sorted_values = order.iter().map(|&i| values[i]).collect();
    let columns: Vec<DVector<f64>> = order.iter().map(|&i| vectors.column(i).into_owned()).collect();
    let sorted_vectors = if columns.is_empty() {
        DMatrix::zeros(vectors.nrows(), 0)
    } else {
        DMatrix::from_columns(&columns)
    };

    EigenPairs {
        values: sorted_values,
        vectors: sorted_vectors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_eigen_is_sorted_descending() {
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 3.0]);
        let eig = symmetric_eigen_sorted(m);
        assert_eq!(eig.values.len(), 3);
        assert!((eig.values[0] - 5.0).abs() < 1e-12);
        assert!((eig.values[2] - 1.0).abs() < 1e-12);
        assert!((eig.vectors[(1, 0)].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn generalized_problem_satisfies_definition() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let b = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let eig = generalized_symmetric_eigen(&a, &b).unwrap();

        for k in 0..2 {
            let v = eig.vectors.column(k).into_owned();
            let lhs = &a * &v;
            let rhs = (&b * &v) * eig.values[k];
            assert!((lhs - rhs).norm() < 1e-10);
            // B-orthonormal
            assert!(((v.transpose() * &b * &v)[(0, 0)] - 1.0).abs() < 1e-10);
        }
        assert!(eig.values[0] >= eig.values[1]);
    }

    #[test]
    fn singular_b_is_regularized() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(generalized_symmetric_eigen(&a, &b).is_ok());
    }

    #[test]
    fn zero_b_is_a_numerical_error() {
        let a = DMatrix::<f64>::identity(2, 2);
        let b = DMatrix::<f64>::zeros(2, 2);
        assert_eq!(generalized_symmetric_eigen(&a, &b).unwrap_err().exit_code(), 4);
    }
}
