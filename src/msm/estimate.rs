//! Reversible transition-matrix estimators.
//!
//! Both estimators return `(T, π)` with rows of `T` summing to one and
//! `π_i T_ij = π_j T_ji`.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::error::AppError;

const MLE_TOL: f64 = 1e-10;
const MLE_MAX_ITER: usize = 100_000;

/// Maximum-likelihood reversible estimate by the symmetric fixed-point iteration
///
/// `X_ij ← (C_ij + C_ji) / (c_i / x_i + c_j / x_j)`, with `c_i` the row sums
/// of `C` and `x_i` the row sums of `X`, started from `X = C + Cᵀ`.
pub fn reversible_mle(counts: &DMatrix<f64>) -> Result<(DMatrix<f64>, DVector<f64>), AppError> {
    let n = counts.nrows();
    let sym = counts + counts.transpose();
    let c = row_sums(counts);
    if c.iter().any(|&ci| ci <= 0.0) {
        return Err(AppError::numerical("A state has no outgoing transitions."));
    }

    let mut x = sym.clone();
    let mut converged = false;
    for iter in 0..MLE_MAX_ITER {
        let xs = row_sums(&x);
        let next = DMatrix::from_fn(n, n, |i, j| {
            let s = sym[(i, j)];
            if s == 0.0 { 0.0 } else { s / (c[i] / xs[i] + c[j] / xs[j]) }
        });
        let delta = (&next - &x).abs().sum() / next.sum();
        x = next;
        if delta < MLE_TOL {
            debug!(iter, delta, "reversible MLE converged");
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(max_iter = MLE_MAX_ITER, "reversible MLE did not converge; using last iterate");
    }

    normalize(&x)
}

/// Transpose estimator: row-normalize `(C + Cᵀ) / 2`.
pub fn transpose_estimate(counts: &DMatrix<f64>) -> Result<(DMatrix<f64>, DVector<f64>), AppError> {
    let sym = (counts + counts.transpose()) * 0.5;
    normalize(&sym)
}

/// `T = X / rowsum(X)`, `π = rowsum(X) / sum(X)` for a symmetric weight matrix `X`.
fn normalize(x: &DMatrix<f64>) -> Result<(DMatrix<f64>, DVector<f64>), AppError> {
    let rs = row_sums(x);
    let total: f64 = rs.sum();
    if total <= 0.0 || !total.is_finite() || rs.iter().any(|&r| r <= 0.0 || !r.is_finite()) {
        return Err(AppError::numerical("Transition weights contain an empty or non-finite row."));
    }
    let t = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] / rs[i]);
    Ok((t, rs / total))
}

fn row_sums(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(m.nrows(), m.row_iter().map(|r| r.sum()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_stochastic_and_balanced(t: &DMatrix<f64>, pi: &DVector<f64>) {
        for i in 0..t.nrows() {
            assert!((t.row(i).sum() - 1.0).abs() < 1e-12);
            for j in 0..t.ncols() {
                assert!(t[(i, j)] >= 0.0);
                assert!((pi[i] * t[(i, j)] - pi[j] * t[(j, i)]).abs() < 1e-9);
            }
        }
        assert!((pi.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mle_recovers_two_state_stationary_distribution() {
        // T = [[0.9, 0.1], [0.2, 0.8]] observed with stationary weights (2/3, 1/3).
        let c = DMatrix::from_row_slice(2, 2, &[600.0, 66.0, 67.0, 267.0]);
        let (t, pi) = reversible_mle(&c).unwrap();
        assert_stochastic_and_balanced(&t, &pi);
        assert!((pi[0] - 2.0 / 3.0).abs() < 0.01, "{pi}");
        assert!((t[(0, 1)] - 0.1).abs() < 0.01);
    }

    #[test]
    fn mle_balances_nonreversible_counts() {
        let c = DMatrix::from_row_slice(3, 3, &[5.0, 3.0, 0.0, 0.0, 4.0, 2.0, 1.0, 1.0, 6.0]);
        let (t, pi) = reversible_mle(&c).unwrap();
        assert_stochastic_and_balanced(&t, &pi);
    }

    #[test]
    fn transpose_estimator_is_reversible() {
        let c = DMatrix::from_row_slice(3, 3, &[5.0, 3.0, 0.0, 0.0, 4.0, 2.0, 1.0, 1.0, 6.0]);
        let (t, pi) = transpose_estimate(&c).unwrap();
        assert_stochastic_and_balanced(&t, &pi);
    }

    #[test]
    fn empty_row_is_a_numerical_error() {
        let c = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(reversible_mle(&c).unwrap_err().exit_code(), 4);
    }
}
