//! Eigen-decomposition of a reversible transition matrix.
//!
//! With `D = diag(π)`, `S = D^{1/2} T D^{-1/2}` is symmetric when `T` satisfies
//! detailed balance. For each eigenvector `u` of `S`:
//!
//! - left eigenvector of `T`: `φ = D^{1/2} u`
//! - right eigenvector of `T`: `ψ = D^{-1/2} u`
//!
//! so `φ_k · ψ_l = δ_kl`, `φ_0 = π` and `ψ_0 = 1`.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::{symmetric_eigen_sorted, symmetrize};

#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Descending; `values[0] ≈ 1`.
    pub values: Vec<f64>,
    /// Column `k` is the `k`-th left eigenvector.
    pub left: DMatrix<f64>,
    /// Column `k` is the `k`-th right eigenvector.
    pub right: DMatrix<f64>,
}

/// The leading `n_eigen` eigenpairs of `t` (all of them when `n_eigen` exceeds the size).
pub fn spectrum(t: &DMatrix<f64>, populations: &DVector<f64>, n_eigen: usize) -> Result<Spectrum, AppError> {
    let n = t.nrows();
    if populations.iter().any(|&p| p <= 0.0 || !p.is_finite()) {
        return Err(AppError::numerical("Stationary distribution has a non-positive entry."));
    }
    let sqrt_pi = populations.map(f64::sqrt);

    let s = DMatrix::from_fn(n, n, |i, j| sqrt_pi[i] * t[(i, j)] / sqrt_pi[j]);
    let eig = symmetric_eigen_sorted(symmetrize(&s));
    let k = n_eigen.min(n);

    let mut left = DMatrix::<f64>::zeros(n, k);
    let mut right = DMatrix::<f64>::zeros(n, k);
    for c in 0..k {
        let u = eig.vectors.column(c);
        let sign = orientation(&u.clone_owned(), c);
        for i in 0..n {
            left[(i, c)] = sign * sqrt_pi[i] * u[i];
            right[(i, c)] = sign * u[i] / sqrt_pi[i];
        }
    }

    // Pin the stationary pair exactly.
    if k > 0 {
        left.set_column(0, populations);
        right.set_column(0, &DVector::from_element(n, 1.0));
    }

    Ok(Spectrum {
        values: eig.values.into_iter().take(k).collect(),
        left,
        right,
    })
}

/// +1 / -1 so the stationary vector is positive and every other vector has a
/// positive largest-magnitude entry.
fn orientation(u: &DVector<f64>, index: usize) -> f64 {
    let pivot = if index == 0 {
        u.sum()
    } else {
        u.iter().copied().max_by(|a, b| a.abs().total_cmp(&b.abs())).unwrap_or(1.0)
    };
    if pivot < 0.0 { -1.0 } else { 1.0 }
}
