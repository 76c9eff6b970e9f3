//! Principal component analysis over the pooled rows of all sequences.

use nalgebra::DMatrix;

use crate::decomposition::{centered, column_means, leading_components, validate_n_components};
use crate::domain::{FeatureSet, ReducerKind, ReducerModel};
use crate::error::AppError;
use crate::math::symmetric_eigen_sorted;

/// Fit PCA; eigenvalues are the explained variances of the retained components.
pub fn fit_pca(data: &FeatureSet, n_components: usize) -> Result<ReducerModel, AppError> {
    let n_features = data.require_shape("PCA input", None)?;
    validate_n_components(n_components, n_features)?;

    let n_rows = data.n_rows_total();
    if n_rows < 2 {
        return Err(AppError::contract("PCA needs at least two rows."));
    }

    let means = column_means(data, n_features);
    let mut cov = DMatrix::<f64>::zeros(n_features, n_features);
    for seq in &data.sequences {
        if seq.n_rows() == 0 {
            continue;
        }
        let x = centered(seq, &means);
        cov += x.transpose() * &x;
    }
    let cov = cov / (n_rows - 1) as f64;

    let eig = symmetric_eigen_sorted(cov);
    if eig.values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numerical("PCA covariance has non-finite eigenvalues."));
    }

    Ok(ReducerModel {
        kind: ReducerKind::Pca,
        n_features,
        n_components,
        lag_time: None,
        shrinkage: None,
        kinetic_mapping: false,
        means: means.iter().copied().collect(),
        components: leading_components(&eig.vectors, n_components),
        eigenvalues: eig.values.iter().take(n_components).copied().collect(),
        timescales: Vec::new(),
    })
}
