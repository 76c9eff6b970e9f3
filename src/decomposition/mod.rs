//! Linear dimensionality reduction.
//!
//! Responsibilities:
//!
//! - fit a projection (tICA or PCA) on a scaled dataset
//! - project every row onto the leading components (component 0 first)
//!
//! Both reducers persist the same `ReducerModel`, so projecting is shared.

use nalgebra::{DMatrix, DVector};
use tracing::info;

use crate::domain::{Dataset, DatasetKind, FeatureSet, ReducerKind, ReducerModel, Sequence};
use crate::error::AppError;

pub mod pca;
pub mod tica;

pub use pca::*;
pub use tica::*;

/// Reducer configuration (derived from CLI flags).
#[derive(Debug, Clone)]
pub struct ReduceConfig {
    pub kind: ReducerKind,
    pub n_components: usize,
    pub lag_time: usize,
    pub shrinkage: Option<f64>,
    pub kinetic_mapping: bool,
}

/// Fit the configured reducer and project `data` with it.
pub fn fit_transform(config: &ReduceConfig, data: &FeatureSet) -> Result<(ReducerModel, FeatureSet), AppError> {
    let model = match config.kind {
        ReducerKind::Tica => fit_tica(data, config)?,
        ReducerKind::Pca => fit_pca(data, config.n_components)?,
    };
    let projected = transform(&model, data)?;
    info!(
        kind = ?model.kind,
        n_components = model.n_components,
        rows = projected.n_rows_total(),
        leading_eigenvalue = model.eigenvalues.first().copied().unwrap_or(f64::NAN),
        "dimensionality reduced"
    );
    Ok((model, projected))
}

/// Project every row onto the model's components.
pub fn transform(model: &ReducerModel, data: &FeatureSet) -> Result<FeatureSet, AppError> {
    let n_features = data.require_shape("reduce-dimensionality input", Some(model.n_features))?;
    let k = model.n_components;

    let weights: Vec<f64> = if model.kinetic_mapping {
        model.eigenvalues.iter().take(k).copied().collect()
    } else {
        vec![1.0; k]
    };

    let sequences = data
        .sequences
        .iter()
        .map(|seq| {
            let mut out = Vec::with_capacity(seq.n_rows() * k);
            for row in seq.rows() {
                for (c, component) in model.components.iter().enumerate() {
                    let dot: f64 = (0..n_features)
                        .map(|j| (row[j] - model.means[j]) * component[j])
                        .sum();
                    out.push(dot * weights[c]);
                }
            }
            Sequence::new(seq.source.clone(), k, out)
        })
        .collect();

    Ok(Dataset::new(DatasetKind::Projection, sequences))
}

pub(crate) fn validate_n_components(n_components: usize, n_features: usize) -> Result<(), AppError> {
    if n_components == 0 {
        return Err(AppError::argument("n_components must be >= 1."));
    }
    if n_components > n_features {
        return Err(AppError::contract(format!(
            "n_components={n_components} exceeds the {n_features} input features."
        )));
    }
    Ok(())
}

/// Column means over all rows of all sequences.
pub(crate) fn column_means(data: &FeatureSet, n_features: usize) -> DVector<f64> {
    let mut sum = DVector::<f64>::zeros(n_features);
    for row in data.all_rows() {
        for (j, &x) in row.iter().enumerate() {
            sum[j] += x;
        }
    }
    sum / data.n_rows_total().max(1) as f64
}

/// One sequence as a mean-centred `rows × features` matrix.
pub(crate) fn centered(seq: &Sequence<f64>, means: &DVector<f64>) -> DMatrix<f64> {
    let mut m = DMatrix::from_row_slice(seq.n_rows(), seq.n_cols, &seq.data);
    for mut row in m.row_iter_mut() {
        for (j, v) in row.iter_mut().enumerate() {
            *v -= means[j];
        }
    }
    m
}

/// Pick `n` leading eigenvectors as component rows, sign-normalized so the
/// largest-magnitude loading of each is positive.
pub(crate) fn leading_components(vectors: &DMatrix<f64>, n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|c| {
            let col = vectors.column(c);
            let pivot = col
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(1.0);
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
            col.iter().map(|v| v * sign).collect()
        })
        .collect()
}
