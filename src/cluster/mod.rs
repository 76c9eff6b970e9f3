//! Conformational clustering.
//!
//! Responsibilities:
//!
//! - fit `KMeans` or `MiniBatchKMeans` on every row of a projected dataset
//! - label each row with its nearest centre, preserving sequence structure
//!
//! Fitting is seeded by `random_state`; identical input and seed give identical
//! centres and labels.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use tracing::info;

use crate::domain::{ClusterKind, ClusterModel, Dataset, DatasetKind, FeatureSet, LabelSet, Sequence};
use crate::error::AppError;

pub mod kmeans;

pub use kmeans::*;

pub const DEFAULT_KMEANS_MAX_ITER: usize = 300;
pub const DEFAULT_MINI_BATCH_MAX_ITER: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 100;
const KMEANS_TOL: f64 = 1e-4;

/// Clusterer configuration (derived from CLI flags).
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub kind: ClusterKind,
    pub n_clusters: usize,
    pub random_state: u64,
    /// `None` picks the per-algorithm default.
    pub max_iter: Option<usize>,
    pub batch_size: usize,
}

/// Fit the configured clusterer and label every row of `data`.
pub fn fit_predict(config: &ClusterConfig, data: &FeatureSet) -> Result<(ClusterModel, LabelSet), AppError> {
    data.require_shape("cluster input", None)?;
    let rows: Vec<&[f64]> = data.all_rows().collect();
    let n_samples = rows.len();

    if config.n_clusters == 0 {
        return Err(AppError::argument("n_clusters must be >= 1."));
    }
    if config.n_clusters > n_samples {
        return Err(AppError::contract(format!(
            "n_clusters={} exceeds the {n_samples} available samples.",
            config.n_clusters
        )));
    }
    if rows.iter().flat_map(|r| r.iter()).any(|x| !x.is_finite()) {
        return Err(AppError::numerical("Cluster input contains non-finite values."));
    }

    let mut rng = StdRng::seed_from_u64(config.random_state);
    let fit = match config.kind {
        ClusterKind::KMeans => {
            let init = kmeans_plus_plus(&rows, config.n_clusters, &mut rng);
            let max_iter = config.max_iter.unwrap_or(DEFAULT_KMEANS_MAX_ITER).max(1);
            lloyd(&rows, init, max_iter, KMEANS_TOL)
        }
        ClusterKind::MiniBatchKMeans => {
            let batch_size = config.batch_size.max(1);
            let init_size = (3 * batch_size).max(config.n_clusters).min(n_samples);
            let init_rows: Vec<&[f64]> = sample(&mut rng, n_samples, init_size)
                .into_iter()
                .map(|i| rows[i])
                .collect();
            let init = kmeans_plus_plus(&init_rows, config.n_clusters, &mut rng);
            let max_iter = config.max_iter.unwrap_or(DEFAULT_MINI_BATCH_MAX_ITER).max(1);
            mini_batch(&rows, init, batch_size, max_iter, &mut rng)
        }
    };

    let model = ClusterModel {
        kind: config.kind,
        n_clusters: config.n_clusters,
        random_state: config.random_state,
        centers: fit.centers,
        inertia: fit.inertia,
        n_iter: fit.n_iter,
    };
    let labels = predict(&model, data)?;

    info!(
        kind = ?model.kind,
        n_clusters = model.n_clusters,
        samples = n_samples,
        inertia = model.inertia,
        n_iter = model.n_iter,
        "clustered"
    );
    Ok((model, labels))
}

/// Label every row of `data` with its nearest centre.
pub fn predict(model: &ClusterModel, data: &FeatureSet) -> Result<LabelSet, AppError> {
    let dim = model.centers.first().map_or(0, Vec::len);
    data.require_shape("cluster input", Some(dim))?;

    let sequences = data
        .sequences
        .iter()
        .map(|seq| {
            let rows: Vec<&[f64]> = seq.rows().collect();
            let labels = assign(&model.centers, &rows).into_iter().map(|(k, _)| k).collect();
            Sequence::new(seq.source.clone(), 1, labels)
        })
        .collect();

    Ok(Dataset::new(DatasetKind::Labels, sequences))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn projected(seed: u64) -> FeatureSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let sequences = (0..3)
            .map(|s| {
                let data = (0..80 * 2).map(|_| rng.gen_range(-3.0..3.0)).collect();
                Sequence::new(format!("t{s}"), 2, data)
            })
            .collect();
        Dataset::new(DatasetKind::Projection, sequences)
    }

    fn config(kind: ClusterKind, n_clusters: usize, seed: u64) -> ClusterConfig {
        ClusterConfig {
            kind,
            n_clusters,
            random_state: seed,
            max_iter: None,
            batch_size: 50,
        }
    }

    #[test]
    fn labels_are_in_range_and_aligned() {
        let ds = projected(1);
        for kind in [ClusterKind::KMeans, ClusterKind::MiniBatchKMeans] {
            let (model, labels) = fit_predict(&config(kind, 12, 42), &ds).unwrap();
            assert_eq!(model.centers.len(), 12);
            assert_eq!(labels.rows_per_sequence(), ds.rows_per_sequence());
            assert_eq!(labels.n_cols(), Some(1));
            assert!(labels.all_rows().all(|r| r[0] < 12));
        }
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let ds = projected(2);
        for kind in [ClusterKind::KMeans, ClusterKind::MiniBatchKMeans] {
            let (m1, l1) = fit_predict(&config(kind, 8, 7), &ds).unwrap();
            let (m2, l2) = fit_predict(&config(kind, 8, 7), &ds).unwrap();
            assert_eq!(l1, l2);
            assert_eq!(m1.centers, m2.centers);
        }
    }

    #[test]
    fn too_many_clusters_is_a_contract_error() {
        let ds = projected(3);
        let err = fit_predict(&config(ClusterKind::KMeans, 241, 0), &ds).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn predict_rejects_wrong_dimensionality() {
        let ds = projected(4);
        let (mut model, _) = fit_predict(&config(ClusterKind::KMeans, 3, 0), &ds).unwrap();
        for c in &mut model.centers {
            c.push(0.0);
        }
        assert_eq!(predict(&model, &ds).unwrap_err().exit_code(), 3);
    }
}
