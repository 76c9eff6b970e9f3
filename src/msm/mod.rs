//! Markov state model estimation.
//!
//! Steps, all on the cluster labels of every trajectory:
//!
//! 1. count transitions at the lag time with a sliding window
//! 2. trim to the largest strongly connected set of labels
//! 3. estimate a reversible transition matrix (MLE or transpose)
//! 4. decompose it into populations, eigenvalues and implied timescales
//!
//! The resulting `MsmModel` maps original labels to contiguous state indices.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use tracing::{info, warn};

use crate::decomposition::implied_timescale;
use crate::domain::{LabelSet, MsmModel, ReversibleType};
use crate::error::AppError;

pub mod counts;
pub mod estimate;
pub mod spectral;

pub use counts::*;
pub use estimate::*;
pub use spectral::*;

/// MSM estimator configuration (derived from CLI flags).
#[derive(Debug, Clone)]
pub struct MsmConfig {
    pub lag_time: usize,
    pub reversible_type: ReversibleType,
    /// Minimum (lag-divided) count for an edge to connect two states; `None` is `1 / lag_time`.
    pub ergodic_cutoff: Option<f64>,
    /// Pseudo-count added to every entry of the trimmed count matrix.
    pub prior_counts: f64,
    /// Non-stationary eigenpairs to keep; `None` keeps all.
    pub n_timescales: Option<usize>,
}

impl MsmConfig {
    pub fn cutoff(&self) -> f64 {
        self.ergodic_cutoff.unwrap_or(1.0 / self.lag_time.max(1) as f64)
    }
}

/// Fit an MSM on a label dataset.
pub fn estimate_msm(labels: &LabelSet, config: &MsmConfig) -> Result<MsmModel, AppError> {
    labels.require_shape("estimate-msm input", Some(1))?;
    if config.lag_time == 0 {
        return Err(AppError::argument("MSM lag time must be >= 1."));
    }
    if config.prior_counts < 0.0 || !config.prior_counts.is_finite() {
        return Err(AppError::argument("prior_counts must be a non-negative number."));
    }

    let sequences = labels.label_sequences();
    let LabelCounts { labels: observed, counts: raw } = transition_counts(&sequences, config.lag_time);
    if raw.sum() <= 0.0 {
        return Err(AppError::numerical(format!(
            "Insufficient transition statistics: no transitions at lag time {}.",
            config.lag_time
        )));
    }

    let cutoff = config.cutoff();
    let kept_idx = largest_connected_set(&raw, cutoff);
    let trimmed = submatrix(&raw, &kept_idx);
    if trimmed.sum() <= 0.0 {
        return Err(AppError::numerical(
            "Insufficient transition statistics: no connected set of states has internal transitions.",
        ));
    }

    let kept: Vec<usize> = kept_idx.iter().map(|&i| observed[i]).collect();
    let excluded_labels: Vec<usize> = observed.iter().copied().filter(|l| kept.binary_search(l).is_err()).collect();
    if !excluded_labels.is_empty() {
        warn!(
            excluded = excluded_labels.len(),
            kept = kept.len(),
            cutoff,
            "labels outside the largest connected set were dropped"
        );
    }

    let countsmat = trimmed.add_scalar(config.prior_counts);
    let (t, populations) = match config.reversible_type {
        ReversibleType::Mle => reversible_mle(&countsmat)?,
        ReversibleType::Transpose => transpose_estimate(&countsmat)?,
    };

    let n_states = kept.len();
    let n_eigen = config.n_timescales.map_or(n_states, |n| n.saturating_add(1));
    let eigen = spectrum(&t, &populations, n_eigen)?;
    let timescales = eigen
        .values
        .iter()
        .skip(1)
        .map(|&l| implied_timescale(l, config.lag_time))
        .collect::<Vec<_>>();

    let mapping: BTreeMap<usize, usize> = kept.iter().enumerate().map(|(s, &l)| (l, s)).collect();

    info!(
        n_states,
        excluded = excluded_labels.len(),
        lag_time = config.lag_time,
        slowest_timescale = timescales.first().copied().unwrap_or(0.0),
        "msm estimated"
    );

    Ok(MsmModel {
        lag_time: config.lag_time,
        reversible_type: config.reversible_type,
        ergodic_cutoff: cutoff,
        prior_counts: config.prior_counts,
        n_states,
        mapping,
        state_labels: kept,
        excluded_labels,
        populations: populations.iter().copied().collect(),
        eigenvalues: eigen.values,
        left_eigenvectors: rows_of(&eigen.left),
        right_eigenvectors: rows_of(&eigen.right),
        timescales,
        transition_matrix: rows_of(&t),
        countsmat: rows_of(&countsmat),
    })
}

fn rows_of(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}
