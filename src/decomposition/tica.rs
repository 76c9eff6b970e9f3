//! Time-structure-based independent component analysis (tICA).
//!
//! Given frame pairs `(x_t, x_{t+τ})` drawn from within each sequence:
//!
//! - `C(τ)` is the symmetrized time-lagged covariance of the pairs
//! - `C(0)` is the covariance of both pair ends pooled together
//! - components solve `C(τ) v = λ C(0) v`, sorted by `λ` descending
//!
//! A large `λ` is a coordinate that decorrelates slowly; the implied timescale
//! is `-τ / ln λ` frames.

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::decomposition::{ReduceConfig, centered, column_means, leading_components, validate_n_components};
use crate::domain::{FeatureSet, ReducerKind, ReducerModel};
use crate::error::AppError;
use crate::math::{generalized_symmetric_eigen, symmetrize};

/// Eigenvalue bounds used when converting autocorrelations to timescales.
const LAMBDA_FLOOR: f64 = 1e-300;
const LAMBDA_CEIL: f64 = 1.0 - 1e-12;

/// Fit a tICA model.
pub fn fit_tica(data: &FeatureSet, config: &ReduceConfig) -> Result<ReducerModel, AppError> {
    let n_features = data.require_shape("tICA input", None)?;
    validate_n_components(config.n_components, n_features)?;
    let lag = config.lag_time;
    if lag == 0 {
        return Err(AppError::argument("tICA lag time must be >= 1."));
    }
    if let Some(s) = config.shrinkage {
        if !(0.0..=1.0).contains(&s) {
            return Err(AppError::argument(format!("Shrinkage must lie in [0, 1], got {s}.")));
        }
    }

    let means = column_means(data, n_features);
    let mut c_tau = DMatrix::<f64>::zeros(n_features, n_features);
    let mut c_0 = DMatrix::<f64>::zeros(n_features, n_features);
    let mut n_pairs = 0usize;

    for seq in &data.sequences {
        let n = seq.n_rows();
        if n <= lag {
            debug!(source = %seq.source, rows = n, lag, "sequence too short for lag, skipped");
            continue;
        }
        let x = centered(seq, &means);
        let head = x.rows(0, n - lag);
        let tail = x.rows(lag, n - lag);

        c_tau += head.transpose() * &tail;
        c_0 += head.transpose() * &head + tail.transpose() * &tail;
        n_pairs += n - lag;
    }

    if n_pairs == 0 {
        return Err(AppError::contract(format!(
            "No sequence is longer than the lag time ({lag} frames)."
        )));
    }

    let c_tau = symmetrize(&c_tau) / n_pairs as f64;
    let mut c_0 = c_0 / (2 * n_pairs) as f64;

    if let Some(s) = config.shrinkage.filter(|s| *s > 0.0) {
        let target = c_0.trace() / n_features as f64;
        c_0 = c_0 * (1.0 - s) + DMatrix::<f64>::identity(n_features, n_features) * (s * target);
    }

    let eig = generalized_symmetric_eigen(&c_tau, &c_0)?;
    let eigenvalues: Vec<f64> = eig.values.iter().take(config.n_components).copied().collect();
    if eigenvalues.iter().any(|l| *l <= 0.0) {
        warn!("some retained tICA eigenvalues are non-positive; lag time may exceed the slowest process");
    }
    let timescales = eigenvalues.iter().map(|&l| implied_timescale(l, lag)).collect();

    Ok(ReducerModel {
        kind: ReducerKind::Tica,
        n_features,
        n_components: config.n_components,
        lag_time: Some(lag),
        shrinkage: config.shrinkage,
        kinetic_mapping: config.kinetic_mapping,
        means: means.iter().copied().collect(),
        components: leading_components(&eig.vectors, config.n_components),
        eigenvalues,
        timescales,
    })
}

/// `-τ / ln λ`, with `λ` clamped into `(0, 1)` so the result stays finite.
pub fn implied_timescale(lambda: f64, lag: usize) -> f64 {
    let l = lambda.clamp(LAMBDA_FLOOR, LAMBDA_CEIL);
    -(lag as f64) / l.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::transform;
    use crate::domain::{Dataset, DatasetKind, Sequence};
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    fn config(n_components: usize, lag_time: usize) -> ReduceConfig {
        ReduceConfig {
            kind: ReducerKind::Tica,
            n_components,
            lag_time,
            shrinkage: None,
            kinetic_mapping: false,
        }
    }

    /// Column 0 hops slowly between ±1, columns 1-2 are white noise with
    /// larger variance.
    fn slow_and_fast(seed: u64, n_rows: usize) -> FeatureSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut state = 1.0;
        let mut data = Vec::with_capacity(n_rows * 3);
        for _ in 0..n_rows {
            if rng.gen_bool(0.02) {
                state = -state;
            }
            data.push(state + 0.1 * noise.sample(&mut rng));
            data.push(3.0 * noise.sample(&mut rng));
            data.push(2.0 * noise.sample(&mut rng));
        }
        Dataset::new(DatasetKind::Scaled, vec![Sequence::new("t0", 3, data)])
    }

    #[test]
    fn slow_coordinate_ranks_first() {
        let ds = slow_and_fast(42, 4000);
        let model = fit_tica(&ds, &config(2, 5)).unwrap();

        assert!(model.eigenvalues[0] > 0.5, "eigenvalues {:?}", model.eigenvalues);
        assert!(model.eigenvalues[0] >= model.eigenvalues[1]);
        let c = &model.components[0];
        assert!(c[0].abs() > 5.0 * c[1].abs() && c[0].abs() > 5.0 * c[2].abs(), "{c:?}");
        assert!(model.timescales[0] > model.timescales[1]);
    }

    #[test]
    fn projection_has_requested_dimensionality() {
        let ds = slow_and_fast(7, 500);
        let cfg = config(2, 2);
        let model = fit_tica(&ds, &cfg).unwrap();
        let out = transform(&model, &ds).unwrap();
        assert_eq!(out.n_cols(), Some(2));
        assert_eq!(out.rows_per_sequence(), ds.rows_per_sequence());
        assert_eq!(out.kind, DatasetKind::Projection);
    }

    #[test]
    fn sequences_shorter_than_lag_are_rejected() {
        let ds = slow_and_fast(1, 3);
        let err = fit_tica(&ds, &config(1, 5)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn shrinkage_out_of_range_is_rejected() {
        let ds = slow_and_fast(1, 100);
        let mut cfg = config(1, 1);
        cfg.shrinkage = Some(1.5);
        assert_eq!(fit_tica(&ds, &cfg).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn timescale_is_finite_at_bounds() {
        assert!(implied_timescale(1.0, 2).is_finite());
        assert!(implied_timescale(-0.3, 2).is_finite());
        assert!((implied_timescale((-1.0f64).exp(), 3) - 3.0).abs() < 1e-12);
    }
}
