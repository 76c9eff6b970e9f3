//! Per-feature scaling.
//!
//! Both scalers fit one `(center, scale)` pair per column over all rows of all
//! sequences and apply `(x - center) / scale`. Row counts and ordering are
//! untouched. A column with no spread keeps scale `1.0` so it is centred but
//! not blown up.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{Dataset, DatasetKind, FeatureSet, ScalerKind, ScalerModel, Sequence};
use crate::error::AppError;
use crate::math::{iqr, mean, median, std_dev};

/// Fit a scaler on `data`.
pub fn fit_scaler(kind: ScalerKind, data: &FeatureSet) -> Result<ScalerModel, AppError> {
    let n_cols = data.require_shape("scale input", None)?;
    let columns = collect_columns(data, n_cols);

    let fitted: Vec<(f64, f64, bool)> = columns
        .par_iter()
        .map(|col| {
            let (c, s) = match kind {
                ScalerKind::RobustScaler => (median(col), iqr(col)),
                ScalerKind::StandardScaler => (mean(col), std_dev(col)),
            };
            let (s, degenerate) = spread_or_unit(s);
            (c.unwrap_or(0.0), s, degenerate)
        })
        .collect();

    let degenerate = fitted.iter().filter(|f| f.2).count();
    let (center, scale): (Vec<f64>, Vec<f64>) = fitted.into_iter().map(|(c, s, _)| (c, s)).unzip();
    debug!(?kind, columns = n_cols, degenerate, "scaler fitted");

    Ok(ScalerModel { kind, center, scale })
}

/// The column spread, or 1 with `true` when the spread is zero or undefined.
fn spread_or_unit(spread: Option<f64>) -> (f64, bool) {
    match spread {
        Some(s) if s.is_finite() && s > 0.0 => (s, false),
        _ => (1.0, true),
    }
}

/// Apply a fitted scaler.
pub fn transform(model: &ScalerModel, data: &FeatureSet) -> Result<FeatureSet, AppError> {
    let n_cols = data.require_shape("scale input", Some(model.center.len()))?;

    let sequences = data
        .sequences
        .iter()
        .map(|seq| {
            let values = seq
                .data
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    let j = i % n_cols;
                    (x - model.center[j]) / model.scale[j]
                })
                .collect();
            Sequence::new(seq.source.clone(), n_cols, values)
        })
        .collect();

    Ok(Dataset::new(DatasetKind::Scaled, sequences))
}

/// Fit on `data` and transform it in one go.
pub fn fit_transform(kind: ScalerKind, data: &FeatureSet) -> Result<(ScalerModel, FeatureSet), AppError> {
    let model = fit_scaler(kind, data)?;
    let scaled = transform(&model, data)?;
    info!(
        ?kind,
        rows = scaled.n_rows_total(),
        columns = model.center.len(),
        "features scaled"
    );
    Ok((model, scaled))
}

fn collect_columns(data: &FeatureSet, n_cols: usize) -> Vec<Vec<f64>> {
    let n_rows = data.n_rows_total();
    let mut columns = vec![Vec::with_capacity(n_rows); n_cols];
    for row in data.all_rows() {
        for (j, &x) in row.iter().enumerate() {
            columns[j].push(x);
        }
    }
    columns
}
