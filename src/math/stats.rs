//! Column statistics used by the scalers.
//!
//! Quantiles use linear interpolation between order statistics, so the
//! median of an even-length column is the midpoint of the two central values.

/// Quantile `q ∈ [0, 1]` of an already sorted slice.
///
/// Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Sort a copy of `values` (NaNs last) for quantile queries.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted_copy(values), 0.5)
}

/// Interquartile range `q75 - q25`.
pub fn iqr(values: &[f64]) -> Option<f64> {
    let sorted = sorted_copy(values);
    Some(quantile_sorted(&sorted, 0.75)? - quantile_sorted(&sorted, 0.25)?)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_interpolates_even_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn iqr_matches_linear_interpolation() {
        // q25 = 2.25, q75 = 4.75
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!((iqr(&v).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        assert_eq!(std_dev(&[2.0, 2.0, 2.0]), Some(0.0));
        assert!((std_dev(&[1.0, 3.0]).unwrap() - 1.0).abs() < 1e-12);
    }
}
