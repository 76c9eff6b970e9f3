//! k-means building blocks over borrowed rows.
//!
//! - `kmeans_plus_plus`: seeded D²-weighted initialisation
//! - `lloyd`: full-batch Lloyd iterations until the centre shift falls below tolerance
//! - `mini_batch`: sampled batches with per-centre learning rates
//!
//! Assignment of many rows is parallel; every reduction that feeds a decision
//! (convergence, early stopping) is summed sequentially so results do not
//! depend on the thread count.

use rand::Rng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, trace};

/// Consecutive non-improving mini-batch steps before stopping.
const MAX_NO_IMPROVEMENT: usize = 10;

/// Result of a k-means run.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centers: Vec<Vec<f64>>,
    pub inertia: f64,
    pub n_iter: usize,
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centre index and its squared distance. Ties go to the lower index.
pub fn nearest(centers: &[Vec<f64>], row: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (k, c) in centers.iter().enumerate() {
        let d = squared_distance(c, row);
        if d < best.1 {
            best = (k, d);
        }
    }
    best
}

/// Assign every row in parallel (order preserved).
pub fn assign(centers: &[Vec<f64>], rows: &[&[f64]]) -> Vec<(usize, f64)> {
    rows.par_iter().map(|row| nearest(centers, row)).collect()
}

/// k-means++ seeding: the first centre uniformly, each next one with
/// probability proportional to its squared distance from the chosen set.
pub fn kmeans_plus_plus(rows: &[&[f64]], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = rows.len();
    let mut centers = Vec::with_capacity(k);
    centers.push(rows[rng.gen_range(0..n)].to_vec());

    let mut d2: Vec<f64> = rows.iter().map(|r| squared_distance(r, &centers[0])).collect();
    while centers.len() < k {
        let total: f64 = d2.iter().sum();
        let pick = if total > 0.0 {
            let mut target = rng.r#gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &d) in d2.iter().enumerate() {
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // Every row coincides with a centre already.
            rng.gen_range(0..n)
        };

        let center = rows[pick].to_vec();
        for (d, row) in d2.iter_mut().zip(rows) {
            *d = d.min(squared_distance(row, &center));
        }
        centers.push(center);
    }
    centers
}

/// Lloyd iterations. Empty clusters are moved to the row farthest from its centre.
pub fn lloyd(rows: &[&[f64]], mut centers: Vec<Vec<f64>>, max_iter: usize, tol: f64) -> KMeansFit {
    let k = centers.len();
    let dim = rows.first().map_or(0, |r| r.len());
    let tol_abs = tol * mean_variance(rows);

    let mut n_iter = 0;
    for iter in 0..max_iter {
        n_iter = iter + 1;
        let assignment = assign(&centers, rows);

        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (row, &(label, _)) in rows.iter().zip(&assignment) {
            counts[label] += 1;
            for (s, x) in sums[label].iter_mut().zip(row.iter()) {
                *s += x;
            }
        }

        let mut far: Vec<usize> = (0..rows.len()).collect();
        far.sort_by(|&a, &b| assignment[b].1.total_cmp(&assignment[a].1));
        let mut far = far.into_iter();

        let mut shift = 0.0;
        for c in 0..k {
            let updated = if counts[c] > 0 {
                sums[c].iter().map(|s| s / counts[c] as f64).collect()
            } else if let Some(i) = far.next() {
                trace!(center = c, row = i, "relocating empty cluster");
                rows[i].to_vec()
            } else {
                centers[c].clone()
            };
            shift += squared_distance(&centers[c], &updated);
            centers[c] = updated;
        }

        trace!(iter = n_iter, shift, "lloyd step");
        if shift <= tol_abs {
            break;
        }
    }

    let inertia = assign(&centers, rows).iter().map(|(_, d)| d).sum();
    debug!(n_iter, inertia, "lloyd finished");
    KMeansFit {
        centers,
        inertia,
        n_iter,
    }
}

/// Mini-batch k-means. `max_iter` counts passes over the data; each step
/// draws `batch_size` rows with replacement.
pub fn mini_batch(
    rows: &[&[f64]],
    mut centers: Vec<Vec<f64>>,
    batch_size: usize,
    max_iter: usize,
    rng: &mut StdRng,
) -> KMeansFit {
    let n = rows.len();
    let batch_size = batch_size.clamp(1, n);
    let n_steps = max_iter * n.div_ceil(batch_size);
    let alpha = (2.0 * batch_size as f64 / n as f64).min(1.0);

    let mut counts = vec![0usize; centers.len()];
    let mut ewa: Option<f64> = None;
    let mut best = f64::INFINITY;
    let mut stale = 0;
    let mut n_iter = 0;

    for step in 0..n_steps {
        n_iter = step + 1;
        let batch: Vec<usize> = (0..batch_size).map(|_| rng.gen_range(0..n)).collect();

        let mut batch_inertia = 0.0;
        for &i in &batch {
            let (label, d) = nearest(&centers, rows[i]);
            batch_inertia += d;
            counts[label] += 1;
            let eta = 1.0 / counts[label] as f64;
            for (c, x) in centers[label].iter_mut().zip(rows[i].iter()) {
                *c += eta * (x - *c);
            }
        }
        batch_inertia /= batch_size as f64;

        let smoothed = match ewa {
            Some(prev) => prev * (1.0 - alpha) + batch_inertia * alpha,
            None => batch_inertia,
        };
        ewa = Some(smoothed);

        if smoothed < best {
            best = smoothed;
            stale = 0;
        } else {
            stale += 1;
            if stale >= MAX_NO_IMPROVEMENT {
                debug!(step = n_iter, smoothed, "mini-batch converged");
                break;
            }
        }
    }

    let inertia = assign(&centers, rows).iter().map(|(_, d)| d).sum();
    KMeansFit {
        centers,
        inertia,
        n_iter,
    }
}

/// Mean per-column variance, the scale for the convergence tolerance.
fn mean_variance(rows: &[&[f64]]) -> f64 {
    let n = rows.len();
    let Some(dim) = rows.first().map(|r| r.len()) else {
        return 0.0;
    };
    if n == 0 || dim == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for j in 0..dim {
        let mean = rows.iter().map(|r| r[j]).sum::<f64>() / n as f64;
        total += rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n as f64;
    }
    total / dim as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn blobs() -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(9);
        let mut out = Vec::new();
        for center in [[0.0, 0.0], [10.0, 10.0], [-10.0, 10.0]] {
            for _ in 0..60 {
                out.push(vec![
                    center[0] + rng.gen_range(-1.0..1.0),
                    center[1] + rng.gen_range(-1.0..1.0),
                ]);
            }
        }
        out
    }

    #[test]
    fn nearest_prefers_lower_index_on_ties() {
        let centers = vec![vec![1.0], vec![-1.0]];
        assert_eq!(nearest(&centers, &[0.0]), (0, 1.0));
    }

    #[test]
    fn plus_plus_picks_distinct_rows() {
        let data = blobs();
        let rows: Vec<&[f64]> = data.iter().map(Vec::as_slice).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let centers = kmeans_plus_plus(&rows, 3, &mut rng);
        assert_eq!(centers.len(), 3);
        for i in 0..3 {
            for j in i + 1..3 {
                assert!(squared_distance(&centers[i], &centers[j]) > 0.0);
            }
        }
    }

    #[test]
    fn lloyd_recovers_blob_centres() {
        let data = blobs();
        let rows: Vec<&[f64]> = data.iter().map(Vec::as_slice).collect();
        let mut rng = StdRng::seed_from_u64(4);
        let init = kmeans_plus_plus(&rows, 3, &mut rng);
        let fit = lloyd(&rows, init, 100, 1e-6);

        for target in [[0.0, 0.0], [10.0, 10.0], [-10.0, 10.0]] {
            let (_, d) = nearest(&fit.centers, &target);
            assert!(d < 0.5, "no centre near {target:?}: {:?}", fit.centers);
        }
        // 180 points uniform in a 2x2 box: mean squared radius 2/3.
        assert!(fit.inertia < 180.0);
    }

    #[test]
    fn identical_rows_do_not_break_seeding() {
        let data = vec![vec![1.0, 1.0]; 5];
        let rows: Vec<&[f64]> = data.iter().map(Vec::as_slice).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let centers = kmeans_plus_plus(&rows, 3, &mut rng);
        let fit = lloyd(&rows, centers, 10, 1e-4);
        assert_eq!(fit.inertia, 0.0);
    }

    #[test]
    fn mini_batch_lands_near_blobs() {
        let data = blobs();
        let rows: Vec<&[f64]> = data.iter().map(Vec::as_slice).collect();
        let mut rng = StdRng::seed_from_u64(2);
        let init = kmeans_plus_plus(&rows, 3, &mut rng);
        let fit = mini_batch(&rows, init, 20, 50, &mut rng);
        for target in [[0.0, 0.0], [10.0, 10.0], [-10.0, 10.0]] {
            let (_, d) = nearest(&fit.centers, &target);
            assert!(d < 2.0, "no centre near {target:?}: {:?}", fit.centers);
        }
    }
}
