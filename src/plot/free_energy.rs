//! Free-energy landscape SVG.
//!
//! The first two projected coordinates are binned into a 2-D histogram and
//! shown as `F = -ln p` (kT, shifted so the minimum is 0). Cluster centres are
//! overlaid as circles:
//!
//! - radius grows with the MSM population of the state
//! - colour follows the sign and magnitude of the first non-stationary left
//!   eigenvector (red positive, blue negative)
//!
//! Clusters trimmed out of the MSM are not drawn.

use std::io::Write;
use std::path::Path;

use plotters::prelude::*;
use tracing::debug;

use crate::domain::{ClusterModel, FeatureSet, MsmModel};
use crate::error::AppError;
use crate::io::write_replacing;
use crate::plot::ascii::bin_index;

pub const DEFAULT_BINS: usize = 60;
const SIZE: (u32, u32) = (900, 750);
const MIN_RADIUS: f64 = 3.0;
const MAX_RADIUS: f64 = 22.0;

/// Binned free energy over the first two coordinates.
#[derive(Debug, Clone)]
pub struct FreeEnergyGrid {
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub bins: usize,
    /// Row-major `bins × bins` (x index major); `None` marks an empty bin.
    pub values: Vec<Option<f64>>,
}

impl FreeEnergyGrid {
    pub fn at(&self, ix: usize, iy: usize) -> Option<f64> {
        self.values[ix * self.bins + iy]
    }

    pub fn max_energy(&self) -> f64 {
        self.values.iter().flatten().copied().fold(0.0, f64::max)
    }
}

/// One cluster centre to overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct CenterMarker {
    pub x: f64,
    pub y: f64,
    pub population: f64,
    /// Component of the first non-stationary left eigenvector (0 when absent).
    pub eigvec: f64,
}

/// Histogram the first two columns of `projection`.
pub fn free_energy_grid(projection: &FeatureSet, bins: usize) -> Result<FreeEnergyGrid, AppError> {
    let n_cols = projection.require_shape("free-energy projection", None)?;
    if n_cols < 2 {
        return Err(AppError::contract(format!(
            "Free-energy plot needs at least 2 projected coordinates, found {n_cols}."
        )));
    }
    let bins = bins.max(2);
    let points: Vec<(f64, f64)> = projection
        .all_rows()
        .map(|r| (r[0], r[1]))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.is_empty() {
        return Err(AppError::numerical("Projection has no finite points to plot."));
    }

    let x_range = padded_range(points.iter().map(|p| p.0));
    let y_range = padded_range(points.iter().map(|p| p.1));

    let mut counts = vec![0usize; bins * bins];
    for &(x, y) in &points {
        let ix = bin_index(x, x_range.0, x_range.1, bins);
        let iy = bin_index(y, y_range.0, y_range.1, bins);
        counts[ix * bins + iy] += 1;
    }

    let total = points.len() as f64;
    let raw: Vec<Option<f64>> = counts
        .iter()
        .map(|&c| (c > 0).then(|| -(c as f64 / total).ln()))
        .collect();
    let floor = raw.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let values = raw.into_iter().map(|v| v.map(|f| f - floor)).collect();

    Ok(FreeEnergyGrid {
        x_range,
        y_range,
        bins,
        values,
    })
}

/// Centres of clusters that survived MSM trimming, with their state data.
pub fn center_markers(clusterer: &ClusterModel, msm: &MsmModel) -> Result<Vec<CenterMarker>, AppError> {
    let mut markers = Vec::with_capacity(msm.n_states);
    for (label, center) in clusterer.centers.iter().enumerate() {
        let Some(state) = msm.state_of(label) else {
            continue;
        };
        if center.len() < 2 {
            return Err(AppError::contract("Cluster centres need at least 2 coordinates to plot."));
        }
        let population = *msm.populations.get(state).ok_or_else(|| {
            AppError::contract(format!("MSM state {state} has no population; model and clusterer disagree."))
        })?;
        let eigvec = msm
            .left_eigenvectors
            .get(state)
            .and_then(|row| row.get(1))
            .copied()
            .unwrap_or(0.0);
        markers.push(CenterMarker {
            x: center[0],
            y: center[1],
            population,
            eigvec,
        });
    }
    Ok(markers)
}

/// Render the landscape and markers into an SVG at `path`.
pub fn render_free_energy_svg(path: &Path, grid: &FreeEnergyGrid, markers: &[CenterMarker]) -> Result<(), AppError> {
    let mut svg = String::new();
    draw(&mut svg, grid, markers).map_err(|e| AppError::Plot(e.to_string()))?;
    write_replacing(path, |w| w.write_all(svg.as_bytes()).map_err(|e| AppError::write(path, e)))?;
    debug!(path = %path.display(), markers = markers.len(), "free-energy plot written");
    Ok(())
}

fn draw(svg: &mut String, grid: &FreeEnergyGrid, markers: &[CenterMarker]) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::with_string(svg, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x0, x1) = grid.x_range;
    let (y0, y1) = grid.y_range;
    let mut chart = ChartBuilder::on(&root)
        .caption("Free energy (kT)", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("component 0")
        .y_desc("component 1")
        .draw()?;

    let f_max = grid.max_energy().max(f64::EPSILON);
    let dx = (x1 - x0) / grid.bins as f64;
    let dy = (y1 - y0) / grid.bins as f64;
    let cells = (0..grid.bins).flat_map(|ix| (0..grid.bins).map(move |iy| (ix, iy)));
    chart.draw_series(cells.filter_map(|(ix, iy)| {
        let f = grid.at(ix, iy)?;
        let left = x0 + ix as f64 * dx;
        let bottom = y0 + iy as f64 * dy;
        Some(Rectangle::new(
            [(left, bottom), (left + dx, bottom + dy)],
            energy_color(f / f_max).filled(),
        ))
    }))?;

    let pop_max = markers.iter().map(|m| m.population).fold(0.0, f64::max).max(f64::EPSILON);
    let v_max = markers.iter().map(|m| m.eigvec.abs()).fold(0.0, f64::max).max(f64::EPSILON);
    chart.draw_series(markers.iter().map(|m| {
        let radius = MIN_RADIUS + (MAX_RADIUS - MIN_RADIUS) * (m.population / pop_max).sqrt();
        Circle::new((m.x, m.y), radius.round() as i32, eigvec_color(m.eigvec / v_max).filled())
    }))?;
    chart.draw_series(markers.iter().map(|m| {
        let radius = MIN_RADIUS + (MAX_RADIUS - MIN_RADIUS) * (m.population / pop_max).sqrt();
        Circle::new((m.x, m.y), radius.round() as i32, BLACK.stroke_width(1))
    }))?;

    root.present()?;
    Ok(())
}

/// Low energy dark blue, high energy pale yellow.
fn energy_color(t: f64) -> HSLColor {
    let t = t.clamp(0.0, 1.0);
    HSLColor(0.66 - 0.5 * t, 0.8, 0.25 + 0.55 * t)
}

/// `v` in `[-1, 1]`: red for positive, blue for negative, white near zero.
fn eigvec_color(v: f64) -> RGBColor {
    let v = v.clamp(-1.0, 1.0);
    let fade = (255.0 * (1.0 - v.abs())).round() as u8;
    if v >= 0.0 { RGBColor(255, fade, fade) } else { RGBColor(fade, fade, 255) }
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((max - min) * 0.02).max(1e-6);
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClusterKind, Dataset, DatasetKind, ReversibleType, Sequence};
    use std::collections::BTreeMap;

    fn projection() -> FeatureSet {
        let mut data = Vec::new();
        for i in 0..200 {
            let t = i as f64 / 200.0;
            data.extend([t, (t * 6.0).sin(), 0.0]);
        }
        Dataset::new(DatasetKind::Projection, vec![Sequence::new("t0", 3, data)])
    }

    fn msm_for(labels: &[usize]) -> MsmModel {
        let n = labels.len();
        MsmModel {
            lag_time: 1,
            reversible_type: ReversibleType::Mle,
            ergodic_cutoff: 1.0,
            prior_counts: 0.0,
            n_states: n,
            mapping: labels.iter().enumerate().map(|(s, &l)| (l, s)).collect::<BTreeMap<_, _>>(),
            state_labels: labels.to_vec(),
            excluded_labels: Vec::new(),
            populations: vec![1.0 / n as f64; n],
            eigenvalues: vec![1.0, 0.5],
            left_eigenvectors: (0..n).map(|s| vec![1.0 / n as f64, if s == 0 { 0.3 } else { -0.3 }]).collect(),
            right_eigenvectors: vec![vec![1.0, 0.0]; n],
            timescales: vec![1.44],
            transition_matrix: vec![vec![1.0 / n as f64; n]; n],
            countsmat: vec![vec![1.0; n]; n],
        }
    }

    #[test]
    fn grid_minimum_is_zero() {
        let grid = free_energy_grid(&projection(), 10).unwrap();
        let min = grid.values.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(min, 0.0);
        assert!(grid.values.iter().flatten().all(|f| *f >= 0.0));
        assert!(grid.values.iter().any(Option::is_none));
    }

    #[test]
    fn one_dimensional_projection_is_rejected() {
        let ds = Dataset::new(DatasetKind::Projection, vec![Sequence::new("t", 1, vec![1.0, 2.0])]);
        assert_eq!(free_energy_grid(&ds, 10).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn trimmed_clusters_are_skipped() {
        let clusterer = ClusterModel {
            kind: ClusterKind::KMeans,
            n_clusters: 3,
            random_state: 0,
            centers: vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]],
            inertia: 0.0,
            n_iter: 1,
        };
        let markers = center_markers(&clusterer, &msm_for(&[0, 2])).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1].x, 2.0);
        assert_eq!(markers[0].eigvec, 0.3);
        assert_eq!(markers[1].eigvec, -0.3);
    }

    #[test]
    fn svg_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fe.svg");
        let grid = free_energy_grid(&projection(), 20).unwrap();
        let markers = vec![CenterMarker {
            x: 0.5,
            y: 0.0,
            population: 1.0,
            eigvec: 0.0,
        }];
        render_free_energy_svg(&path, &grid, &markers).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("<circle"));
    }
}
