//! ASCII histogram for terminal output.
//!
//! Fixed-size grid, one column per bin, `#` bars scaled to the tallest bin.
//! Output is deterministic, which keeps golden tests simple.

/// Bin counts over `[min, max]`; the top edge falls into the last bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len().max(1) as f64
    }
}

/// Histogram of the finite values in `values`. `None` when there are none.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    let bins = bins.max(1);
    let (min, max) = value_range(values)?;
    let (min, max) = if max > min { (min, max) } else { pad_range(min, max, 0.5) };

    let mut counts = vec![0usize; bins];
    for &v in values.iter().filter(|v| v.is_finite()) {
        counts[bin_index(v, min, max, bins)] += 1;
    }
    Some(Histogram { min, max, counts })
}

/// Render `values` as a `height`-row bar chart with one column per bin.
pub fn render_ascii_histogram(values: &[f64], bins: usize, height: usize, label: &str) -> String {
    let Some(hist) = histogram(values, bins) else {
        return format!("Histogram: {label} | no finite values\n");
    };
    let height = height.max(1);
    let peak = hist.counts.iter().copied().max().unwrap_or(0).max(1);
    let bars: Vec<usize> = hist
        .counts
        .iter()
        .map(|&c| ((c * height) as f64 / peak as f64).round() as usize)
        .collect();

    let mut out = String::new();
    out.push_str(&format!(
        "Histogram: {label} | x=[{:.3}, {:.3}] | bins={} | n={} | max={}\n",
        hist.min,
        hist.max,
        hist.counts.len(),
        hist.total(),
        peak
    ));

    for level in (1..=height).rev() {
        let row: String = bars.iter().map(|&b| if b >= level { '#' } else { ' ' }).collect();
        out.push_str(&row);
        out.push('\n');
    }
    out.push_str(&"-".repeat(bars.len()));
    out.push('\n');
    out
}

fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() { Some((min, max)) } else { None }
}

fn pad_range(min: f64, max: f64, pad: f64) -> (f64, f64) {
    (min - pad, max + pad)
}

pub(crate) fn bin_index(v: f64, min: f64, max: f64, bins: usize) -> usize {
    let u = ((v - min) / (max - min)).clamp(0.0, 1.0);
    ((u * bins as f64) as usize).min(bins - 1)
}
