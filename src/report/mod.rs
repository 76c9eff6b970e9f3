//! Reporting utilities: state rankings and formatted terminal output.

use crate::domain::MsmModel;

pub mod format;

pub use format::*;

/// One MSM state as shown in reports.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRow {
    pub state: usize,
    pub label: usize,
    pub population: f64,
}

/// The `top_n` most populated states, largest first (ties by state index).
pub fn rank_states(msm: &MsmModel, top_n: usize) -> Vec<StateRow> {
    let mut rows: Vec<StateRow> = msm
        .state_labels
        .iter()
        .zip(&msm.populations)
        .enumerate()
        .map(|(state, (&label, &population))| StateRow {
            state,
            label,
            population,
        })
        .collect();
    rows.sort_by(|a, b| b.population.total_cmp(&a.population).then(a.state.cmp(&b.state)));
    rows.truncate(top_n);
    rows
}
