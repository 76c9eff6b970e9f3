//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the numerical stages stay free of presentation details
//! - output changes are localized (and covered by snapshot tests)

use crate::domain::{MsmModel, ReducerModel};
use crate::report::rank_states;

/// One completed pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageLine {
    pub stage: String,
    pub detail: String,
}

/// MSM summary: state count, trimming, top populations, leading timescales.
pub fn format_msm_summary(msm: &MsmModel, top_n: usize) -> String {
    let mut out = String::new();

    out.push_str("=== msm - Markov State Model ===\n");
    out.push_str(&format!(
        "Lag time: {} frames | reversible: {:?} | ergodic cutoff: {:.4}\n",
        msm.lag_time, msm.reversible_type, msm.ergodic_cutoff
    ));
    out.push_str(&format!(
        "States: {} kept | {} excluded\n",
        msm.n_states,
        msm.excluded_labels.len()
    ));
    if !msm.excluded_labels.is_empty() {
        out.push_str(&format!("Excluded labels: {}\n", fmt_labels(&msm.excluded_labels, 20)));
    }

    out.push_str("\nTop populations:\n");
    out.push_str(&format!("{:>6} {:>6} {:>12}\n", "state", "label", "population"));
    out.push_str(&format!("{:-<6} {:-<6} {:-<12}\n", "", "", ""));
    for row in rank_states(msm, top_n) {
        out.push_str(&format!("{:>6} {:>6} {:>12.6}\n", row.state, row.label, row.population));
    }

    out.push_str("\nLeading timescales (frames):\n");
    if msm.timescales.is_empty() {
        out.push_str("- none (single state)\n");
    }
    for (k, t) in msm.timescales.iter().take(top_n).enumerate() {
        let lambda = msm.eigenvalues.get(k + 1).copied().unwrap_or(f64::NAN);
        out.push_str(&format!("- t{} = {:.3} (lambda={:.6})\n", k + 1, t, lambda));
    }
    out.push('\n');

    out
}

/// Reducer summary: kind, shape, eigenvalues and (tICA) timescales.
pub fn format_reducer_summary(model: &ReducerModel) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:?}: {} features -> {} components",
        model.kind, model.n_features, model.n_components
    ));
    if let Some(lag) = model.lag_time {
        out.push_str(&format!(" | lag={lag}"));
    }
    out.push('\n');
    out.push_str(&format!("- eigenvalues: {}\n", fmt_vec(&model.eigenvalues)));
    if !model.timescales.is_empty() {
        out.push_str(&format!("- timescales : {}\n", fmt_vec(&model.timescales)));
    }
    out
}

/// One line per completed stage.
pub fn format_pipeline_summary(stages: &[StageLine]) -> String {
    let mut out = String::new();
    out.push_str("=== msm - pipeline ===\n");
    for s in stages {
        out.push_str(&format!("{:<24} {}\n", s.stage, s.detail).trim_end());
        out.push('\n');
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_labels(labels: &[usize], max: usize) -> String {
    let shown: Vec<String> = labels.iter().take(max).map(usize::to_string).collect();
    let more = labels.len().saturating_sub(max);
    if more > 0 {
        format!("{} (+{more} more)", shown.join(", "))
    } else {
        shown.join(", ")
    }
}
