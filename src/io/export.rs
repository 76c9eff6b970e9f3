//! Export per-state MSM results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use crate::domain::MsmModel;
use crate::error::AppError;
use crate::io::write_replacing;

/// Number of left eigenvector columns written after the population.
const EXPORT_EIGENVECTORS: usize = 3;

/// Write one row per state: index, original label, population, leading left eigenvectors.
pub fn write_states_csv(path: &Path, msm: &MsmModel) -> Result<(), AppError> {
    let n_vec = EXPORT_EIGENVECTORS.min(msm.eigenvalues.len());

    write_replacing(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        let csv_err = |e: csv::Error| AppError::parse(path, format!("CSV write failed: {e}"));

        let mut header = vec!["state".to_string(), "label".to_string(), "population".to_string()];
        header.extend((0..n_vec).map(|k| format!("left_eigenvector_{k}")));
        writer.write_record(&header).map_err(csv_err)?;

        for (state, &label) in msm.state_labels.iter().enumerate() {
            let mut record = vec![
                state.to_string(),
                label.to_string(),
                format!("{:.10}", msm.populations[state]),
            ];
            record.extend(
                msm.left_eigenvectors[state]
                    .iter()
                    .take(n_vec)
                    .map(|v| format!("{v:.10}")),
            );
            writer.write_record(&record).map_err(csv_err)?;
        }

        writer
            .flush()
            .map_err(|e| AppError::write(path, e))
    })
}
