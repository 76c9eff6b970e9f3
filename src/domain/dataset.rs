//! Array datasets: one row-major 2-D array per trajectory.
//!
//! Every transformed-data stage reads and writes this container. Rows stay in
//! frame order and sequences stay in trajectory order, so a label at
//! `(sequence, row)` always refers to the same frame as the projection at the
//! same position.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// What a dataset file holds (informational, checked on read).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Features,
    Scaled,
    Projection,
    Labels,
}

/// One trajectory's worth of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence<T> {
    /// Where the rows came from (trajectory file name).
    pub source: String,
    pub n_cols: usize,
    /// Row-major values, `n_rows * n_cols` long.
    pub data: Vec<T>,
}

impl<T> Sequence<T> {
    pub fn new(source: impl Into<String>, n_cols: usize, data: Vec<T>) -> Self {
        Self {
            source: source.into(),
            n_cols,
            data,
        }
    }

    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 { 0 } else { self.data.len() / self.n_cols }
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks_exact(self.n_cols.max(1))
    }
}

/// A dataset of per-trajectory arrays sharing one column count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset<T> {
    pub kind: DatasetKind,
    pub sequences: Vec<Sequence<T>>,
}

/// Real-valued datasets (features, scaled features, projections).
pub type FeatureSet = Dataset<f64>;

/// Integer state labels, one per frame.
pub type LabelSet = Dataset<usize>;

impl<T> Dataset<T> {
    pub fn new(kind: DatasetKind, sequences: Vec<Sequence<T>>) -> Self {
        Self { kind, sequences }
    }

    /// Shared column count, or `None` for a dataset without sequences.
    pub fn n_cols(&self) -> Option<usize> {
        self.sequences.first().map(|s| s.n_cols)
    }

    pub fn n_rows_total(&self) -> usize {
        self.sequences.iter().map(Sequence::n_rows).sum()
    }

    pub fn rows_per_sequence(&self) -> Vec<usize> {
        self.sequences.iter().map(Sequence::n_rows).collect()
    }

    /// Iterate over every row of every sequence, in order.
    pub fn all_rows(&self) -> impl Iterator<Item = &[T]> {
        self.sequences.iter().flat_map(|s| s.rows())
    }

    /// Check the shape invariants every stage relies on.
    pub fn validate(&self) -> Result<(), AppError> {
        let Some(n_cols) = self.n_cols() else {
            return Err(AppError::contract("Dataset contains no sequences."));
        };
        if n_cols == 0 {
            return Err(AppError::contract("Dataset has zero columns."));
        }
        for (i, seq) in self.sequences.iter().enumerate() {
            if seq.n_cols != n_cols {
                return Err(AppError::contract(format!(
                    "Sequence {i} ('{}') has {} columns, expected {n_cols}.",
                    seq.source, seq.n_cols
                )));
            }
            if seq.data.len() % n_cols != 0 {
                return Err(AppError::contract(format!(
                    "Sequence {i} ('{}') holds {} values, not a multiple of {n_cols} columns.",
                    seq.source,
                    seq.data.len()
                )));
            }
        }
        Ok(())
    }

    /// Require a non-empty dataset with a fixed column count.
    pub fn require_shape(&self, what: &str, n_cols: Option<usize>) -> Result<usize, AppError> {
        self.validate()?;
        let actual = self.n_cols().unwrap_or(0);
        if let Some(expected) = n_cols {
            if actual != expected {
                return Err(AppError::contract(format!(
                    "{what}: expected {expected} columns, found {actual}."
                )));
            }
        }
        if self.n_rows_total() == 0 {
            return Err(AppError::contract(format!("{what}: dataset has no rows.")));
        }
        Ok(actual)
    }
}

impl LabelSet {
    /// Flatten the single label column of each sequence.
    pub fn label_sequences(&self) -> Vec<&[usize]> {
        self.sequences.iter().map(|s| s.data.as_slice()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureSet {
        Dataset::new(
            DatasetKind::Features,
            vec![
                Sequence::new("a", 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
                Sequence::new("b", 2, vec![7.0, 8.0]),
            ],
        )
    }

    #[test]
    fn rows_are_counted_per_sequence() {
        let ds = sample();
        assert_eq!(ds.n_cols(), Some(2));
        assert_eq!(ds.rows_per_sequence(), vec![3, 1]);
        assert_eq!(ds.n_rows_total(), 4);
        assert_eq!(ds.sequences[0].row(1), &[3.0, 4.0]);
        assert_eq!(ds.all_rows().count(), 4);
    }

    #[test]
    fn ragged_data_is_rejected() {
        let mut ds = sample();
        ds.sequences[1].data.push(9.0);
        assert!(matches!(ds.validate(), Err(AppError::Contract(_))));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut ds = sample();
        ds.sequences[1].n_cols = 1;
        assert!(ds.validate().is_err());
        assert!(sample().require_shape("features", Some(3)).is_err());
        assert_eq!(sample().require_shape("features", Some(2)).unwrap(), 2);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let ds: FeatureSet = Dataset::new(DatasetKind::Features, Vec::new());
        assert!(ds.validate().is_err());
    }
}
