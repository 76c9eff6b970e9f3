//! Read/write dataset and model JSON files.
//!
//! Datasets are `domain::Dataset<T>`; models are wrapped in
//! `domain::ModelFile<M>` so every file records the tool version and creation
//! time alongside the fitted parameters.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{Dataset, DatasetKind, ModelFile};
use crate::error::AppError;
use crate::io::write_replacing;

#[derive(Deserialize)]
struct DatasetHeader {
    kind: DatasetKind,
}

/// Write a dataset, validating its shape first.
pub fn write_dataset<T: Serialize>(path: &Path, dataset: &Dataset<T>) -> Result<(), AppError> {
    dataset.validate()?;
    write_json(path, dataset)?;
    debug!(
        path = %path.display(),
        sequences = dataset.sequences.len(),
        rows = dataset.n_rows_total(),
        "wrote dataset"
    );
    Ok(())
}

/// Read a dataset and check its shape invariants.
///
/// `expected` restricts the accepted dataset kinds (empty slice accepts any).
pub fn read_dataset<T: DeserializeOwned>(path: &Path, expected: &[DatasetKind]) -> Result<Dataset<T>, AppError> {
    let value: serde_json::Value = read_json(path)?;
    let header = DatasetHeader::deserialize(&value).map_err(|e| AppError::parse(path, e.to_string()))?;
    if !expected.is_empty() && !expected.contains(&header.kind) {
        return Err(AppError::contract(format!(
            "'{}' holds a {:?} dataset, expected one of {:?}.",
            path.display(),
            header.kind,
            expected
        )));
    }
    let dataset = Dataset::<T>::deserialize(value).map_err(|e| AppError::parse(path, e.to_string()))?;
    dataset.validate()?;
    Ok(dataset)
}

/// Write a model wrapped in its file envelope.
pub fn write_model<M: Serialize>(path: &Path, model: M) -> Result<(), AppError> {
    write_json(path, &ModelFile::new(model))
}

/// Read a model file and return the inner model.
pub fn read_model<M: DeserializeOwned>(path: &Path) -> Result<M, AppError> {
    let file: ModelFile<M> = read_json(path)?;
    Ok(file.model)
}

fn write_json<V: Serialize>(path: &Path, value: &V) -> Result<(), AppError> {
    write_replacing(path, |w| {
        serde_json::to_writer(w, value).map_err(|e| AppError::parse(path, format!("serialization failed: {e}")))
    })
}

fn read_json<V: DeserializeOwned>(path: &Path) -> Result<V, AppError> {
    let file = File::open(path).map_err(|e| AppError::read(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| AppError::parse(path, e.to_string()))
}
