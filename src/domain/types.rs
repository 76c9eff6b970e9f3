//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by one pipeline stage and persisted as JSON
//! - reloaded later by a downstream stage or the plotting command
//! - inspected by hand (every field is plain numbers and strings)

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Featurizer implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum FeaturizerKind {
    /// Backbone dihedral angles (phi / psi / omega) as sin/cos pairs.
    #[value(name = "DihedralFeaturizer")]
    DihedralFeaturizer,
    /// Dihedrals between four consecutive alpha carbons as sin/cos pairs.
    #[value(name = "AlphaAngleFeaturizer")]
    AlphaAngleFeaturizer,
}

/// Backbone dihedral angle families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DihedralType {
    Phi,
    Psi,
    Omega,
    Alpha,
}

/// Scaler implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ScalerKind {
    /// Center by median, scale by interquartile range.
    #[value(name = "RobustScaler")]
    RobustScaler,
    /// Center by mean, scale by standard deviation.
    #[value(name = "StandardScaler")]
    StandardScaler,
}

/// Dimensionality reducer implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ReducerKind {
    #[value(name = "tICA")]
    #[serde(rename = "tICA")]
    Tica,
    #[value(name = "PCA")]
    #[serde(rename = "PCA")]
    Pca,
}

/// Clusterer implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ClusterKind {
    #[value(name = "MiniBatchKMeans")]
    MiniBatchKMeans,
    #[value(name = "KMeans")]
    KMeans,
}

/// How the transition matrix is made reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReversibleType {
    /// Maximum-likelihood reversible estimate (fixed-point iteration).
    Mle,
    /// Symmetrize the count matrix, then row-normalize.
    Transpose,
}

/// One dihedral: four atom indices into the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DihedralSpec {
    pub kind: DihedralType,
    /// Residue sequence number the angle is attributed to.
    pub residue: i32,
    pub atoms: [usize; 4],
}

/// Persisted featurizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturizerModel {
    pub kind: FeaturizerKind,
    pub types: Vec<DihedralType>,
    pub stride: usize,
    pub n_atoms: usize,
    pub dihedrals: Vec<DihedralSpec>,
    /// Always `2 * dihedrals.len()` (sin and cos).
    pub n_features: usize,
}

/// Persisted per-column affine scaler: `(x - center) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerModel {
    pub kind: ScalerKind,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Persisted linear projection (tICA or PCA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReducerModel {
    pub kind: ReducerKind,
    pub n_features: usize,
    pub n_components: usize,
    /// Lag time in frames (tICA only).
    pub lag_time: Option<usize>,
    pub shrinkage: Option<f64>,
    pub kinetic_mapping: bool,
    pub means: Vec<f64>,
    /// `n_components` rows of `n_features` loadings each.
    pub components: Vec<Vec<f64>>,
    /// Autocorrelations (tICA) or variances (PCA), descending.
    pub eigenvalues: Vec<f64>,
    /// Implied timescales in frames (tICA only, empty for PCA).
    pub timescales: Vec<f64>,
}

/// Persisted clusterer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    pub kind: ClusterKind,
    pub n_clusters: usize,
    pub random_state: u64,
    pub centers: Vec<Vec<f64>>,
    /// Sum of squared distances to the nearest centre.
    pub inertia: f64,
    pub n_iter: usize,
}

/// Persisted Markov state model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsmModel {
    pub lag_time: usize,
    pub reversible_type: ReversibleType,
    pub ergodic_cutoff: f64,
    pub prior_counts: f64,
    pub n_states: usize,
    /// Original cluster label -> state index.
    pub mapping: BTreeMap<usize, usize>,
    /// State index -> original cluster label.
    pub state_labels: Vec<usize>,
    /// Labels seen in the input but outside the largest connected set.
    pub excluded_labels: Vec<usize>,
    pub populations: Vec<f64>,
    pub eigenvalues: Vec<f64>,
    /// One row per state; column `k` is the `k`-th left eigenvector.
    pub left_eigenvectors: Vec<Vec<f64>>,
    /// One row per state; column `k` is the `k`-th right eigenvector.
    pub right_eigenvectors: Vec<Vec<f64>>,
    /// Implied timescales in frames, one per non-stationary eigenvalue.
    pub timescales: Vec<f64>,
    pub transition_matrix: Vec<Vec<f64>>,
    pub countsmat: Vec<Vec<f64>>,
}

impl MsmModel {
    /// State index for an original cluster label, if it survived trimming.
    pub fn state_of(&self, label: usize) -> Option<usize> {
        self.mapping.get(&label).copied()
    }
}

/// Envelope written around every persisted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile<M> {
    pub tool: String,
    pub version: String,
    pub created: DateTime<Utc>,
    pub model: M,
}

impl<M> ModelFile<M> {
    pub fn new(model: M) -> Self {
        Self {
            tool: "msm".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: Utc::now(),
            model,
        }
    }
}

/// Source of the example dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    /// Generate a seeded synthetic peptide dataset locally.
    Synthetic,
    /// Download files listed in `<url>/manifest.json`.
    Remote,
}

/// Manifest stored next to a fetched dataset (and served by remote sources).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub name: String,
    pub topology: String,
    pub trajectories: Vec<String>,
}
