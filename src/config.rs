//! Pipeline parameters loaded from TOML.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults below. Unknown keys are rejected so typos do not pass silently.
//!
//! ```toml
//! [featurize]
//! stride = 10
//!
//! [reduce]
//! kind = "tICA"
//! n-components = 4
//! lag-time = 2
//!
//! [cluster]
//! n-clusters = 100
//!
//! [msm]
//! lag-time = 2
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::domain::{
    ClusterKind, DatasetSource, DihedralType, FeaturizerKind, ReducerKind, ReversibleType, ScalerKind,
};
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PipelineConfig {
    pub dataset: DatasetSection,
    pub featurize: FeaturizeSection,
    pub scale: ScaleSection,
    pub reduce: ReduceSection,
    pub cluster: ClusterSection,
    pub msm: MsmSection,
    pub plot: PlotSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DatasetSection {
    pub source: DatasetSource,
    pub url: Option<String>,
    pub data_home: Option<PathBuf>,
    pub seed: u64,
    pub n_trajectories: usize,
    pub n_frames: usize,
    pub n_residues: usize,
    pub force: bool,
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            source: DatasetSource::Synthetic,
            url: None,
            data_home: None,
            seed: 42,
            n_trajectories: 4,
            n_frames: 1000,
            n_residues: 22,
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FeaturizeSection {
    pub kind: FeaturizerKind,
    pub types: Vec<DihedralType>,
    pub stride: usize,
}

impl Default for FeaturizeSection {
    fn default() -> Self {
        Self {
            kind: FeaturizerKind::DihedralFeaturizer,
            types: vec![DihedralType::Phi, DihedralType::Psi],
            stride: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ScaleSection {
    pub kind: ScalerKind,
}

impl Default for ScaleSection {
    fn default() -> Self {
        Self {
            kind: ScalerKind::RobustScaler,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ReduceSection {
    pub kind: ReducerKind,
    pub n_components: usize,
    pub lag_time: usize,
    pub shrinkage: Option<f64>,
    pub kinetic_mapping: bool,
}

impl Default for ReduceSection {
    fn default() -> Self {
        Self {
            kind: ReducerKind::Tica,
            n_components: 4,
            lag_time: 2,
            shrinkage: None,
            kinetic_mapping: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ClusterSection {
    pub kind: ClusterKind,
    pub n_clusters: usize,
    pub random_state: u64,
    pub max_iter: Option<usize>,
    pub batch_size: usize,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            kind: ClusterKind::MiniBatchKMeans,
            n_clusters: 100,
            random_state: 42,
            max_iter: None,
            batch_size: crate::cluster::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct MsmSection {
    pub lag_time: usize,
    pub reversible_type: ReversibleType,
    pub ergodic_cutoff: Option<f64>,
    pub prior_counts: f64,
    pub n_timescales: Option<usize>,
    /// States shown in the summary.
    pub top: usize,
}

impl Default for MsmSection {
    fn default() -> Self {
        Self {
            lag_time: 2,
            reversible_type: ReversibleType::Mle,
            ergodic_cutoff: None,
            prior_counts: 0.0,
            n_timescales: None,
            top: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PlotSection {
    pub bins: usize,
}

impl Default for PlotSection {
    fn default() -> Self {
        Self {
            bins: crate::plot::DEFAULT_BINS,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        debug!(path = %path.display(), "loading pipeline configuration");
        let content = std::fs::read_to_string(path).map_err(|e| AppError::read(path, e))?;
        Self::from_toml(&content).map_err(|message| AppError::parse(path, message))
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}
