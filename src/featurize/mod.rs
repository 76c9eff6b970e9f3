//! Trajectory featurization.
//!
//! Responsibilities:
//!
//! - resolve the trajectory glob into a sorted list of files
//! - derive the dihedral definitions (four atom indices each) from the topology
//! - measure every dihedral in every strided frame and emit `sin`/`cos` pairs
//!
//! Trajectories are read and featurized in parallel; output sequences keep the
//! sorted file order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{
    Dataset, DatasetKind, DihedralSpec, DihedralType, FeatureSet, FeaturizerKind, FeaturizerModel, Sequence,
};
use crate::error::AppError;
use crate::io::{Frame, read_topology, read_trajectory};
use crate::math::dihedral;

pub mod dihedrals;

pub use dihedrals::*;

/// Featurizer run configuration (derived from CLI flags).
#[derive(Debug, Clone)]
pub struct FeaturizeConfig {
    pub kind: FeaturizerKind,
    pub topology: PathBuf,
    pub trajectories: String,
    pub stride: usize,
    pub types: Vec<DihedralType>,
}

#[derive(Debug, Clone)]
pub struct FeaturizeOutput {
    pub model: FeaturizerModel,
    pub features: FeatureSet,
}

/// Featurize every trajectory matched by the configured glob.
pub fn featurize(config: &FeaturizeConfig) -> Result<FeaturizeOutput, AppError> {
    if config.stride == 0 {
        return Err(AppError::argument("Stride must be >= 1."));
    }

    let topology = read_topology(&config.topology)?;
    let types = effective_types(config.kind, &config.types);
    let dihedrals = build_dihedrals(&topology, &types);
    if dihedrals.is_empty() {
        return Err(AppError::contract(format!(
            "Topology '{}' defines no {:?} dihedrals.",
            config.topology.display(),
            types
        )));
    }

    let paths = resolve_trajectories(&config.trajectories)?;
    info!(
        trajectories = paths.len(),
        dihedrals = dihedrals.len(),
        stride = config.stride,
        "featurizing"
    );

    let n_atoms = topology.n_atoms();
    let sequences = paths
        .par_iter()
        .map(|path| {
            let traj = read_trajectory(path, n_atoms)?;
            let data = featurize_frames(&traj.frames, &dihedrals, config.stride);
            debug!(source = %traj.source, frames = traj.n_frames(), "trajectory featurized");
            Ok(Sequence::new(traj.source, 2 * dihedrals.len(), data))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let model = FeaturizerModel {
        kind: config.kind,
        types,
        stride: config.stride,
        n_atoms,
        n_features: 2 * dihedrals.len(),
        dihedrals,
    };

    Ok(FeaturizeOutput {
        model,
        features: Dataset::new(DatasetKind::Features, sequences),
    })
}

/// Expand a glob pattern into a sorted list of existing files.
pub fn resolve_trajectories(pattern: &str) -> Result<Vec<PathBuf>, AppError> {
    let entries = glob::glob(pattern)
        .map_err(|e| AppError::argument(format!("Invalid trajectory pattern '{pattern}': {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            AppError::read(path, e.into())
        })?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(AppError::argument(format!("No trajectory files match '{pattern}'.")));
    }
    Ok(paths)
}

/// Feature rows for the strided frames: `⌊frames / stride⌋` rows of `2 * dihedrals` values.
///
/// For each dihedral type (in definition order) the row holds the sines of all
/// its angles followed by their cosines.
pub fn featurize_frames(frames: &[Frame], dihedrals: &[DihedralSpec], stride: usize) -> Vec<f64> {
    let stride = stride.max(1);
    let n_rows = frames.len() / stride;
    let groups = group_by_type(dihedrals);

    let mut out = Vec::with_capacity(n_rows * 2 * dihedrals.len());
    for frame in frames.iter().step_by(stride).take(n_rows) {
        for group in &groups {
            let angles: Vec<f64> = group.iter().map(|d| measure(frame, d)).collect();
            out.extend(angles.iter().map(|a| a.sin()));
            out.extend(angles.iter().map(|a| a.cos()));
        }
    }
    out
}

fn measure(frame: &Frame, d: &DihedralSpec) -> f64 {
    let [a, b, c, e] = d.atoms;
    dihedral(frame[a], frame[b], frame[c], frame[e])
}

fn group_by_type(dihedrals: &[DihedralSpec]) -> Vec<Vec<&DihedralSpec>> {
    let mut groups: Vec<Vec<&DihedralSpec>> = Vec::new();
    for d in dihedrals {
        match groups.last_mut() {
            Some(g) if g[0].kind == d.kind => g.push(d),
            _ => groups.push(vec![d]),
        }
    }
    groups
}

fn effective_types(kind: FeaturizerKind, types: &[DihedralType]) -> Vec<DihedralType> {
    match kind {
        FeaturizerKind::AlphaAngleFeaturizer => vec![DihedralType::Alpha],
        FeaturizerKind::DihedralFeaturizer => {
            if types.is_empty() {
                return vec![DihedralType::Phi, DihedralType::Psi];
            }
            let mut out: Vec<DihedralType> = Vec::new();
            for t in types {
                if !out.contains(t) {
                    out.push(*t);
                }
            }
            out
        }
    }
}

/// Glob matching the trajectories written by `fetch-dataset`.
pub fn trajectory_glob(dir: &Path) -> String {
    dir.join("trajectory-*.pdb").to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Topology, TopologyAtom};

    fn backbone(n_res: usize) -> Topology {
        let mut atoms = Vec::new();
        for r in 0..n_res {
            for name in ["N", "CA", "C"] {
                atoms.push(TopologyAtom {
                    name: name.to_string(),
                    residue_name: "ALA".to_string(),
                    residue_seq: r as i32 + 1,
                    chain_id: 'A',
                });
            }
        }
        Topology { atoms }
    }

    #[test]
    fn stride_floors_row_count() {
        let top = backbone(3);
        let dihedrals = build_dihedrals(&top, &[DihedralType::Phi, DihedralType::Psi]);
        assert_eq!(dihedrals.len(), 4);

        let frame: Frame = (0..top.n_atoms())
            .map(|i| [i as f64, (i as f64).sin(), (i as f64 * 0.7).cos()])
            .collect();
        let frames = vec![frame; 25];

        for stride in [1, 3, 10, 26] {
            let data = featurize_frames(&frames, &dihedrals, stride);
            assert_eq!(data.len(), (25 / stride) * 8, "stride {stride}");
        }
    }

    #[test]
    fn sin_cos_pairs_are_unit_norm() {
        let top = backbone(4);
        let dihedrals = build_dihedrals(&top, &[DihedralType::Phi]);
        let frame: Frame = (0..top.n_atoms())
            .map(|i| [i as f64 * 1.1, (i as f64).sin() * 2.0, (i as f64 * 0.3).cos()])
            .collect();
        let row = featurize_frames(&[frame], &dihedrals, 1);
        let n = dihedrals.len();
        for k in 0..n {
            let s = row[k];
            let c = row[n + k];
            assert!((s * s + c * c - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn alpha_featurizer_ignores_requested_types() {
        let types = effective_types(FeaturizerKind::AlphaAngleFeaturizer, &[DihedralType::Phi]);
        assert_eq!(types, vec![DihedralType::Alpha]);
        let types = effective_types(FeaturizerKind::DihedralFeaturizer, &[]);
        assert_eq!(types, vec![DihedralType::Phi, DihedralType::Psi]);
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.pdb").to_string_lossy().into_owned();
        assert!(resolve_trajectories(&pattern).is_err());
    }

    #[test]
    fn glob_matches_files_only_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdb", "a.pdb", "c.pdb"] {
            std::fs::write(dir.path().join(name), "END\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.pdb")).unwrap();

        let pattern = dir.path().join("*.pdb").to_string_lossy().into_owned();
        let names: Vec<String> = resolve_trajectories(&pattern)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdb", "b.pdb", "c.pdb"]);
    }
}
