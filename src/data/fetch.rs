//! Example dataset retrieval.
//!
//! A dataset directory always ends up holding:
//!
//! - `topology.pdb`
//! - one or more `trajectory-*.pdb` files
//! - `dataset.json`, the manifest naming the two above
//!
//! An existing complete dataset is reused unless `force` is set.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::data::synthetic::{SyntheticConfig, generate_trajectory, peptide_topology, reference_frame};
use crate::domain::{DatasetManifest, DatasetSource};
use crate::error::AppError;
use crate::io::{write_frames, write_replacing, write_topology};

pub const MANIFEST_FILE: &str = "dataset.json";
pub const TOPOLOGY_FILE: &str = "topology.pdb";
pub const DATA_HOME_ENV: &str = "MSM_DATA_HOME";
pub const DEFAULT_DATA_HOME: &str = "msm_data";

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Fetch configuration (derived from CLI flags).
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub data_home: PathBuf,
    pub source: DatasetSource,
    /// Base URL serving `manifest.json` (remote source only).
    pub url: Option<String>,
    pub force: bool,
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub dir: PathBuf,
    pub manifest: DatasetManifest,
    /// `true` when an existing dataset was left untouched.
    pub reused: bool,
}

impl FetchOutput {
    pub fn topology_path(&self) -> PathBuf {
        self.dir.join(&self.manifest.topology)
    }
}

/// Data home from the flag, else `MSM_DATA_HOME` (environment or `.env`), else `./msm_data`.
pub fn resolve_data_home(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    dotenvy::dotenv().ok();
    std::env::var_os(DATA_HOME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_HOME))
}

/// Make sure the dataset exists under `config.data_home`.
pub fn fetch_dataset(config: &FetchConfig) -> Result<FetchOutput, AppError> {
    let dir = config.data_home.clone();

    if !config.force {
        if let Some(manifest) = existing_dataset(&dir)? {
            info!(dir = %dir.display(), trajectories = manifest.trajectories.len(), "dataset already present");
            return Ok(FetchOutput {
                dir,
                manifest,
                reused: true,
            });
        }
    }

    let manifest = match config.source {
        DatasetSource::Synthetic => write_synthetic(&dir, &config.synthetic)?,
        DatasetSource::Remote => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| AppError::argument("--url is required for the remote source."))?;
            RemoteSource::new(url)?.download(&dir)?
        }
    };

    write_manifest(&dir, &manifest)?;
    info!(
        dir = %dir.display(),
        source = ?config.source,
        trajectories = manifest.trajectories.len(),
        "dataset ready"
    );
    Ok(FetchOutput {
        dir,
        manifest,
        reused: false,
    })
}

/// The manifest of a complete dataset in `dir`, if there is one.
pub fn existing_dataset(dir: &Path) -> Result<Option<DatasetManifest>, AppError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|e| AppError::read(&path, e))?;
    let manifest: DatasetManifest = serde_json::from_str(&text).map_err(|e| AppError::parse(&path, e.to_string()))?;

    let complete = std::iter::once(&manifest.topology)
        .chain(&manifest.trajectories)
        .all(|name| dir.join(name).is_file());
    if !complete {
        debug!(dir = %dir.display(), "manifest present but files missing; refetching");
        return Ok(None);
    }
    Ok(Some(manifest))
}

fn write_manifest(dir: &Path, manifest: &DatasetManifest) -> Result<(), AppError> {
    let path = dir.join(MANIFEST_FILE);
    write_replacing(&path, |w| {
        serde_json::to_writer_pretty(&mut *w, manifest).map_err(|e| AppError::parse(&path, e.to_string()))?;
        writeln!(w).map_err(|e| AppError::write(&path, e))
    })
}

/// Generate the synthetic peptide dataset into `dir`.
pub fn write_synthetic(dir: &Path, config: &SyntheticConfig) -> Result<DatasetManifest, AppError> {
    config.validate()?;
    let topology = peptide_topology(config.n_residues);

    let top_path = dir.join(TOPOLOGY_FILE);
    write_replacing(&top_path, |w| {
        write_topology(w, &topology, &reference_frame(config.n_residues)).map_err(|e| AppError::write(&top_path, e))
    })?;

    let trajectories = (0..config.n_trajectories)
        .into_par_iter()
        .map(|i| {
            let traj = generate_trajectory(config, i)?;
            let name = format!("trajectory-{i:03}.pdb");
            let path = dir.join(&name);
            write_replacing(&path, |w| {
                write_frames(w, &topology, &traj.frames).map_err(|e| AppError::write(&path, e))
            })?;
            debug!(file = %name, frames = traj.frames.len(), "trajectory written");
            Ok(name)
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(DatasetManifest {
        name: format!("synthetic-peptide-{}res-seed{}", config.n_residues, config.seed),
        topology: TOPOLOGY_FILE.to_string(),
        trajectories,
    })
}

/// HTTP source serving `manifest.json` plus the files it lists.
pub struct RemoteSource {
    client: Client,
    base_url: String,
}

impl RemoteSource {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn fetch_manifest(&self) -> Result<DatasetManifest, AppError> {
        let url = format!("{}/manifest.json", self.base_url);
        let manifest: DatasetManifest = self.client.get(&url).send()?.error_for_status()?.json()?;

        for name in std::iter::once(&manifest.topology).chain(&manifest.trajectories) {
            if !is_plain_file_name(name) {
                return Err(AppError::contract(format!("Manifest entry '{name}' is not a plain file name.")));
            }
        }
        if manifest.trajectories.is_empty() {
            return Err(AppError::contract("Remote manifest lists no trajectories."));
        }
        Ok(manifest)
    }

    /// Download every file in the manifest into `dir`.
    pub fn download(&self, dir: &Path) -> Result<DatasetManifest, AppError> {
        let manifest = self.fetch_manifest()?;
        for name in std::iter::once(&manifest.topology).chain(&manifest.trajectories) {
            let url = format!("{}/{name}", self.base_url);
            let bytes = self.client.get(&url).send()?.error_for_status()?.bytes()?;
            let path = dir.join(name);
            write_replacing(&path, |w| w.write_all(&bytes).map_err(|e| AppError::write(&path, e)))?;
            debug!(file = %name, bytes = bytes.len(), "downloaded");
        }
        Ok(manifest)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path, force: bool) -> FetchConfig {
        FetchConfig {
            data_home: dir.to_path_buf(),
            source: DatasetSource::Synthetic,
            url: None,
            force,
            synthetic: SyntheticConfig {
                n_trajectories: 2,
                n_frames: 5,
                n_residues: 4,
                ..SyntheticConfig::default()
            },
        }
    }

    #[test]
    fn synthetic_fetch_writes_manifest_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = fetch_dataset(&config(dir.path(), false)).unwrap();
        assert!(!out.reused);
        assert_eq!(out.manifest.trajectories, vec!["trajectory-000.pdb", "trajectory-001.pdb"]);
        assert!(out.topology_path().is_file());
        assert!(dir.path().join(MANIFEST_FILE).is_file());
    }

    #[test]
    fn existing_dataset_is_reused_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        fetch_dataset(&config(dir.path(), false)).unwrap();
        assert!(fetch_dataset(&config(dir.path(), false)).unwrap().reused);
        assert!(!fetch_dataset(&config(dir.path(), true)).unwrap().reused);
    }

    #[test]
    fn incomplete_dataset_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        fetch_dataset(&config(dir.path(), false)).unwrap();
        std::fs::remove_file(dir.path().join("trajectory-001.pdb")).unwrap();
        assert!(existing_dataset(dir.path()).unwrap().is_none());
        assert!(!fetch_dataset(&config(dir.path(), false)).unwrap().reused);
    }

    #[test]
    fn remote_without_url_is_an_argument_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), false);
        cfg.source = DatasetSource::Remote;
        assert_eq!(fetch_dataset(&cfg).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn manifest_names_must_be_plain() {
        assert!(is_plain_file_name("trajectory-0.pdb"));
        assert!(!is_plain_file_name("../etc/passwd"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }

    #[test]
    fn explicit_data_home_wins() {
        let dir = PathBuf::from("/tmp/explicit");
        assert_eq!(resolve_data_home(Some(dir.clone())), dir);
    }
}
