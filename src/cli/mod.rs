//! Command-line parsing for the `msm` pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! numerical stages. Every subcommand maps onto one stage; `app` turns the
//! parsed arguments into stage configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    ClusterKind, DatasetSource, DihedralType, FeaturizerKind, ReducerKind, ReversibleType, ScalerKind,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "msm",
    version,
    about = "Markov state model pipeline: featurize, scale, reduce, cluster, estimate"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a file in addition to stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads (defaults to the number of logical cores)
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch (or generate) the example trajectory dataset.
    FetchDataset(FetchArgs),
    /// Compute dihedral features for every trajectory.
    Featurize(FeaturizeArgs),
    /// Scale features per column.
    Scale(ScaleArgs),
    /// Project scaled features onto slow (tICA) or high-variance (PCA) components.
    ReduceDimensionality(ReduceArgs),
    /// Cluster projected frames into discrete states.
    Cluster(ClusterArgs),
    /// Estimate a Markov state model from cluster labels.
    EstimateMsm(MsmArgs),
    /// Render plots from saved datasets and models.
    #[command(subcommand)]
    Plot(PlotCommand),
    /// Run every stage in sequence.
    Pipeline(PipelineArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    /// Dataset directory (defaults to $MSM_DATA_HOME, then ./msm_data).
    #[arg(long, value_name = "DIR")]
    pub data_home: Option<PathBuf>,

    /// Where the dataset comes from.
    #[arg(long, value_enum, default_value_t = DatasetSource::Synthetic)]
    pub source: DatasetSource,

    /// Base URL serving manifest.json (remote source).
    #[arg(long)]
    pub url: Option<String>,

    /// Random seed for the synthetic dataset.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of synthetic trajectories.
    #[arg(long, default_value_t = 4)]
    pub n_trajectories: usize,

    /// Frames per synthetic trajectory.
    #[arg(long, default_value_t = 1000)]
    pub n_frames: usize,

    /// Residues in the synthetic peptide.
    #[arg(long, default_value_t = 22)]
    pub n_residues: usize,

    /// Regenerate even if the dataset already exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FeaturizeArgs {
    #[arg(value_enum)]
    pub kind: FeaturizerKind,

    /// Topology PDB file.
    #[arg(long, value_name = "PATH")]
    pub top: PathBuf,

    /// Glob matching the trajectory files.
    #[arg(long, value_name = "GLOB")]
    pub trajectories: String,

    /// Keep every n-th frame.
    #[arg(long, default_value_t = 1)]
    pub stride: usize,

    /// Dihedral types (DihedralFeaturizer only), comma separated.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [DihedralType::Phi, DihedralType::Psi])]
    pub types: Vec<DihedralType>,

    /// Output path of the featurizer model.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    /// Output path of the feature dataset.
    #[arg(long, value_name = "PATH")]
    pub transformed: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ScaleArgs {
    #[arg(value_enum)]
    pub kind: ScalerKind,

    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub transformed: PathBuf,

    /// Also persist the fitted scaler.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ReduceArgs {
    #[arg(value_enum)]
    pub kind: ReducerKind,

    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub transformed: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub n_components: usize,

    /// Lag time in frames (tICA).
    #[arg(long, default_value_t = 1)]
    pub lag_time: usize,

    /// Shrink C(0) towards a scaled identity by this weight in [0, 1] (tICA).
    #[arg(long)]
    pub shrinkage: Option<f64>,

    /// Scale projected coordinates by their eigenvalues (tICA).
    #[arg(long)]
    pub kinetic_mapping: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ClusterArgs {
    #[arg(value_enum)]
    pub kind: ClusterKind,

    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub transformed: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    #[arg(long, default_value_t = 100)]
    pub n_clusters: usize,

    /// Seed for initialisation and batch sampling.
    #[arg(long, default_value_t = 42)]
    pub random_state: u64,

    /// Maximum iterations (KMeans) or passes over the data (MiniBatchKMeans).
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Mini-batch size (MiniBatchKMeans).
    #[arg(long, default_value_t = crate::cluster::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

#[derive(Debug, Args, Clone)]
pub struct MsmArgs {
    /// Label dataset produced by `cluster`.
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub lag_time: usize,

    #[arg(long, value_enum, default_value_t = ReversibleType::Mle)]
    pub reversible_type: ReversibleType,

    /// Minimum count for two states to be connected (default 1 / lag time).
    #[arg(long)]
    pub ergodic_cutoff: Option<f64>,

    /// Pseudo-count added to every transition count.
    #[arg(long, default_value_t = 0.0)]
    pub prior_counts: f64,

    /// Number of implied timescales to keep (default: all).
    #[arg(long)]
    pub n_timescales: Option<usize>,

    /// Export per-state populations and eigenvectors to CSV.
    #[arg(long, value_name = "PATH")]
    pub export_csv: Option<PathBuf>,

    /// States shown in the summary.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Subcommand)]
pub enum PlotCommand {
    /// Free-energy landscape of the first two projected coordinates (SVG).
    FreeEnergy(FreeEnergyArgs),
    /// ASCII histogram of one projected coordinate.
    Histogram(HistogramArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FreeEnergyArgs {
    /// Projection dataset produced by `reduce-dimensionality`.
    #[arg(long, value_name = "PATH")]
    pub projection: PathBuf,

    /// MSM model produced by `estimate-msm`.
    #[arg(long, value_name = "PATH")]
    pub msm: PathBuf,

    /// Clusterer model produced by `cluster`.
    #[arg(long, value_name = "PATH")]
    pub clusterer: PathBuf,

    /// Output SVG file.
    #[arg(long, value_name = "PATH")]
    pub output: PathBuf,

    /// Histogram bins per axis.
    #[arg(long, default_value_t = crate::plot::DEFAULT_BINS)]
    pub bins: usize,
}

#[derive(Debug, Args, Clone)]
pub struct HistogramArgs {
    #[arg(long, value_name = "PATH")]
    pub projection: PathBuf,

    /// Projected coordinate to histogram.
    #[arg(long, default_value_t = 0)]
    pub component: usize,

    #[arg(long, default_value_t = 60)]
    pub bins: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 15)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct PipelineArgs {
    /// TOML file with pipeline parameters.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory receiving every intermediate file.
    #[arg(long, value_name = "DIR", default_value = "msm_run")]
    pub workdir: PathBuf,

    /// Dataset directory (overrides the config file and $MSM_DATA_HOME).
    #[arg(long, value_name = "DIR")]
    pub data_home: Option<PathBuf>,

    /// Run every stage as a child `msm` process.
    #[arg(long)]
    pub spawn: bool,

    /// Render the free-energy SVG at the end.
    #[arg(long)]
    pub plot: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn stage_flags_parse() {
        let cli = Cli::try_parse_from([
            "msm",
            "-vv",
            "reduce-dimensionality",
            "tICA",
            "--input",
            "scaled.json",
            "--out",
            "tica.json",
            "--transformed",
            "proj.json",
            "--n-components",
            "4",
            "--lag-time",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::ReduceDimensionality(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.kind, ReducerKind::Tica);
        assert_eq!(args.lag_time, 2);
    }

    #[test]
    fn dihedral_types_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "msm",
            "featurize",
            "DihedralFeaturizer",
            "--top",
            "top.pdb",
            "--trajectories",
            "*.pdb",
            "--types",
            "phi,omega",
            "--out",
            "f.json",
            "--transformed",
            "x.json",
        ])
        .unwrap();
        let Command::Featurize(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.types, vec![DihedralType::Phi, DihedralType::Omega]);
        assert_eq!(args.stride, 1);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["msm", "-q", "-v", "estimate-msm", "--input", "a", "--out", "b"]).is_err());
    }
}
