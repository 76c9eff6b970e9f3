//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs logging and sizes the worker pool
//! - turns each subcommand's arguments into a stage config
//! - runs the stage and writes its output files
//! - prints reports

use std::path::Path;

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{
    Cli, ClusterArgs, Command, FeaturizeArgs, FetchArgs, FreeEnergyArgs, HistogramArgs, MsmArgs, PipelineArgs,
    PlotCommand, ReduceArgs, ScaleArgs,
};
use crate::cluster::ClusterConfig;
use crate::config::PipelineConfig;
use crate::data::{FetchConfig, FetchOutput, SyntheticConfig, resolve_data_home};
use crate::decomposition::ReduceConfig;
use crate::domain::{ClusterModel, DatasetKind, FeatureSet, LabelSet, MsmModel};
use crate::error::AppError;
use crate::featurize::FeaturizeConfig;
use crate::io::{read_dataset, read_model, write_dataset, write_model, write_states_csv};
use crate::msm::MsmConfig;

pub mod pipeline;

/// Entry point for the `msm` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    crate::logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;
    debug!(?cli, "arguments parsed");

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| AppError::argument(format!("Failed to size the worker pool: {e}")))?;
        debug!(threads, "worker pool sized");
    }

    let globals = pipeline::GlobalFlags {
        verbose: cli.verbose,
        quiet: cli.quiet,
        threads: cli.threads,
    };
    match cli.command {
        Command::Pipeline(args) => handle_pipeline(&args, &globals),
        command => execute(command),
    }
}

/// Run one stage subcommand in-process.
pub fn execute(command: Command) -> Result<(), AppError> {
    match command {
        Command::FetchDataset(args) => handle_fetch(&args).map(|_| ()),
        Command::Featurize(args) => handle_featurize(&args),
        Command::Scale(args) => handle_scale(&args),
        Command::ReduceDimensionality(args) => handle_reduce(&args),
        Command::Cluster(args) => handle_cluster(&args),
        Command::EstimateMsm(args) => handle_estimate_msm(&args),
        Command::Plot(PlotCommand::FreeEnergy(args)) => handle_free_energy(&args),
        Command::Plot(PlotCommand::Histogram(args)) => handle_histogram(&args),
        Command::Pipeline(_) => Err(AppError::argument("A pipeline cannot run inside a pipeline.")),
    }
}

fn handle_fetch(args: &FetchArgs) -> Result<FetchOutput, AppError> {
    let config = fetch_config_from_args(args);
    let out = crate::data::fetch_dataset(&config)?;
    println!("{}", out.dir.display());
    Ok(out)
}

fn handle_featurize(args: &FeaturizeArgs) -> Result<(), AppError> {
    let config = featurize_config_from_args(args);
    let out = crate::featurize::featurize(&config)?;
    write_model(&args.out, &out.model)?;
    write_dataset(&args.transformed, &out.features)?;
    info!(
        sequences = out.features.sequences.len(),
        rows = out.features.n_rows_total(),
        columns = out.model.n_features,
        "featurized"
    );
    Ok(())
}

fn handle_scale(args: &ScaleArgs) -> Result<(), AppError> {
    let features: FeatureSet = read_dataset(&args.input, &[DatasetKind::Features])?;
    let (model, scaled) = crate::scale::fit_transform(args.kind, &features)?;
    write_dataset(&args.transformed, &scaled)?;
    if let Some(out) = &args.out {
        write_model(out, &model)?;
    }
    Ok(())
}

fn handle_reduce(args: &ReduceArgs) -> Result<(), AppError> {
    let data: FeatureSet = read_dataset(&args.input, &[DatasetKind::Scaled, DatasetKind::Features])?;
    let config = reduce_config_from_args(args);
    let (model, projected) = crate::decomposition::fit_transform(&config, &data)?;
    write_model(&args.out, &model)?;
    write_dataset(&args.transformed, &projected)?;
    print!("{}", crate::report::format_reducer_summary(&model));
    Ok(())
}

fn handle_cluster(args: &ClusterArgs) -> Result<(), AppError> {
    let data: FeatureSet = read_dataset(&args.input, &[DatasetKind::Projection, DatasetKind::Scaled])?;
    let config = cluster_config_from_args(args);
    let (model, labels) = crate::cluster::fit_predict(&config, &data)?;
    write_model(&args.out, &model)?;
    write_dataset(&args.transformed, &labels)?;
    Ok(())
}

fn handle_estimate_msm(args: &MsmArgs) -> Result<(), AppError> {
    let labels: LabelSet = read_dataset(&args.input, &[DatasetKind::Labels])?;
    let config = msm_config_from_args(args);
    let model = crate::msm::estimate_msm(&labels, &config)?;
    write_model(&args.out, &model)?;
    if let Some(path) = &args.export_csv {
        write_states_csv(path, &model)?;
    }
    print!("{}", crate::report::format_msm_summary(&model, args.top));
    Ok(())
}

fn handle_free_energy(args: &FreeEnergyArgs) -> Result<(), AppError> {
    let projection: FeatureSet = read_dataset(&args.projection, &[DatasetKind::Projection])?;
    let msm: MsmModel = read_model(&args.msm)?;
    let clusterer: ClusterModel = read_model(&args.clusterer)?;

    let grid = crate::plot::free_energy_grid(&projection, args.bins)?;
    let markers = crate::plot::center_markers(&clusterer, &msm)?;
    crate::plot::render_free_energy_svg(&args.output, &grid, &markers)?;
    info!(output = %args.output.display(), states = markers.len(), "free-energy plot rendered");
    Ok(())
}

fn handle_histogram(args: &HistogramArgs) -> Result<(), AppError> {
    let projection: FeatureSet = read_dataset(&args.projection, &[])?;
    let n_cols = projection.require_shape("histogram input", None)?;
    if args.component >= n_cols {
        return Err(AppError::contract(format!(
            "Component {} requested but the dataset has {n_cols} columns.",
            args.component
        )));
    }
    let values: Vec<f64> = projection.all_rows().map(|r| r[args.component]).collect();
    let label = format!("component {}", args.component);
    print!(
        "{}",
        crate::plot::render_ascii_histogram(&values, args.bins, args.height, &label)
    );
    Ok(())
}

fn handle_pipeline(args: &PipelineArgs, globals: &pipeline::GlobalFlags) -> Result<(), AppError> {
    let options = pipeline_options_from_args(args, globals)?;
    let stages = pipeline::run_pipeline(&options)?;
    print!("{}", crate::report::format_pipeline_summary(&stages));
    Ok(())
}

pub fn fetch_config_from_args(args: &FetchArgs) -> FetchConfig {
    FetchConfig {
        data_home: resolve_data_home(args.data_home.clone()),
        source: args.source,
        url: args.url.clone(),
        force: args.force,
        synthetic: SyntheticConfig {
            n_trajectories: args.n_trajectories,
            n_frames: args.n_frames,
            n_residues: args.n_residues,
            seed: args.seed,
            ..SyntheticConfig::default()
        },
    }
}

pub fn featurize_config_from_args(args: &FeaturizeArgs) -> FeaturizeConfig {
    FeaturizeConfig {
        kind: args.kind,
        topology: args.top.clone(),
        trajectories: args.trajectories.clone(),
        stride: args.stride,
        types: args.types.clone(),
    }
}

pub fn reduce_config_from_args(args: &ReduceArgs) -> ReduceConfig {
    ReduceConfig {
        kind: args.kind,
        n_components: args.n_components,
        lag_time: args.lag_time,
        shrinkage: args.shrinkage,
        kinetic_mapping: args.kinetic_mapping,
    }
}

pub fn cluster_config_from_args(args: &ClusterArgs) -> ClusterConfig {
    ClusterConfig {
        kind: args.kind,
        n_clusters: args.n_clusters,
        random_state: args.random_state,
        max_iter: args.max_iter,
        batch_size: args.batch_size,
    }
}

pub fn msm_config_from_args(args: &MsmArgs) -> MsmConfig {
    MsmConfig {
        lag_time: args.lag_time,
        reversible_type: args.reversible_type,
        ergodic_cutoff: args.ergodic_cutoff,
        prior_counts: args.prior_counts,
        n_timescales: args.n_timescales,
    }
}

pub fn pipeline_options_from_args(
    args: &PipelineArgs,
    globals: &pipeline::GlobalFlags,
) -> Result<pipeline::PipelineOptions, AppError> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let data_home = resolve_data_home(args.data_home.clone().or_else(|| config.dataset.data_home.clone()));
    let mode = if args.spawn {
        let exe = std::env::current_exe().map_err(|e| AppError::read(Path::new("<current executable>"), e))?;
        pipeline::StageMode::Spawn {
            exe,
            globals: globals.clone(),
        }
    } else {
        pipeline::StageMode::InProcess
    };

    Ok(pipeline::PipelineOptions {
        workdir: args.workdir.clone(),
        data_home,
        config,
        mode,
        plot: args.plot,
    })
}
