//! End-to-end pipeline: every stage in order, halting on the first failure.
//!
//! fetch-dataset -> featurize -> scale -> reduce-dimensionality -> cluster ->
//! estimate-msm -> (optional) plot free-energy
//!
//! Each stage is described by the argument vector of its subcommand. In-process
//! runs parse that vector and call the stage directly; `--spawn` runs hand the
//! same vector to a child `msm` process. Both modes therefore produce the same
//! files under the work directory.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Parser;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::PipelineConfig;
use crate::data::existing_dataset;
use crate::error::AppError;
use crate::featurize::trajectory_glob;
use crate::report::StageLine;

/// Global flags forwarded to child processes.
#[derive(Debug, Clone, Default)]
pub struct GlobalFlags {
    pub verbose: u8,
    pub quiet: bool,
    pub threads: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum StageMode {
    InProcess,
    /// Run every stage as `exe <stage args>`.
    Spawn { exe: PathBuf, globals: GlobalFlags },
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub workdir: PathBuf,
    pub data_home: PathBuf,
    pub config: PipelineConfig,
    pub mode: StageMode,
    pub plot: bool,
}

/// Intermediate files, all inside the work directory.
#[derive(Debug, Clone)]
pub struct StagePaths {
    pub featurizer: PathBuf,
    pub features: PathBuf,
    pub scaler: PathBuf,
    pub scaled: PathBuf,
    pub reducer: PathBuf,
    pub projection: PathBuf,
    pub clusterer: PathBuf,
    pub labels: PathBuf,
    pub msm: PathBuf,
    pub states_csv: PathBuf,
    pub free_energy: PathBuf,
}

impl StagePaths {
    pub fn new(workdir: &Path) -> Self {
        Self {
            featurizer: workdir.join("featurizer.json"),
            features: workdir.join("features.json"),
            scaler: workdir.join("scaler.json"),
            scaled: workdir.join("scaled.json"),
            reducer: workdir.join("reducer.json"),
            projection: workdir.join("projection.json"),
            clusterer: workdir.join("clusterer.json"),
            labels: workdir.join("labels.json"),
            msm: workdir.join("msm.json"),
            states_csv: workdir.join("states.csv"),
            free_energy: workdir.join("free_energy.svg"),
        }
    }
}

/// One stage invocation: a subcommand plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct StageArgs {
    pub stage: &'static str,
    args: Vec<OsString>,
}

impl StageArgs {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            args: vec![OsString::from(stage)],
        }
    }

    fn arg(mut self, value: impl AsRef<OsStr>) -> Self {
        self.args.push(value.as_ref().to_os_string());
        self
    }

    fn opt(self, flag: &str, value: impl AsRef<OsStr>) -> Self {
        self.arg(flag).arg(value)
    }

    fn opt_if<V: AsRef<OsStr>>(self, flag: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.opt(flag, v),
            None => self,
        }
    }

    fn switch(self, flag: &str, on: bool) -> Self {
        if on { self.arg(flag) } else { self }
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// Run every stage and return one summary line per completed stage.
pub fn run_pipeline(options: &PipelineOptions) -> Result<Vec<StageLine>, AppError> {
    std::fs::create_dir_all(&options.workdir).map_err(|e| AppError::write(&options.workdir, e))?;
    let paths = StagePaths::new(&options.workdir);
    let mut lines = Vec::new();

    let fetch = fetch_stage(&options.config, &options.data_home);
    run_stage(&options.mode, &fetch)?;
    let manifest = existing_dataset(&options.data_home)?.ok_or_else(|| {
        AppError::contract(format!(
            "No complete dataset in '{}' after fetch-dataset.",
            options.data_home.display()
        ))
    })?;
    lines.push(StageLine {
        stage: fetch.stage.to_string(),
        detail: format!("{} ({} trajectories)", manifest.name, manifest.trajectories.len()),
    });

    if manifest.trajectories.iter().any(|t| !t.starts_with("trajectory-")) {
        warn!(
            dataset = %manifest.name,
            "some trajectories do not match trajectory-*.pdb and will not be featurized"
        );
    }
    let topology = options.data_home.join(&manifest.topology);

    for stage in analysis_stages(&options.config, &topology, &options.data_home, &paths, options.plot) {
        run_stage(&options.mode, &stage)?;
        lines.push(StageLine {
            stage: stage.stage.to_string(),
            detail: stage_output(&stage, &paths),
        });
    }
    Ok(lines)
}

pub fn fetch_stage(config: &PipelineConfig, data_home: &Path) -> StageArgs {
    let d = &config.dataset;
    StageArgs::new("fetch-dataset")
        .opt("--data-home", data_home)
        .opt("--source", value_name(&d.source))
        .opt_if("--url", d.url.as_deref())
        .opt("--seed", d.seed.to_string())
        .opt("--n-trajectories", d.n_trajectories.to_string())
        .opt("--n-frames", d.n_frames.to_string())
        .opt("--n-residues", d.n_residues.to_string())
        .switch("--force", d.force)
}

/// Stages after the dataset exists, in execution order.
pub fn analysis_stages(
    config: &PipelineConfig,
    topology: &Path,
    data_home: &Path,
    paths: &StagePaths,
    plot: bool,
) -> Vec<StageArgs> {
    let f = &config.featurize;
    let types: Vec<String> = f.types.iter().map(|t| value_name(t)).collect();
    let featurize = StageArgs::new("featurize")
        .arg(value_name(&f.kind))
        .opt("--top", topology)
        .opt("--trajectories", trajectory_glob(data_home))
        .opt("--stride", f.stride.to_string())
        .opt("--types", types.join(","))
        .opt("--out", &paths.featurizer)
        .opt("--transformed", &paths.features);

    let scale = StageArgs::new("scale")
        .arg(value_name(&config.scale.kind))
        .opt("--input", &paths.features)
        .opt("--transformed", &paths.scaled)
        .opt("--out", &paths.scaler);

    let r = &config.reduce;
    let reduce = StageArgs::new("reduce-dimensionality")
        .arg(value_name(&r.kind))
        .opt("--input", &paths.scaled)
        .opt("--out", &paths.reducer)
        .opt("--transformed", &paths.projection)
        .opt("--n-components", r.n_components.to_string())
        .opt("--lag-time", r.lag_time.to_string())
        .opt_if("--shrinkage", r.shrinkage.map(|s| s.to_string()))
        .switch("--kinetic-mapping", r.kinetic_mapping);

    let c = &config.cluster;
    let cluster = StageArgs::new("cluster")
        .arg(value_name(&c.kind))
        .opt("--input", &paths.projection)
        .opt("--transformed", &paths.labels)
        .opt("--out", &paths.clusterer)
        .opt("--n-clusters", c.n_clusters.to_string())
        .opt("--random-state", c.random_state.to_string())
        .opt_if("--max-iter", c.max_iter.map(|m| m.to_string()))
        .opt("--batch-size", c.batch_size.to_string());

    let m = &config.msm;
    let msm = StageArgs::new("estimate-msm")
        .opt("--input", &paths.labels)
        .opt("--out", &paths.msm)
        .opt("--lag-time", m.lag_time.to_string())
        .opt("--reversible-type", value_name(&m.reversible_type))
        .opt_if("--ergodic-cutoff", m.ergodic_cutoff.map(|c| c.to_string()))
        .opt("--prior-counts", m.prior_counts.to_string())
        .opt_if("--n-timescales", m.n_timescales.map(|n| n.to_string()))
        .opt("--export-csv", &paths.states_csv)
        .opt("--top", m.top.to_string());

    let mut stages = vec![featurize, scale, reduce, cluster, msm];
    if plot {
        stages.push(
            StageArgs::new("plot")
                .arg("free-energy")
                .opt("--projection", &paths.projection)
                .opt("--msm", &paths.msm)
                .opt("--clusterer", &paths.clusterer)
                .opt("--output", &paths.free_energy)
                .opt("--bins", config.plot.bins.to_string()),
        );
    }
    stages
}

/// Run one stage in the configured mode; a failure halts the pipeline.
pub fn run_stage(mode: &StageMode, stage: &StageArgs) -> Result<(), AppError> {
    info!(stage = stage.stage, "stage starting");
    match mode {
        StageMode::InProcess => {
            let argv = std::iter::once(OsString::from("msm")).chain(stage.args.iter().cloned());
            let cli = Cli::try_parse_from(argv)
                .map_err(|e| AppError::argument(format!("Stage '{}': {e}", stage.stage)))?;
            crate::app::execute(cli.command)?;
        }
        StageMode::Spawn { exe, globals } => {
            let status = Command::new(exe)
                .args(global_args(globals))
                .args(&stage.args)
                .status()
                .map_err(|e| AppError::read(exe, e))?;
            if !status.success() {
                let code = status.code().and_then(|c| u8::try_from(c).ok()).filter(|&c| c != 0);
                return Err(AppError::Stage {
                    stage: stage.stage.to_string(),
                    code: code.unwrap_or(1),
                });
            }
        }
    }
    info!(stage = stage.stage, "stage finished");
    Ok(())
}

fn global_args(globals: &GlobalFlags) -> Vec<OsString> {
    let mut out = Vec::new();
    if globals.quiet {
        out.push(OsString::from("--quiet"));
    } else if globals.verbose > 0 {
        out.push(OsString::from(format!("-{}", "v".repeat(usize::from(globals.verbose)))));
    }
    if let Some(threads) = globals.threads {
        out.push(OsString::from("--threads"));
        out.push(OsString::from(threads.to_string()));
    }
    out
}

fn stage_output(stage: &StageArgs, paths: &StagePaths) -> String {
    let written: Vec<&PathBuf> = match stage.stage {
        "featurize" => vec![&paths.features],
        "scale" => vec![&paths.scaled],
        "reduce-dimensionality" => vec![&paths.projection],
        "cluster" => vec![&paths.labels],
        "estimate-msm" => vec![&paths.msm, &paths.states_csv],
        "plot" => vec![&paths.free_energy],
        _ => Vec::new(),
    };
    let names: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
    format!("-> {}", names.join(", "))
}

/// The command-line spelling of a `ValueEnum` variant.
fn value_name<T: clap::ValueEnum>(value: &T) -> String {
    value
        .to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default()
}
