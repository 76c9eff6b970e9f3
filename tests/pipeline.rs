use std::path::Path;

use msm_pipeline::app::pipeline::{PipelineOptions, StageMode, StagePaths, run_pipeline};
use msm_pipeline::cli::Cli;
use msm_pipeline::config::PipelineConfig;
use msm_pipeline::domain::{ClusterModel, DatasetKind, FeatureSet, LabelSet, MsmModel};
use msm_pipeline::error::AppError;
use msm_pipeline::io::{read_dataset, read_model};

use clap::Parser;

fn options(root: &Path, config: &str, mode: StageMode) -> PipelineOptions {
    PipelineOptions {
        workdir: root.join("run"),
        data_home: root.join("data"),
        config: PipelineConfig::from_toml(config).unwrap(),
        mode,
        plot: false,
    }
}

#[test]
fn synthetic_dataset_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path(), "", StageMode::InProcess);
    opts.plot = true;

    let lines = run_pipeline(&opts).unwrap();
    let stages: Vec<&str> = lines.iter().map(|l| l.stage.as_str()).collect();
    assert_eq!(
        stages,
        vec!["fetch-dataset", "featurize", "scale", "reduce-dimensionality", "cluster", "estimate-msm", "plot"]
    );

    let paths = StagePaths::new(&opts.workdir);
    let features: FeatureSet = read_dataset(&paths.features, &[DatasetKind::Features]).unwrap();
    assert_eq!(features.sequences.len(), 4);
    assert_eq!(features.n_cols(), Some(84));
    assert_eq!(features.rows_per_sequence(), vec![100; 4]);

    let projection: FeatureSet = read_dataset(&paths.projection, &[DatasetKind::Projection]).unwrap();
    assert_eq!(projection.n_cols(), Some(4));

    let labels: LabelSet = read_dataset(&paths.labels, &[DatasetKind::Labels]).unwrap();
    assert!(labels.all_rows().all(|r| r[0] < 100));

    let clusterer: ClusterModel = read_model(&paths.clusterer).unwrap();
    assert_eq!(clusterer.centers.len(), 100);

    let msm: MsmModel = read_model(&paths.msm).unwrap();
    assert!(msm.n_states <= 100);
    assert_eq!(msm.populations.len(), msm.n_states);
    assert!(msm.populations.iter().all(|&p| p >= 0.0));
    assert!((msm.populations.iter().sum::<f64>() - 1.0).abs() < 1e-8);

    assert!(paths.states_csv.is_file());
    let svg = std::fs::read_to_string(&paths.free_energy).unwrap();
    assert!(svg.starts_with("<svg"));
}

const TOO_MANY_CLUSTERS: &str = r#"
[dataset]
n-trajectories = 2
n-frames = 400
n-residues = 6

[cluster]
n-clusters = 10000
"#;

#[test]
fn pipeline_halts_on_first_failing_stage() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), TOO_MANY_CLUSTERS, StageMode::InProcess);

    let err = run_pipeline(&opts).unwrap_err();
    assert_eq!(err.exit_code(), 3);

    let paths = StagePaths::new(&opts.workdir);
    assert!(paths.projection.is_file());
    assert!(!paths.labels.exists());
    assert!(!paths.msm.exists());
}

#[test]
fn spawned_stage_failure_propagates_child_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let mode = StageMode::Spawn {
        exe: env!("CARGO_BIN_EXE_msm").into(),
        globals: Default::default(),
    };
    let opts = options(dir.path(), TOO_MANY_CLUSTERS, mode);

    let err = run_pipeline(&opts).unwrap_err();
    match &err {
        AppError::Stage { stage, code } => {
            assert_eq!(stage, "cluster");
            assert_eq!(*code, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 3);
    assert!(!StagePaths::new(&opts.workdir).msm.exists());
}

#[test]
fn stages_chain_through_the_command_line() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let run = |args: &[&str]| {
        let cli = Cli::try_parse_from(std::iter::once("msm").chain(args.iter().copied())).unwrap();
        msm_pipeline::app::execute(cli.command)
    };
    let p = |name: &str| dir.path().join(name).to_string_lossy().into_owned();

    run(&[
        "fetch-dataset",
        "--data-home",
        &data.to_string_lossy(),
        "--n-trajectories",
        "2",
        "--n-frames",
        "120",
        "--n-residues",
        "5",
    ])
    .unwrap();
    let glob = data.join("trajectory-*.pdb").to_string_lossy().into_owned();
    run(&[
        "featurize",
        "DihedralFeaturizer",
        "--top",
        &data.join("topology.pdb").to_string_lossy(),
        "--trajectories",
        &glob,
        "--stride",
        "3",
        "--out",
        &p("featurizer.json"),
        "--transformed",
        &p("features.json"),
    ])
    .unwrap();

    let features: FeatureSet = read_dataset(&dir.path().join("features.json"), &[]).unwrap();
    assert_eq!(features.rows_per_sequence(), vec![40, 40]);
    // 4 phi + 4 psi angles, each as a sin/cos pair.
    assert_eq!(features.n_cols(), Some(16));

    // Scaled data goes straight to PCA, then to a labelled clustering.
    run(&["scale", "StandardScaler", "--input", &p("features.json"), "--transformed", &p("scaled.json")]).unwrap();
    run(&[
        "reduce-dimensionality",
        "PCA",
        "--input",
        &p("scaled.json"),
        "--out",
        &p("pca.json"),
        "--transformed",
        &p("projection.json"),
        "--n-components",
        "2",
    ])
    .unwrap();
    run(&[
        "cluster",
        "KMeans",
        "--input",
        &p("projection.json"),
        "--transformed",
        &p("labels.json"),
        "--out",
        &p("kmeans.json"),
        "--n-clusters",
        "5",
    ])
    .unwrap();

    let err = run(&["estimate-msm", "--input", &p("projection.json"), "--out", &p("msm.json")]).unwrap_err();
    assert_eq!(err.exit_code(), 3, "projection is not a label dataset");

    run(&["estimate-msm", "--input", &p("labels.json"), "--out", &p("msm.json"), "--lag-time", "1"]).unwrap();
    let msm: MsmModel = read_model(&dir.path().join("msm.json")).unwrap();
    assert!(msm.n_states >= 1 && msm.n_states <= 5);
}
