//! `msm-pipeline` library crate.
//!
//! The binary (`msm`) is a thin wrapper around this library so that:
//!
//! - every stage is testable without spawning processes
//! - the pipeline orchestrator can run stages in-process or as child commands
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod data;
pub mod decomposition;
pub mod domain;
pub mod error;
pub mod featurize;
pub mod io;
pub mod logging;
pub mod math;
pub mod msm;
pub mod plot;
pub mod report;
pub mod scale;
