//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the per-trajectory array container passed between stages (`Dataset`)
//! - stage kind enums (`FeaturizerKind`, `ScalerKind`, `ReducerKind`, ...)
//! - the persisted model of every stage (`FeaturizerModel` ... `MsmModel`)

pub mod dataset;
pub mod types;

pub use dataset::*;
pub use types::*;
