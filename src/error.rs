//! Application error type.
//!
//! Every failure in the pipeline maps to one process exit code so that an
//! orchestrating script (or `msm pipeline --spawn`) can halt on the first
//! failing stage:
//!
//! - `2`: usage errors and missing/unreadable input files
//! - `3`: contract mismatches between stages (shapes, sample counts, empty data)
//! - `4`: numerical or model failures (degenerate statistics, singular matrices)
//! - `5`: network failures while fetching a dataset
//! - child exit codes are propagated verbatim by the orchestrator

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Failed to read '{path}': {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}", path = path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {message}", path = path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Stage '{stage}' exited with status {code}")]
    Stage { stage: String, code: u8 },
}

impl AppError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Argument(_) | AppError::Read { .. } | AppError::Write { .. } | AppError::Parse { .. } => 2,
            AppError::Contract(_) => 3,
            AppError::Numerical(_) | AppError::Plot(_) => 4,
            AppError::Network(_) => 5,
            AppError::Stage { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(AppError::argument("x").exit_code(), 2);
        assert_eq!(
            AppError::read("a.json", std::io::Error::from(std::io::ErrorKind::NotFound)).exit_code(),
            2
        );
        assert_eq!(AppError::contract("shape").exit_code(), 3);
        assert_eq!(AppError::numerical("singular").exit_code(), 4);
        let stage = AppError::Stage {
            stage: "cluster".to_string(),
            code: 7,
        };
        assert_eq!(stage.exit_code(), 7);
    }

    #[test]
    fn read_error_mentions_path() {
        let err = AppError::read("missing.json", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.to_string().contains("missing.json"));
    }
}
