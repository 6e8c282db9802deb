//! Error types for Ciel

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("non-finite state: {0}")]
    NonFiniteState(String),

    #[error("unknown experiment: {0}")]
    UnknownExperiment(String),

    #[error("journal sink unavailable at {}: {source}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("experiment error: {name} - {message}")]
    Experiment { name: String, message: String },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    pub fn shape_mismatch(expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::ShapeMismatch { expected, found }
    }

    pub fn sink_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SinkUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn experiment(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Experiment {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this error comes from a configuration outside its declared domain.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}
