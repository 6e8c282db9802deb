//! Ciel Core - configuration records, metrics, and error handling

pub mod config;
pub mod error;
pub mod metrics;

pub use config::{HomeostatMode, RuntimeConfig, SeedConfig};
pub use error::{Error, Result};
pub use metrics::{MetricValue, Metrics};
