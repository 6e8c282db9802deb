//! Commands behind `ciel run`, `ciel list` and `ciel config`.
//!
//! Output goes to whatever writer the caller hands in; diagnostics go
//! through tracing. Exit codes:
//!
//! | code | meaning                 |
//! |------|-------------------------|
//! | 0    | success                 |
//! | 1    | any other failure       |
//! | 2    | unknown experiment      |
//! | 3    | invalid configuration   |

use ciel_core::{Error, Metrics, Result, RuntimeConfig};
use ciel_lab::journal::{render_line, wall_clock_secs};
use ciel_lab::{builtin_registry, Journal, LabConfig};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_UNKNOWN_EXPERIMENT: i32 = 2;
pub const EXIT_INVALID_CONFIG: i32 = 3;

/// Key naming the experiment in a `run` record.
pub const EXPERIMENT_KEY: &str = "experiment";

#[derive(Debug, Parser)]
#[command(
    name = "ciel",
    about = "Field runtime experiments",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a built-in experiment
    Run {
        /// Experiment name (see `ciel list`)
        name: String,
        /// Ticks per experiment
        #[arg(long)]
        steps: Option<u32>,
        /// Append the result line here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Runtime config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Grid side length
        #[arg(long)]
        grid: Option<usize>,
        /// Jitter RNG seed (or set CIEL_SEED)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List built-in experiments
    List,
    /// Print the effective runtime config
    Config {
        /// Runtime config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub name: String,
    pub steps: Option<u32>,
    pub out: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub grid: Option<usize>,
    pub seed: Option<u64>,
}

impl RunOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Resolve the lab config: flags over environment over config file
    /// over defaults.
    pub fn lab_config(&self, env: impl Fn(&str) -> Option<String>) -> Result<LabConfig> {
        let runtime = load_runtime(self.config.as_deref())?.with_env_from(env)?;
        let defaults = LabConfig::default();
        let grid_n = match (self.grid, self.config.is_some()) {
            (Some(n), _) => n,
            (None, true) => runtime.grid_n,
            (None, false) => defaults.grid_n,
        };
        let lab = LabConfig {
            steps: self.steps.unwrap_or(defaults.steps),
            grid_n,
            seed: self.seed.or(runtime.seed).unwrap_or(defaults.seed),
            runtime,
        };
        lab.validate()?;
        Ok(lab)
    }
}

fn load_runtime(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(p) => RuntimeConfig::load(p),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Run one built-in and write `{step, t, experiment, ...metrics}` as a
/// single line to `--out` (appending) or else to `out`.
pub fn run_experiment(
    opts: &RunOptions,
    env: impl Fn(&str) -> Option<String>,
    out: &mut dyn Write,
) -> Result<Metrics> {
    let lab = opts.lab_config(env)?;
    let steps = u64::from(lab.steps);
    let registry = builtin_registry(lab)?;

    let metrics = registry.run_one(&opts.name)?;
    let record = metrics.clone().with(EXPERIMENT_KEY, opts.name.as_str());
    let t = wall_clock_secs();
    match &opts.out {
        Some(path) => {
            info!(experiment = %opts.name, path = %path.display(), "writing result");
            Journal::new(path).log_at(steps, t, &record)?;
        }
        None => out.write_all(render_line(steps, t, &record)?.as_bytes())?,
    }
    Ok(metrics)
}

/// One experiment name per line, sorted.
pub fn list_experiments(out: &mut dyn Write) -> Result<()> {
    let registry = builtin_registry(LabConfig::default())?;
    for name in registry.list() {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

/// Effective runtime config as TOML.
pub fn show_config(path: Option<&Path>, out: &mut dyn Write) -> Result<()> {
    let config = load_runtime(path)?;
    config.validate()?;
    out.write_all(config.to_toml().as_bytes())?;
    Ok(())
}

/// Exit code for a command line clap could not parse. Help and version
/// requests succeed; a malformed command line is invalid configuration.
pub fn usage_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_INVALID_CONFIG,
    }
}

pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::InvalidConfiguration(_) => EXIT_INVALID_CONFIG,
        Error::UnknownExperiment(_) => EXIT_UNKNOWN_EXPERIMENT,
        _ => EXIT_FAILURE,
    }
}

/// Exit code for an error that reached `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>().map(exit_code).unwrap_or(EXIT_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(&Error::invalid_config("x")), 3);
        assert_eq!(exit_code(&Error::UnknownExperiment("x".into())), 2);
        assert_eq!(exit_code(&Error::NonFiniteState("x".into())), 1);
    }

    #[test]
    fn usage_errors_are_invalid_config() {
        let err = Cli::try_parse_from(["ciel", "run", "norm_stability", "--steps", "abc"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), EXIT_INVALID_CONFIG);
        let err = Cli::try_parse_from(["ciel", "run", "norm_stability", "--grid", "-4"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), EXIT_INVALID_CONFIG);
        let err = Cli::try_parse_from(["ciel", "frobnicate"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), EXIT_INVALID_CONFIG);
        let err = Cli::try_parse_from(["ciel", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 0);
        let err = Cli::try_parse_from(["ciel", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 0);
    }

    #[test]
    fn exit_code_sees_through_context() {
        let err = anyhow::Error::new(Error::UnknownExperiment("x".into())).context("running x");
        assert_eq!(exit_code_for(&err), 2);
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), 1);
    }
}
