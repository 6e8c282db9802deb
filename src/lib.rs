//! ciel — command surface shared by the binary and its tests

pub mod cli;

pub use cli::{exit_code, exit_code_for, list_experiments, run_experiment, show_config, RunOptions};
